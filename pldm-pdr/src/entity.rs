//! Entity association tree
//!
//! Callers build the tree incrementally with [`EntityTree::add`], then run
//! [`EntityTree::visit`] to resolve entity instance numbers. Container ids
//! are allocated as the tree is built: a node receives a fresh container id
//! the first time a child is added under it, and every child inherits that
//! id as its `entity_container_id`. Top-level nodes live in container 0.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use deku::{DekuRead, DekuWrite};

/// One manageable entity, per DSP0248
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct Entity {
    pub entity_type: u16,
    pub entity_instance_num: u16,
    pub entity_container_id: u16,
}

impl Entity {
    /// Encoded size in bytes
    pub const WIRE_SIZE: usize = 6;
}

/// Association between a contained entity and its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum AssociationType {
    Physical = 0x00,
    Logical = 0x01,
}

/// A node in an [`EntityTree`], stable for the life of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(usize);

#[derive(Debug)]
struct Node {
    entity: Entity,
    association: AssociationType,
    children: Vec<NodeHandle>,
    // allocated when the first child is added
    container_id: Option<u16>,
}

/// Tree of entity associations for one terminus
#[derive(Debug)]
pub struct EntityTree {
    nodes: Vec<Node>,
    // top-level nodes, in add order
    roots: Vec<NodeHandle>,
    next_container_id: u16,
}

impl Default for EntityTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTree {
    pub fn new() -> Self {
        EntityTree {
            nodes: Vec::new(),
            roots: Vec::new(),
            next_container_id: 1,
        }
    }

    /// Add an entity under `parent`, or at top level for `None`.
    ///
    /// The new node's container id is resolved immediately from its
    /// parent. Its instance number stays 0 until [`visit`](Self::visit)
    /// runs.
    pub fn add(
        &mut self,
        entity_type: u16,
        parent: Option<NodeHandle>,
        association: AssociationType,
    ) -> NodeHandle {
        let container_id = match parent {
            None => 0,
            Some(p) => match self.nodes[p.0].container_id {
                Some(id) => id,
                None => {
                    let id = self.next_container_id;
                    self.next_container_id += 1;
                    self.nodes[p.0].container_id = Some(id);
                    id
                }
            },
        };

        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(Node {
            entity: Entity {
                entity_type,
                entity_instance_num: 0,
                entity_container_id: container_id,
            },
            association,
            children: Vec::new(),
            container_id: None,
        });

        match parent {
            None => self.roots.push(handle),
            Some(p) => self.nodes[p.0].children.push(handle),
        }
        handle
    }

    /// The entity for a node, instance number resolved only after
    /// [`visit`](Self::visit) has run.
    pub fn entity(&self, node: NodeHandle) -> Entity {
        self.nodes[node.0].entity
    }

    /// True when the node has at least one child of either association
    pub fn is_node_parent(&self, node: NodeHandle) -> bool {
        !self.nodes[node.0].children.is_empty()
    }

    /// Number of children of the node under one association type
    pub fn get_num_children(&self, node: NodeHandle, association: AssociationType) -> u8 {
        self.nodes[node.0]
            .children
            .iter()
            .filter(|c| self.nodes[c.0].association == association)
            .count() as u8
    }

    // Nodes in visitation order: each sibling run in full, then the runs
    // of their children, last sibling's children first.
    pub(crate) fn traversal(&self) -> Vec<NodeHandle> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        stack.push(self.roots.clone());
        while let Some(run) = stack.pop() {
            for h in run {
                order.push(h);
                if !self.nodes[h.0].children.is_empty() {
                    stack.push(self.nodes[h.0].children.clone());
                }
            }
        }
        order
    }

    pub(crate) fn container_id(&self, node: NodeHandle) -> Option<u16> {
        self.nodes[node.0].container_id
    }

    pub(crate) fn children_entities(
        &self,
        node: NodeHandle,
        association: AssociationType,
    ) -> Vec<Entity> {
        self.nodes[node.0]
            .children
            .iter()
            .filter(|c| self.nodes[c.0].association == association)
            .map(|c| self.nodes[c.0].entity)
            .collect()
    }

    /// Traverse the tree, assigning instance numbers as it goes.
    ///
    /// Each node's instance number becomes one more than the count of
    /// same-typed nodes already visited, counted across the whole tree.
    /// Returns every entity in visitation order. Repeat visits assign the
    /// same numbers.
    pub fn visit(&mut self) -> Vec<Entity> {
        let order = self.traversal();
        let mut counts: BTreeMap<u16, u16> = BTreeMap::new();
        let mut out = Vec::with_capacity(order.len());
        for h in order {
            let node = &mut self.nodes[h.0];
            let n = counts.entry(node.entity.entity_type).or_insert(0);
            *n += 1;
            node.entity.entity_instance_num = *n;
            out.push(node.entity);
        }
        out
    }

    /// Find a node by entity type and instance number.
    ///
    /// Matches against the instance numbers assigned by
    /// [`visit`](Self::visit), so only succeeds once that has run. The
    /// returned node's entity carries the resolved container id.
    pub fn find(&self, entity_type: u16, entity_instance_num: u16) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .position(|n| {
                n.entity.entity_type == entity_type
                    && n.entity.entity_instance_num == entity_instance_num
            })
            .map(NodeHandle)
    }
}
