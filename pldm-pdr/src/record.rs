//! PDR record layouts and builders
//!
//! A record is a common header followed by a type specific body, all fields
//! little endian. Builders here leave the header's record handle zeroed,
//! the repository assigns the real handle at insertion.

use alloc::vec::Vec;

#[allow(unused)]
use log::{debug, error, info, trace, warn};

use deku::{deku_derive, DekuContainerRead, DekuContainerWrite, DekuRead, DekuWrite};
use num_derive::FromPrimitive;

use crate::entity::{AssociationType, Entity, EntityTree};
use crate::repo::Repo;
use crate::{PdrError, Result};

/// Size in bytes of the common record header
pub const PDR_HEADER_SIZE: usize = 10;
/// Header version for all records produced here
pub const PDR_HEADER_VERSION: u8 = 1;

/// Common header carried by every PDR
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct RecordHeader {
    pub record_handle: u32,
    pub version: u8,
    pub pdr_type: u8,
    pub record_change_num: u16,
    pub length: u16,
}

/// PDR types from DSP0248
#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum PdrType {
    TerminusLocator = 1,
    NumericSensor = 2,
    NumericSensorInitialization = 3,
    StateSensor = 4,
    StateSensorInitialization = 5,
    SensorAuxiliaryNames = 6,
    OemUnit = 7,
    OemStateSet = 8,
    NumericEffecter = 9,
    NumericEffecterInitialization = 10,
    StateEffecter = 11,
    StateEffecterInitialization = 12,
    EffecterAuxiliaryNames = 13,
    EffecterOemSemantic = 14,
    EntityAssociation = 15,
    EntityAuxiliaryNames = 16,
    OemEntityId = 17,
    InterruptAssociation = 18,
    EventLog = 19,
    FruRecordSet = 20,
    OemDevice = 126,
    Oem = 127,
}

/// Assemble a complete record from a type and body.
///
/// The record handle is left zero and the change number starts at zero.
pub fn build_record(pdr_type: u8, body: &[u8]) -> Vec<u8> {
    let mut rec = Vec::with_capacity(PDR_HEADER_SIZE + body.len());
    rec.extend_from_slice(&0u32.to_le_bytes());
    rec.push(PDR_HEADER_VERSION);
    rec.push(pdr_type);
    rec.extend_from_slice(&0u16.to_le_bytes());
    rec.extend_from_slice(&(body.len() as u16).to_le_bytes());
    rec.extend_from_slice(body);
    rec
}

/// Body of an Entity Association PDR
#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAssociationPdr {
    #[deku(endian = "little")]
    pub container_id: u16,
    pub association_type: AssociationType,
    pub container: Entity,
    #[deku(temp, temp_value = "self.children.len() as u8")]
    num_children: u8,
    #[deku(count = "num_children")]
    pub children: Vec<Entity>,
}

/// Body of a FRU Record Set PDR
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct FruRecordSetPdr {
    pub terminus_handle: u16,
    pub fru_rsi: u16,
    pub entity_type: u16,
    pub entity_instance_num: u16,
    pub container_id: u16,
}

impl FruRecordSetPdr {
    /// Encoded size in bytes
    pub const WIRE_SIZE: usize = 10;

    pub(crate) fn parse(body: &[u8]) -> Option<Self> {
        Self::from_bytes((body, 0)).ok().map(|(_, v)| v)
    }
}

/// Possible state bits for one state set of a composite sensor or effecter
#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleStates {
    #[deku(endian = "little")]
    pub state_set_id: u16,
    #[deku(temp, temp_value = "self.states.len() as u8")]
    possible_states_size: u8,
    /// Bitfield of allowed states, one bit per state value
    #[deku(count = "possible_states_size")]
    pub states: Vec<u8>,
}

/// Body of a State Sensor PDR
#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSensorPdr {
    #[deku(endian = "little")]
    pub terminus_handle: u16,
    #[deku(endian = "little")]
    pub sensor_id: u16,
    pub entity: Entity,
    pub sensor_init: u8,
    pub sensor_auxiliary_names_pdr: bool,
    #[deku(temp, temp_value = "self.composite.len() as u8")]
    composite_sensor_count: u8,
    #[deku(count = "composite_sensor_count")]
    pub composite: Vec<PossibleStates>,
}

impl StateSensorPdr {
    /// Build a complete record around this body.
    ///
    /// Composite sensor counts are limited to 1 through 8, and each
    /// possible states bitfield to the 255 bytes its size field can
    /// describe.
    pub fn to_record(&self) -> Result<Vec<u8>> {
        if self.composite.is_empty() || self.composite.len() > 8 {
            return Err(PdrError::InvalidData);
        }
        if self.composite.iter().any(|p| p.states.len() > u8::MAX as usize) {
            return Err(PdrError::InvalidData);
        }
        let body = self.to_bytes()?;
        Ok(build_record(PdrType::StateSensor as u8, &body))
    }
}

/// Body of a State Effecter PDR
#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEffecterPdr {
    #[deku(endian = "little")]
    pub terminus_handle: u16,
    #[deku(endian = "little")]
    pub effecter_id: u16,
    pub entity: Entity,
    #[deku(endian = "little")]
    pub effecter_semantic_id: u16,
    pub effecter_init: u8,
    pub has_description_pdr: bool,
    #[deku(temp, temp_value = "self.composite.len() as u8")]
    composite_effecter_count: u8,
    #[deku(count = "composite_effecter_count")]
    pub composite: Vec<PossibleStates>,
}

impl StateEffecterPdr {
    /// Build a complete record around this body.
    ///
    /// Composite effecter counts are limited to 1 through 8, and each
    /// possible states bitfield to the 255 bytes its size field can
    /// describe.
    pub fn to_record(&self) -> Result<Vec<u8>> {
        if self.composite.is_empty() || self.composite.len() > 8 {
            return Err(PdrError::InvalidData);
        }
        if self.composite.iter().any(|p| p.states.len() > u8::MAX as usize) {
            return Err(PdrError::InvalidData);
        }
        let body = self.to_bytes()?;
        Ok(build_record(PdrType::StateEffecter as u8, &body))
    }
}

/// Emit Entity Association PDRs for a tree into the repository.
///
/// Runs [`EntityTree::visit`] first so instance numbers are resolved. One
/// record is added per parent node and association type with at least one
/// child, in tree visitation order, physical before logical where a parent
/// has both.
pub fn pdr_add(tree: &mut EntityTree, repo: &mut Repo, is_remote: bool) -> Result<()> {
    tree.visit();
    for node in tree.traversal() {
        if !tree.is_node_parent(node) {
            continue;
        }
        let container_id = match tree.container_id(node) {
            Some(id) => id,
            None => continue,
        };
        for assoc in [AssociationType::Physical, AssociationType::Logical] {
            let children = tree.children_entities(node, assoc);
            if children.is_empty() {
                continue;
            }
            trace!(
                "entity association record, container {} {:?} {} children",
                container_id,
                assoc,
                children.len()
            );
            let body = EntityAssociationPdr {
                container_id,
                association_type: assoc,
                container: tree.entity(node),
                children,
            }
            .to_bytes()?;
            repo.add(
                &build_record(PdrType::EntityAssociation as u8, &body),
                0,
                is_remote,
            );
        }
    }
    Ok(())
}

/// Decode one Entity Association PDR.
///
/// `data` is a full record starting at the common header. Returns the
/// container entity followed by each child, in encoded order. Bytes past
/// the encoded children are ignored.
pub fn extract(data: &[u8]) -> Result<Vec<Entity>> {
    let ((rest, _), hdr) = RecordHeader::from_bytes((data, 0))?;
    if hdr.pdr_type != PdrType::EntityAssociation as u8 {
        return Err(PdrError::InvalidData);
    }
    let (_, body) = EntityAssociationPdr::from_bytes((rest, 0))?;

    let mut out = Vec::with_capacity(body.children.len() + 1);
    out.push(body.container);
    out.extend_from_slice(&body.children);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ent(entity_type: u16, entity_instance_num: u16, entity_container_id: u16) -> Entity {
        Entity {
            entity_type,
            entity_instance_num,
            entity_container_id,
        }
    }

    fn nine_node_tree() -> EntityTree {
        let mut tree = EntityTree::new();
        let n1 = tree.add(1, None, AssociationType::Physical);
        let n2a = tree.add(2, Some(n1), AssociationType::Physical);
        tree.add(2, Some(n1), AssociationType::Physical);
        tree.add(3, Some(n1), AssociationType::Physical);
        tree.add(4, Some(n2a), AssociationType::Physical);
        let n5a = tree.add(5, Some(n2a), AssociationType::Physical);
        let n5b = tree.add(5, Some(n2a), AssociationType::Physical);
        tree.add(6, Some(n5a), AssociationType::Physical);
        tree.add(7, Some(n5b), AssociationType::Physical);
        tree
    }

    #[test]
    fn association_records() {
        let mut tree = nine_node_tree();
        let mut repo = Repo::new();
        pdr_add(&mut tree, &mut repo, false).unwrap();

        // one record per parent, in visitation order
        assert_eq!(repo.record_count(), 4);

        let expect: [(Entity, &[Entity]); 4] = [
            (ent(1, 1, 0), &[ent(2, 1, 1), ent(2, 2, 1), ent(3, 1, 1)]),
            (ent(2, 1, 1), &[ent(4, 1, 2), ent(5, 1, 2), ent(5, 2, 2)]),
            (ent(5, 1, 2), &[ent(6, 1, 3)]),
            (ent(5, 2, 2), &[ent(7, 1, 4)]),
        ];

        let mut cur = repo.find_record(0);
        for (container, children) in &expect {
            let r = cur.unwrap();
            let entities = extract(repo.record(r).data()).unwrap();
            assert_eq!(entities[0], *container);
            assert_eq!(&entities[1..], *children);
            cur = repo.next_record(r);
        }
        assert!(cur.is_none());

        // stored headers: assigned handle stamped in, type and length
        // filled in
        let r = repo.find_record(1).unwrap();
        let ((_, _), hdr) = RecordHeader::from_bytes((repo.record(r).data(), 0)).unwrap();
        assert_eq!(hdr.record_handle, 1);
        assert_eq!(hdr.version, PDR_HEADER_VERSION);
        assert_eq!(hdr.pdr_type, PdrType::EntityAssociation as u8);
        assert_eq!(hdr.record_change_num, 0);
        // container id + association + parent + count + 3 children
        assert_eq!(hdr.length, 2 + 1 + 6 + 1 + 18);
    }

    #[test]
    fn physical_before_logical() {
        let mut tree = EntityTree::new();
        let p = tree.add(11, None, AssociationType::Physical);
        tree.add(12, Some(p), AssociationType::Logical);
        tree.add(13, Some(p), AssociationType::Physical);
        let mut repo = Repo::new();
        pdr_add(&mut tree, &mut repo, false).unwrap();

        assert_eq!(repo.record_count(), 2);

        let r = repo.find_record(1).unwrap();
        let data = repo.record(r).data();
        let (_, body) =
            EntityAssociationPdr::from_bytes((&data[PDR_HEADER_SIZE..], 0)).unwrap();
        assert_eq!(body.association_type, AssociationType::Physical);
        assert_eq!(body.children, [ent(13, 1, 1)]);

        let r = repo.find_record(2).unwrap();
        let data = repo.record(r).data();
        let (_, body) =
            EntityAssociationPdr::from_bytes((&data[PDR_HEADER_SIZE..], 0)).unwrap();
        assert_eq!(body.association_type, AssociationType::Logical);
        assert_eq!(body.children, [ent(12, 1, 1)]);
        assert_eq!(body.container, ent(11, 1, 0));
        assert_eq!(body.container_id, 1);
    }

    #[test]
    fn mixed_association_records() {
        // Parents with children under both associations, plus a childless
        // top level type 2 beside the main tree. Under the root: physical
        // type 2, 2 and logical 3, 3. Under the first of those 2s:
        // physical 4, 5 and logical 5, 5. The 4 gains a physical 6, the
        // physical 5 a logical 7.
        let mut tree = EntityTree::new();
        let l1 = tree.add(1, None, AssociationType::Physical);
        tree.add(2, None, AssociationType::Physical);
        let l2a = tree.add(2, Some(l1), AssociationType::Physical);
        tree.add(3, Some(l1), AssociationType::Logical);
        tree.add(2, Some(l1), AssociationType::Physical);
        tree.add(3, Some(l1), AssociationType::Logical);
        let l3a = tree.add(4, Some(l2a), AssociationType::Physical);
        let l3b = tree.add(5, Some(l2a), AssociationType::Physical);
        tree.add(5, Some(l2a), AssociationType::Logical);
        tree.add(5, Some(l2a), AssociationType::Logical);
        tree.add(6, Some(l3a), AssociationType::Physical);
        tree.add(7, Some(l3b), AssociationType::Logical);

        assert_eq!(tree.get_num_children(l1, AssociationType::Physical), 2);
        assert_eq!(tree.get_num_children(l1, AssociationType::Logical), 2);
        assert_eq!(tree.get_num_children(l2a, AssociationType::Physical), 2);
        assert_eq!(tree.get_num_children(l3b, AssociationType::Physical), 0);
        assert_eq!(tree.get_num_children(l3b, AssociationType::Logical), 1);

        let mut repo = Repo::new();
        pdr_add(&mut tree, &mut repo, false).unwrap();

        // two records each for the two dual association parents, one each
        // for the two single association parents
        assert_eq!(repo.record_count(), 6);

        let expect: [(AssociationType, u16, Entity, &[Entity]); 6] = [
            (
                AssociationType::Physical,
                1,
                ent(1, 1, 0),
                &[ent(2, 2, 1), ent(2, 3, 1)],
            ),
            (
                AssociationType::Logical,
                1,
                ent(1, 1, 0),
                &[ent(3, 1, 1), ent(3, 2, 1)],
            ),
            (
                AssociationType::Physical,
                2,
                ent(2, 2, 1),
                &[ent(4, 1, 2), ent(5, 1, 2)],
            ),
            (
                AssociationType::Logical,
                2,
                ent(2, 2, 1),
                &[ent(5, 2, 2), ent(5, 3, 2)],
            ),
            (AssociationType::Physical, 3, ent(4, 1, 2), &[ent(6, 1, 3)]),
            (AssociationType::Logical, 4, ent(5, 1, 2), &[ent(7, 1, 4)]),
        ];

        let mut cur = repo.find_record(0);
        for (assoc, container_id, container, children) in &expect {
            let r = cur.unwrap();
            let data = repo.record(r).data();
            let (_, body) =
                EntityAssociationPdr::from_bytes((&data[PDR_HEADER_SIZE..], 0))
                    .unwrap();
            assert_eq!(body.association_type, *assoc);
            assert_eq!(body.container_id, *container_id);
            assert_eq!(body.container, *container);
            assert_eq!(&body.children[..], *children);
            cur = repo.next_record(r);
        }
        assert!(cur.is_none());
    }

    #[test]
    fn extract_buffer() {
        #[rustfmt::skip]
        let buf = [
            9, 0, 0, 0,           // record handle
            1,                    // version
            15,                   // entity association
            0, 0,                 // change number
            40, 0,                // length
            1, 0,                 // container id
            0,                    // physical
            1, 0, 1, 0, 0, 0,     // container entity
            5,                    // five children
            2, 0, 1, 0, 1, 0,
            3, 0, 1, 0, 1, 0,
            4, 0, 1, 0, 1, 0,
            5, 0, 1, 0, 1, 0,
            6, 0, 1, 0, 1, 0,
        ];
        let entities = extract(&buf).unwrap();
        assert_eq!(
            entities,
            [
                ent(1, 1, 0),
                ent(2, 1, 1),
                ent(3, 1, 1),
                ent(4, 1, 1),
                ent(5, 1, 1),
                ent(6, 1, 1),
            ]
        );

        // trailing bytes are ignored
        let mut long = alloc::vec::Vec::from(buf);
        long.push(0xff);
        assert_eq!(extract(&long).unwrap(), entities);

        // short by one byte
        assert_eq!(
            extract(&buf[..buf.len() - 1]),
            Err(PdrError::InvalidLength)
        );

        // not an entity association record
        let mut wrong = buf;
        wrong[5] = PdrType::FruRecordSet as u8;
        assert_eq!(extract(&wrong), Err(PdrError::InvalidData));
    }

    #[test]
    fn state_sensor_record() {
        let pdr = StateSensorPdr {
            terminus_handle: 1,
            sensor_id: 7,
            entity: ent(32, 1, 0),
            sensor_init: 0,
            sensor_auxiliary_names_pdr: false,
            composite: alloc::vec![
                PossibleStates {
                    state_set_id: 10,
                    states: alloc::vec![0x06],
                },
                PossibleStates {
                    state_set_id: 20,
                    states: alloc::vec![0x3e, 0x01],
                },
            ],
        };
        let rec = pdr.to_record().unwrap();

        let ((rest, _), hdr) = RecordHeader::from_bytes((&rec, 0)).unwrap();
        assert_eq!(hdr.pdr_type, PdrType::StateSensor as u8);
        assert_eq!(hdr.length as usize, rest.len());

        // fixed fields then per-set possible states
        assert_eq!(
            rest,
            [
                1, 0, // terminus handle
                7, 0, // sensor id
                32, 0, 1, 0, 0, 0, // entity
                0, // sensor init
                0, // no aux names pdr
                2, // composite count
                10, 0, 1, 0x06, // set 10, one byte of states
                20, 0, 2, 0x3e, 0x01, // set 20, two bytes
            ]
        );

        let (_, back) = StateSensorPdr::from_bytes((rest, 0)).unwrap();
        assert_eq!(back, pdr);

        // composite count limits
        let empty = StateSensorPdr {
            composite: alloc::vec::Vec::new(),
            ..pdr.clone()
        };
        assert_eq!(empty.to_record(), Err(PdrError::InvalidData));
        let many = StateSensorPdr {
            composite: alloc::vec![
                PossibleStates {
                    state_set_id: 1,
                    states: alloc::vec![1],
                };
                9
            ],
            ..pdr.clone()
        };
        assert_eq!(many.to_record(), Err(PdrError::InvalidData));

        // the largest bitfield the size byte can describe still encodes
        let full = StateSensorPdr {
            composite: alloc::vec![PossibleStates {
                state_set_id: 1,
                states: alloc::vec![0; 255],
            }],
            ..pdr.clone()
        };
        assert!(full.to_record().is_ok());

        // anything longer is refused
        let wide = StateSensorPdr {
            composite: alloc::vec![PossibleStates {
                state_set_id: 1,
                states: alloc::vec![0; 300],
            }],
            ..pdr
        };
        assert_eq!(wide.to_record(), Err(PdrError::InvalidData));
    }

    #[test]
    fn state_effecter_record() {
        let pdr = StateEffecterPdr {
            terminus_handle: 1,
            effecter_id: 3,
            entity: ent(33, 2, 1),
            effecter_semantic_id: 0,
            effecter_init: 0,
            has_description_pdr: false,
            composite: alloc::vec![PossibleStates {
                state_set_id: 99,
                states: alloc::vec![0x0e],
            }],
        };
        let rec = pdr.to_record().unwrap();

        let ((rest, _), hdr) = RecordHeader::from_bytes((&rec, 0)).unwrap();
        assert_eq!(hdr.pdr_type, PdrType::StateEffecter as u8);
        assert_eq!(hdr.length as usize, rest.len());

        let (_, back) = StateEffecterPdr::from_bytes((rest, 0)).unwrap();
        assert_eq!(back, pdr);

        // oversized possible states bitfields are refused
        let wide = StateEffecterPdr {
            composite: alloc::vec![PossibleStates {
                state_set_id: 99,
                states: alloc::vec![0; 256],
            }],
            ..pdr
        };
        assert_eq!(wide.to_record(), Err(PdrError::InvalidData));
    }

    #[test]
    fn pdr_types() {
        use num_traits::FromPrimitive;
        assert_eq!(PdrType::from_u8(15), Some(PdrType::EntityAssociation));
        assert_eq!(PdrType::from_u8(20), Some(PdrType::FruRecordSet));
        assert_eq!(PdrType::from_u8(0), None);
        assert_eq!(PdrType::from_u8(21), None);
        assert_eq!(PdrType::from_u8(126), Some(PdrType::OemDevice));
    }
}
