//! In-memory Platform Descriptor Record repository
//!
//! Records are opaque byte blobs to the repository. Each carries a 32 bit
//! record handle, assigned at insertion and written into the stored
//! header when repository-assigned, and a remote flag marking records
//! learned from another terminus rather than created locally.

use alloc::vec::Vec;

use crate::record::{self, FruRecordSetPdr, PdrType, PDR_HEADER_SIZE};

/// A single record held by a [`Repo`]
#[derive(Debug, Clone)]
pub struct PdrRecord {
    handle: u32,
    is_remote: bool,
    data: Vec<u8>,
}

impl PdrRecord {
    /// The record handle assigned at insertion
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// True for records sourced from a remote terminus
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// The record data, starting with the common PDR header
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The PDR type from the common header, `None` for records shorter
    /// than the header.
    pub fn pdr_type(&self) -> Option<u8> {
        if self.data.len() < PDR_HEADER_SIZE {
            return None;
        }
        self.data.get(5).copied()
    }
}

/// Position of a record within a [`Repo`].
///
/// Valid until the repository is next modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef(usize);

/// An ordered, in-memory PDR repository.
///
/// Iteration with [`find_record`](Self::find_record) and
/// [`next_record`](Self::next_record) always returns records in insertion
/// order. Record handles are stable for the life of a record; removing
/// remote records never renumbers the survivors.
#[derive(Debug, Default)]
pub struct Repo {
    records: Vec<PdrRecord>,
    // running total of record data bytes
    size: usize,
    // highest record handle ever assigned, including caller supplied ones
    last_handle: u32,
}

impl Repo {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, returning its assigned handle.
    ///
    /// A zero `record_handle` asks the repository to assign the next
    /// unused handle, which is also written into the record handle field
    /// of the stored copy's common header. A non-zero value is used as-is
    /// and the data is stored verbatim; later automatic assignments
    /// continue above the largest handle seen so far.
    ///
    /// `data` must be non-empty.
    pub fn add(&mut self, data: &[u8], record_handle: u32, is_remote: bool) -> u32 {
        assert!(!data.is_empty());

        let handle = if record_handle == 0 {
            assert_ne!(self.last_handle, u32::MAX, "record handle space exhausted");
            self.last_handle + 1
        } else {
            record_handle
        };
        self.last_handle = self.last_handle.max(handle);

        let mut data = data.to_vec();
        if record_handle == 0 && data.len() >= 4 {
            // stamp the assigned handle into the stored header
            data[..4].copy_from_slice(&handle.to_le_bytes());
        }

        self.size += data.len();
        self.records.push(PdrRecord {
            handle,
            is_remote,
            data,
        });
        handle
    }

    /// Add a FRU Record Set PDR built from the given fields.
    pub fn add_fru_record_set(
        &mut self,
        terminus_handle: u16,
        fru_rsi: u16,
        entity_type: u16,
        entity_instance_num: u16,
        container_id: u16,
    ) -> u32 {
        let mut body = [0u8; FruRecordSetPdr::WIRE_SIZE];
        body[0..2].copy_from_slice(&terminus_handle.to_le_bytes());
        body[2..4].copy_from_slice(&fru_rsi.to_le_bytes());
        body[4..6].copy_from_slice(&entity_type.to_le_bytes());
        body[6..8].copy_from_slice(&entity_instance_num.to_le_bytes());
        body[8..10].copy_from_slice(&container_id.to_le_bytes());

        let rec = record::build_record(PdrType::FruRecordSet as u8, &body);
        self.add(&rec, 0, false)
    }

    /// Remove every remote record.
    ///
    /// Local records keep their relative order and their handles.
    /// Removing nothing is a no-op.
    pub fn remove_remote_pdrs(&mut self) {
        let removed: usize = self
            .records
            .iter()
            .filter(|r| r.is_remote)
            .map(|r| r.data.len())
            .sum();
        self.size -= removed;
        self.records.retain(|r| !r.is_remote);
    }

    /// Number of records held
    pub fn record_count(&self) -> u32 {
        self.records.len() as u32
    }

    /// Total size in bytes of all record data
    pub fn repo_size(&self) -> usize {
        self.size
    }

    /// Size in bytes of the largest single record, 0 when empty
    pub fn largest_record_size(&self) -> usize {
        self.records.iter().map(|r| r.data.len()).max().unwrap_or(0)
    }

    /// Look up a record by handle.
    ///
    /// Handle 0 means the first record, for starting an iteration.
    pub fn find_record(&self, record_handle: u32) -> Option<RecordRef> {
        if record_handle == 0 {
            return (!self.records.is_empty()).then_some(RecordRef(0));
        }
        self.records
            .iter()
            .position(|r| r.handle == record_handle)
            .map(RecordRef)
    }

    /// The record following `record` in insertion order
    pub fn next_record(&self, record: RecordRef) -> Option<RecordRef> {
        let next = record.0 + 1;
        (next < self.records.len()).then_some(RecordRef(next))
    }

    /// Handle of the record following `record`, 0 when it is the last
    pub fn next_record_handle(&self, record: RecordRef) -> u32 {
        self.records.get(record.0 + 1).map(|r| r.handle).unwrap_or(0)
    }

    /// Access a record
    pub fn record(&self, record: RecordRef) -> &PdrRecord {
        &self.records[record.0]
    }

    /// Find the first record of a PDR type, scanning forward from the
    /// record after `after`, or from the start when `after` is `None`.
    pub fn find_record_by_type(
        &self,
        pdr_type: u8,
        after: Option<RecordRef>,
    ) -> Option<RecordRef> {
        let start = after.map(|r| r.0 + 1).unwrap_or(0);
        self.records
            .get(start..)?
            .iter()
            .position(|r| r.pdr_type() == Some(pdr_type))
            .map(|i| RecordRef(start + i))
    }

    /// Find a FRU Record Set PDR by its FRU record set identifier.
    ///
    /// Returns the record position and the decoded record set fields.
    pub fn fru_record_set_find_by_rsi(
        &self,
        fru_rsi: u16,
    ) -> Option<(RecordRef, FruRecordSetPdr)> {
        let mut cur = self.find_record_by_type(PdrType::FruRecordSet as u8, None);
        while let Some(r) = cur {
            let body = &self.record(r).data[PDR_HEADER_SIZE..];
            if let Some(frs) = FruRecordSetPdr::parse(body) {
                if frs.fru_rsi == fru_rsi {
                    return Some((r, frs));
                }
            }
            cur = self.find_record_by_type(PdrType::FruRecordSet as u8, Some(r));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tenbytes(fill: u8) -> [u8; 10] {
        [fill; 10]
    }

    #[test]
    fn add_handles() {
        let mut repo = Repo::new();
        assert_eq!(repo.add(&tenbytes(1), 0, false), 1);
        assert_eq!(repo.add(&tenbytes(2), 0, false), 2);
        assert_eq!(repo.add(&tenbytes(3), 0, false), 3);
        assert_eq!(repo.add(&tenbytes(4), 0xdeeddeed, false), 0xdeeddeed);

        assert_eq!(repo.record_count(), 4);
        assert_eq!(repo.repo_size(), 40);
        assert_eq!(repo.largest_record_size(), 10);
    }

    #[test]
    fn add_after_explicit_handle() {
        let mut repo = Repo::new();
        assert_eq!(repo.add(&tenbytes(1), 5, false), 5);
        // automatic assignment resumes above the largest handle used
        assert_eq!(repo.add(&tenbytes(2), 0, false), 6);
        assert_eq!(repo.add(&tenbytes(3), 2, false), 2);
        assert_eq!(repo.add(&tenbytes(4), 0, false), 7);
    }

    #[test]
    fn find() {
        let mut repo = Repo::new();
        assert!(repo.find_record(0).is_none());
        assert!(repo.find_record(1).is_none());

        let h1 = repo.add(&tenbytes(1), 0, false);
        let h2 = repo.add(&tenbytes(2), 0, true);
        let h3 = repo.add(&tenbytes(3), 0, false);

        // handle 0 is the first record
        let r = repo.find_record(0).unwrap();
        assert_eq!(repo.record(r).handle(), h1);
        let mut expect = tenbytes(1);
        expect[..4].copy_from_slice(&h1.to_le_bytes());
        assert_eq!(repo.record(r).data(), expect);
        assert_eq!(repo.next_record_handle(r), h2);

        let r = repo.find_record(h2).unwrap();
        assert!(repo.record(r).is_remote());
        assert_eq!(repo.next_record_handle(r), h3);

        let r = repo.find_record(h3).unwrap();
        assert_eq!(repo.next_record_handle(r), 0);

        assert!(repo.find_record(99).is_none());
    }

    #[test]
    fn iteration() {
        let mut repo = Repo::new();
        let mut handles = alloc::vec::Vec::new();
        for i in 1..=5u8 {
            handles.push(repo.add(&tenbytes(i), 0, i % 2 == 0));
        }

        let mut seen = alloc::vec::Vec::new();
        let mut cur = repo.find_record(0);
        while let Some(r) = cur {
            seen.push(repo.record(r).handle());
            cur = repo.next_record(r);
        }
        assert_eq!(seen, handles);

        // the last record reports next handle 0
        let last = repo.find_record(*handles.last().unwrap()).unwrap();
        assert_eq!(repo.next_record_handle(last), 0);
    }

    #[test]
    fn remove_remote() {
        let mut repo = Repo::new();
        repo.add(&tenbytes(1), 0, true);
        repo.add(&tenbytes(2), 0, false);
        repo.add(&tenbytes(3), 0, true);
        repo.add(&tenbytes(4), 0, false);
        assert_eq!(repo.repo_size(), 40);

        repo.remove_remote_pdrs();

        // survivors keep their order and handles
        assert_eq!(repo.record_count(), 2);
        assert_eq!(repo.repo_size(), 20);
        let r = repo.find_record(0).unwrap();
        assert_eq!(repo.record(r).handle(), 2);
        assert_eq!(repo.next_record_handle(r), 4);

        // removed handles are not reissued
        assert_eq!(repo.add(&tenbytes(5), 0, true), 5);
        assert_eq!(repo.add(&tenbytes(6), 0, false), 6);

        // repeated removal only drops the new remote record
        repo.remove_remote_pdrs();
        repo.remove_remote_pdrs();
        assert_eq!(repo.record_count(), 3);

        // removing from an empty repo is fine
        let mut empty = Repo::new();
        empty.remove_remote_pdrs();
        assert_eq!(empty.record_count(), 0);
    }

    #[test]
    fn fru_record_set() {
        let mut repo = Repo::new();
        let h1 = repo.add_fru_record_set(1, 1, 1, 0, 100);
        let h2 = repo.add_fru_record_set(1, 2, 1, 1, 100);
        let h3 = repo.add_fru_record_set(2, 3, 1, 2, 101);
        assert_eq!((h1, h2, h3), (1, 2, 3));
        assert_eq!(repo.repo_size(), 60);

        let (r, frs) = repo.fru_record_set_find_by_rsi(2).unwrap();
        assert_eq!(repo.record(r).handle(), 2);
        assert_eq!(frs.terminus_handle, 1);
        assert_eq!(frs.entity_type, 1);
        assert_eq!(frs.entity_instance_num, 1);
        assert_eq!(frs.container_id, 100);

        assert!(repo.fru_record_set_find_by_rsi(4).is_none());

        // exact wire layout of the stored record
        let rec = repo.record(repo.find_record(h3).unwrap());
        assert_eq!(
            rec.data(),
            [
                3, 0, 0, 0, // record handle, stamped at insertion
                1,  // version
                20, // FRU Record Set PDR
                0, 0, // record change number
                10, 0, // data length
                2, 0, 3, 0, 1, 0, 2, 0, 101, 0,
            ]
        );
    }

    #[test]
    fn assigned_handle_stamped() {
        let mut repo = Repo::new();
        let h = repo.add_fru_record_set(1, 9, 64, 1, 0);
        assert_eq!(h, 1);
        let rec = repo.record(repo.find_record(h).unwrap());
        assert_eq!(rec.data()[..4], 1u32.to_le_bytes());

        // a caller-supplied handle leaves the stored bytes untouched
        let h = repo.add(&tenbytes(3), 0x44332211, false);
        let rec = repo.record(repo.find_record(h).unwrap());
        assert_eq!(rec.data(), tenbytes(3));

        // automatic assignment resumes above it, stamping again
        let h = repo.add(&tenbytes(4), 0, false);
        assert_eq!(h, 0x44332212);
        let rec = repo.record(repo.find_record(h).unwrap());
        assert_eq!(rec.data()[..4], h.to_le_bytes());
        assert_eq!(rec.data()[4..], tenbytes(4)[4..]);
    }

    #[test]
    #[should_panic(expected = "record handle space exhausted")]
    fn handle_space_exhausted() {
        let mut repo = Repo::new();
        repo.add(&tenbytes(1), u32::MAX, false);
        repo.add(&tenbytes(2), 0, false);
    }

    #[test]
    fn find_by_type() {
        let mut repo = Repo::new();
        repo.add(&[0u8; 4], 0, false); // shorter than a common header
        let fru = repo.add_fru_record_set(1, 1, 1, 1, 1);
        let mut assoc = [0u8; 20];
        assoc[4] = 1;
        assoc[5] = PdrType::EntityAssociation as u8;
        let ea = repo.add(&assoc, 0, false);
        let fru2 = repo.add_fru_record_set(1, 2, 1, 2, 1);

        let r = repo
            .find_record_by_type(PdrType::FruRecordSet as u8, None)
            .unwrap();
        assert_eq!(repo.record(r).handle(), fru);
        let r2 = repo
            .find_record_by_type(PdrType::FruRecordSet as u8, Some(r))
            .unwrap();
        assert_eq!(repo.record(r2).handle(), fru2);
        assert!(repo
            .find_record_by_type(PdrType::FruRecordSet as u8, Some(r2))
            .is_none());

        let r = repo
            .find_record_by_type(PdrType::EntityAssociation as u8, None)
            .unwrap();
        assert_eq!(repo.record(r).handle(), ea);
    }

    proptest! {
        #[test]
        fn prop_handle_stability(
            recs in proptest::collection::vec(
                (proptest::collection::vec(1u8..=255, 1..24), any::<bool>()),
                1..24,
            )
        ) {
            let mut repo = Repo::new();
            let mut local = alloc::vec::Vec::new();
            for (data, remote) in &recs {
                let h = repo.add(data, 0, *remote);
                if !remote {
                    let mut stored = data.clone();
                    if stored.len() >= 4 {
                        stored[..4].copy_from_slice(&h.to_le_bytes());
                    }
                    local.push((h, stored));
                }
            }

            repo.remove_remote_pdrs();

            prop_assert_eq!(repo.record_count() as usize, local.len());
            let mut cur = repo.find_record(0);
            for (h, data) in &local {
                let r = cur.unwrap();
                prop_assert_eq!(repo.record(r).handle(), *h);
                prop_assert_eq!(repo.record(r).data(), &data[..]);
                cur = repo.next_record(r);
            }
            prop_assert!(cur.is_none());
        }

        #[test]
        fn prop_iteration_complete(n in 1usize..32) {
            let mut repo = Repo::new();
            for i in 0..n {
                repo.add(&[i as u8 + 1; 6], 0, false);
            }

            let mut visited = 0;
            let mut r = repo.find_record(0).unwrap();
            loop {
                visited += 1;
                let next = repo.next_record_handle(r);
                if next == 0 {
                    break;
                }
                r = repo.find_record(next).unwrap();
            }
            prop_assert_eq!(visited, n);
        }

        #[test]
        fn prop_fru_roundtrip(
            sets in proptest::collection::btree_map(
                any::<u16>(),
                (any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>()),
                1..12,
            )
        ) {
            let mut repo = Repo::new();
            for (rsi, (term, typ, inst, cid)) in &sets {
                repo.add_fru_record_set(*term, *rsi, *typ, *inst, *cid);
            }
            for (rsi, (term, typ, inst, cid)) in &sets {
                let (_, frs) = repo.fru_record_set_find_by_rsi(*rsi).unwrap();
                prop_assert_eq!(frs.terminus_handle, *term);
                prop_assert_eq!(frs.entity_type, *typ);
                prop_assert_eq!(frs.entity_instance_num, *inst);
                prop_assert_eq!(frs.container_id, *cid);
            }
        }
    }
}
