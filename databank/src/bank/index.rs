//! The primary key hash index, guarded by the bank lock
use crate::{
    error::{Error, Result},
    hash::{hash_u64, PRIMARY_KEY_SEED},
};
use smallvec::SmallVec;
use std::mem;

/// Bucket list of arena slots. Most buckets hold one or two records.
pub(crate) type Bucket = SmallVec<[u32; 2]>;

#[derive(Debug)]
pub(crate) struct PrimaryKeyIndex {
    next_primary_key: u64,
    buckets: Vec<Bucket>,
    entries: usize,
}

impl PrimaryKeyIndex {
    /// `slot_count` must be a power of two
    pub fn new(slot_count: u64, next_primary_key: u64) -> Self {
        debug_assert!(slot_count.is_power_of_two());
        Self {
            next_primary_key,
            buckets: vec![Bucket::new(); slot_count as usize],
            entries: 0,
        }
    }

    /// bytes taken by the bucket table itself
    pub fn table_size(slot_count: u64) -> u64 {
        slot_count.saturating_mul(mem::size_of::<Bucket>() as u64)
    }

    pub fn slot_count(&self) -> u64 {
        self.buckets.len() as u64
    }

    pub fn bucket_of(&self, primary_key: u64) -> usize {
        bucket_of(primary_key, self.slot_count())
    }

    pub fn next_primary_key(&self) -> u64 {
        self.next_primary_key
    }

    /// hand out the next primary key
    pub fn take_primary_key(&mut self) -> Result<u64> {
        let pk = self.next_primary_key;
        if pk == u64::MAX {
            return Err(Error::ReservedPrimaryKey);
        }
        self.next_primary_key += 1;
        Ok(pk)
    }

    /// Append a record to the end of its bucket.
    ///
    /// Keys assigned explicitly move the counter past them, so auto-assigned keys never
    /// collide with them.
    pub fn insert(&mut self, primary_key: u64, slot: u32) {
        let bucket = self.bucket_of(primary_key);
        self.buckets[bucket].push(slot);
        self.entries += 1;
        if primary_key >= self.next_primary_key {
            self.next_primary_key = primary_key.saturating_add(1);
        }
    }

    /// arena slots in the bucket of `primary_key`, in insertion order
    pub fn candidates(&self, primary_key: u64) -> &[u32] {
        &self.buckets[self.bucket_of(primary_key)]
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn bucket_lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.buckets.iter().map(|b| b.len())
    }
}

/// bucket of a primary key in a table of `slot_count` buckets
pub(crate) fn bucket_of(primary_key: u64, slot_count: u64) -> usize {
    (u64::from(hash_u64(primary_key, PRIMARY_KEY_SEED)) & (slot_count - 1)) as usize
}
