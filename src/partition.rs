use crate::writable::{field_hash, CompositeKey, WritableComparable};

/// Routes a key to one of `num_partitions` reduce partitions.
///
/// Every key that a reducer must see together has to land in the same
/// partition. `num_partitions` is never zero.
pub trait Partitioner<K>: Send + Sync {
    fn partition(&self, key: &K, num_partitions: usize) -> usize;
}

/// Partitions on the key's full `hash_code`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashPartitioner;

impl<K: WritableComparable> Partitioner<K> for HashPartitioner {
    fn partition(&self, key: &K, num_partitions: usize) -> usize {
        (key.hash_code() % num_partitions as u64) as usize
    }
}

/// Partitions composite keys on `first` only.
///
/// Needed whenever grouping uses `PrimaryFieldComparator`: hashing both
/// fields would scatter one group across several reducers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFieldPartitioner;

impl Partitioner<CompositeKey> for FirstFieldPartitioner {
    fn partition(&self, key: &CompositeKey, num_partitions: usize) -> usize {
        (field_hash(key.first().as_bytes()) % num_partitions as u64) as usize
    }
}
