//! # Pair Shuffle
//!
//! Composite keys and raw-byte comparators for sort-based shuffles.
//!
//! ## Core idea
//! A shuffle sorts millions of serialized keys, and deserializing both sides
//! of every comparison would dominate the sort. `CompositeKey` serializes to
//! two length-prefixed fields, and the comparators order those bytes
//! directly, decoding nothing but the length prefixes.
//!
//! Sorting on both fields while grouping on the first alone gives the
//! secondary sort: one reduce call per `first`, values ordered by `second`.
//! The local job runner and word count exist to drive that machinery end
//! to end.

pub mod comparator;
pub mod error;
pub mod iterator;
pub mod job;
pub mod partition;
pub mod registry;
pub mod shuffle;
pub mod types;
pub mod varint;
pub mod wordcount;
pub mod writable;

// Public re-exports for the top-level API
pub use comparator::{
    FullOrderComparator, KeyComparator, PrimaryFieldComparator, RawComparator, TextComparator,
};
pub use error::{DecodeError, Error, Result};
pub use job::{LocalJob, OutputCollector, ReduceGroup};
pub use partition::{FirstFieldPartitioner, HashPartitioner, Partitioner};
pub use registry::ComparatorRegistry;
pub use shuffle::ShuffleOptions;
pub use writable::{CompositeKey, CompositeKeyRef, Writable, WritableComparable};
