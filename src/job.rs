//! A local map → shuffle → reduce driver over typed keys and values.
//!
//! Keys are serialized the moment a mapper hands them over, so mappers are
//! free to reuse one mutable key instance for every record. From then on
//! the shuffle only touches bytes: the sort comparator comes from the
//! registry, and the grouping comparator is whatever the job selects
//! (by default the same full order).

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

use crate::comparator::RawComparator;
use crate::error::Result;
use crate::iterator::GroupIterator;
use crate::partition::{HashPartitioner, Partitioner};
use crate::registry::ComparatorRegistry;
use crate::shuffle::{ShuffleOptions, ShuffleWriter, SortedRun};
use crate::types::Record;
use crate::writable::{Writable, WritableComparable};

/// Receives (key, value) pairs from a map or reduce step.
///
/// Implementations must not keep references to `key` or `value`; take a
/// copy if the pair has to outlive the call.
pub trait OutputCollector<K, V> {
    fn collect(&mut self, key: &K, value: &V) -> Result<()>;
}

impl<K: Clone, V: Clone> OutputCollector<K, V> for Vec<(K, V)> {
    fn collect(&mut self, key: &K, value: &V) -> Result<()> {
        self.push((key.clone(), value.clone()));
        Ok(())
    }
}

/// Collector handed to mappers: serializes, partitions, and writes to the shuffle.
struct MapCollector<'w, 'a, K, V> {
    writer: &'w mut ShuffleWriter<'a>,
    partitioner: &'w dyn Partitioner<K>,
    _marker: PhantomData<fn(&V)>,
}

impl<K: Writable, V: Writable> OutputCollector<K, V> for MapCollector<'_, '_, K, V> {
    fn collect(&mut self, key: &K, value: &V) -> Result<()> {
        let partition = self
            .partitioner
            .partition(key, self.writer.num_partitions());
        self.writer.write(partition, key.encode(), value.encode())
    }
}

/// Every record of one reduce group, decoded.
///
/// Entries are in full sort order. Under a grouping comparator coarser than
/// the sort order the keys differ within a group (for a secondary sort,
/// in their second field), which is why each value keeps its own key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceGroup<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> ReduceGroup<K, V> {
    /// The group's key: the key of its first entry.
    pub fn key(&self) -> &K {
        &self.entries[0].0
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type Combiner<K, V> = Box<dyn Fn(&K, Vec<V>) -> Result<V> + Send + Sync>;

/// A configured local job.
///
/// ```ignore
/// let job = LocalJob::<CompositeKey, u64>::new("by-first", options, &registry)?
///     .partitioner(FirstFieldPartitioner)
///     .grouping_comparator(Arc::new(PrimaryFieldComparator));
/// let out = job.run(inputs, mapper, reducer)?;
/// ```
pub struct LocalJob<K, V> {
    name: String,
    options: ShuffleOptions,
    sort_comparator: Arc<dyn RawComparator>,
    group_comparator: Arc<dyn RawComparator>,
    partitioner: Box<dyn Partitioner<K>>,
    combiner: Option<Combiner<K, V>>,
}

impl<K, V> LocalJob<K, V>
where
    K: WritableComparable,
    V: Writable + Default + 'static,
{
    /// Set up a job sorting `K` with the comparator registered for it.
    pub fn new(
        name: impl Into<String>,
        options: ShuffleOptions,
        registry: &ComparatorRegistry,
    ) -> Result<Self> {
        options.validate()?;
        let sort_comparator = registry.comparator_for::<K>()?;
        Ok(LocalJob {
            name: name.into(),
            options,
            group_comparator: Arc::clone(&sort_comparator),
            sort_comparator,
            partitioner: Box::new(HashPartitioner),
            combiner: None,
        })
    }

    /// Decide reduce-group boundaries with `comparator` instead of the sort order.
    ///
    /// It must be no finer than the sort order: keys equal under the sort
    /// comparator must be equal under this one, or groups split arbitrarily.
    pub fn grouping_comparator(mut self, comparator: Arc<dyn RawComparator>) -> Self {
        self.group_comparator = comparator;
        self
    }

    pub fn partitioner(mut self, partitioner: impl Partitioner<K> + 'static) -> Self {
        self.partitioner = Box::new(partitioner);
        self
    }

    /// Fold each key's values into one value on the map side.
    ///
    /// Applied to every sorted run before it is stored, grouping by the sort
    /// order. May run zero or more times per key, so it must be associative
    /// and produce a value the reducer accepts as input.
    pub fn combiner(
        mut self,
        combiner: impl Fn(&K, Vec<V>) -> Result<V> + Send + Sync + 'static,
    ) -> Self {
        self.combiner = Some(Box::new(combiner));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `mapper` over every input, shuffle, and run `reducer` once per group.
    ///
    /// Outputs come back partition by partition, each partition in sort order.
    pub fn run<I, T, M, R, O>(&self, inputs: I, mut mapper: M, mut reducer: R) -> Result<Vec<O>>
    where
        I: IntoIterator<Item = T>,
        M: FnMut(T, &mut dyn OutputCollector<K, V>) -> Result<()>,
        R: FnMut(ReduceGroup<K, V>) -> Result<O>,
    {
        let mut writer = ShuffleWriter::new(self.options.clone(), Arc::clone(&self.sort_comparator))?;
        if self.combiner.is_some() {
            writer = writer.with_combiner(Box::new(|run: SortedRun| self.combine_run(run)));
        }

        let mut inputs_read = 0u64;
        {
            let mut collector = MapCollector::<K, V> {
                writer: &mut writer,
                partitioner: self.partitioner.as_ref(),
                _marker: PhantomData,
            };
            for input in inputs {
                mapper(input, &mut collector)?;
                inputs_read += 1;
            }
        }
        let map_records = writer.records_written();
        debug!(job = %self.name, inputs = inputs_read, records = map_records, "map phase done");

        let mut shuffled = writer.finish()?;
        let mut outputs = Vec::new();
        let mut groups = 0u64;
        for partition in 0..shuffled.num_partitions() {
            let merged = shuffled.merge_partition(partition)?;
            let mut partition_groups = 0u64;
            for group in GroupIterator::new(merged, Arc::clone(&self.group_comparator)) {
                outputs.push(reducer(decode_group(group?)?)?);
                partition_groups += 1;
            }
            debug!(job = %self.name, partition, groups = partition_groups, "partition reduced");
            groups += partition_groups;
        }

        info!(
            job = %self.name,
            inputs = inputs_read,
            map_records,
            groups,
            sort = self.sort_comparator.name(),
            grouping = self.group_comparator.name(),
            "job finished"
        );
        Ok(outputs)
    }

    fn combine_run(&self, run: SortedRun) -> Result<SortedRun> {
        let Some(combine) = &self.combiner else {
            return Ok(run);
        };
        let before = run.len();
        let mut combined = Vec::new();
        for group in GroupIterator::new(run.into_cursor(), Arc::clone(&self.sort_comparator)) {
            let group = group?;
            let (key, _) = K::decode(&group[0].key)?;
            let values = group
                .iter()
                .map(|r| V::decode(&r.value).map(|(v, _)| v))
                .collect::<Result<Vec<_>>>()?;
            let value = combine(&key, values)?;
            combined.push(Record::new(group[0].key.clone(), value.encode()));
        }
        debug!(job = %self.name, before, after = combined.len(), "combined run");
        Ok(SortedRun::new(combined))
    }
}

/// `records` is never empty: `GroupIterator` only yields non-empty groups.
fn decode_group<K, V>(records: Vec<Record>) -> Result<ReduceGroup<K, V>>
where
    K: Writable + Default,
    V: Writable + Default,
{
    let entries = records
        .iter()
        .map(|r| {
            let (key, _) = K::decode(&r.key)?;
            let (value, _) = V::decode(&r.value)?;
            Ok((key, value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ReduceGroup { entries })
}
