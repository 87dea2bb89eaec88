//! In-process shuffle: partition, sort, optionally spill, then merge.
//!
//! ```text
//! write(p, key, value) ─► SortBuffer[p] ──full──► sort ─► combine? ─► run (memory or spill file)
//!                                                                       │
//! finish() ─► ShuffleOutput ─► merge_partition(p) ─► MergeIterator over p's runs
//! ```
//!
//! A spilled run is read back one record at a time during the merge, and
//! its file is removed as soon as nothing refers to it any more: after the
//! merge that read it, or when the `ShuffleOutput` holding it is dropped.

pub mod buffer;
pub mod run;
pub mod spill;

use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::comparator::RawComparator;
use crate::error::{Error, Result};
use crate::iterator::{MergeIterator, RecordIterator};
use crate::types::{RawKey, RawValue};

pub use buffer::SortBuffer;
pub use run::{RunIterator, SortedRun};
pub use spill::{SpillFile, SpillReader};

/// Tuning knobs for a shuffle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOptions {
    /// Number of reduce partitions. Must be at least 1.
    pub num_partitions: usize,
    /// Records buffered per partition before a sorted run is cut.
    pub sort_buffer_records: usize,
    /// Key plus value bytes buffered per partition before a sorted run is
    /// cut, whichever limit is reached first.
    pub sort_buffer_bytes: usize,
    /// Where to write sorted runs. `None` keeps them in memory.
    pub spill_dir: Option<PathBuf>,
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        ShuffleOptions {
            num_partitions: 1,
            sort_buffer_records: 64 * 1024,
            sort_buffer_bytes: 16 * 1024 * 1024,
            spill_dir: None,
        }
    }
}

impl ShuffleOptions {
    pub fn with_partitions(mut self, num_partitions: usize) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    pub fn with_sort_buffer_records(mut self, records: usize) -> Self {
        self.sort_buffer_records = records;
        self
    }

    pub fn with_sort_buffer_bytes(mut self, bytes: usize) -> Self {
        self.sort_buffer_bytes = bytes;
        self
    }

    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_partitions == 0 {
            return Err(Error::Config("num_partitions must be > 0".into()));
        }
        if self.sort_buffer_records == 0 {
            return Err(Error::Config("sort_buffer_records must be > 0".into()));
        }
        if self.sort_buffer_bytes == 0 {
            return Err(Error::Config("sort_buffer_bytes must be > 0".into()));
        }
        if let Some(dir) = &self.spill_dir {
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "spill_dir {} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

/// Hook applied to each sorted run before it is stored.
///
/// The returned run must still be sorted under the shuffle's comparator.
pub type RunCombiner<'a> = Box<dyn FnMut(SortedRun) -> Result<SortedRun> + 'a>;

/// Where a sorted run ended up.
#[derive(Debug)]
pub enum RunHandle {
    Memory(SortedRun),
    Spilled { file: SpillFile, records: usize },
}

impl RunHandle {
    pub fn len(&self) -> usize {
        match self {
            RunHandle::Memory(run) => run.len(),
            RunHandle::Spilled { records, .. } => *records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn the run into a record cursor.
    ///
    /// A spilled run is verified and then streamed from disk; its file goes
    /// away when the cursor is dropped.
    pub fn into_cursor(self) -> Result<Box<dyn RecordIterator>> {
        Ok(match self {
            RunHandle::Memory(run) => Box::new(run.into_cursor()),
            RunHandle::Spilled { file, .. } => Box::new(file.open()?),
        })
    }
}

/// Map side of the shuffle.
///
/// Takes already-serialized records with their partition, sorts them in
/// bounded batches with the sort comparator, and keeps the resulting runs
/// until `finish`.
pub struct ShuffleWriter<'a> {
    options: ShuffleOptions,
    comparator: Arc<dyn RawComparator>,
    buffers: Vec<SortBuffer>,
    runs: Vec<Vec<RunHandle>>,
    combiner: Option<RunCombiner<'a>>,
    spill_count: usize,
    records_written: u64,
}

impl<'a> ShuffleWriter<'a> {
    pub fn new(options: ShuffleOptions, comparator: Arc<dyn RawComparator>) -> Result<Self> {
        options.validate()?;
        let n = options.num_partitions;
        Ok(ShuffleWriter {
            options,
            comparator,
            buffers: (0..n).map(|_| SortBuffer::new()).collect(),
            runs: (0..n).map(|_| Vec::new()).collect(),
            combiner: None,
            spill_count: 0,
            records_written: 0,
        })
    }

    pub fn with_combiner(mut self, combiner: RunCombiner<'a>) -> Self {
        self.combiner = Some(combiner);
        self
    }

    pub fn num_partitions(&self) -> usize {
        self.options.num_partitions
    }

    /// Total records accepted by `write`.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Buffer one record for `partition`, cutting a run once the buffer hits
    /// either its record or its byte limit.
    pub fn write(&mut self, partition: usize, key: RawKey, value: RawValue) -> Result<()> {
        let Some(buffer) = self.buffers.get_mut(partition) else {
            return Err(Error::Config(format!(
                "partition {partition} out of range (num_partitions = {})",
                self.options.num_partitions
            )));
        };
        buffer.push(key, value);
        self.records_written += 1;

        if buffer.len() >= self.options.sort_buffer_records
            || buffer.size_bytes() >= self.options.sort_buffer_bytes
        {
            self.cut_run(partition)?;
        }
        Ok(())
    }

    fn cut_run(&mut self, partition: usize) -> Result<()> {
        let buffer = mem::take(&mut self.buffers[partition]);
        if buffer.is_empty() {
            return Ok(());
        }
        let buffered = buffer.len();

        let mut run = buffer.sort(self.comparator.as_ref())?;
        if let Some(combine) = self.combiner.as_mut() {
            run = combine(run)?;
        }

        let handle = match &self.options.spill_dir {
            Some(dir) => {
                let file = SpillFile::new(dir.join(format!(
                    "part-{partition:05}-spill-{:05}.run",
                    self.spill_count
                )));
                self.spill_count += 1;
                let bytes = spill::write_run(file.path(), &run)?;
                debug!(
                    partition,
                    buffered,
                    records = run.len(),
                    bytes,
                    path = %file.path().display(),
                    "spilled sorted run"
                );
                RunHandle::Spilled {
                    file,
                    records: run.len(),
                }
            }
            None => {
                debug!(partition, buffered, records = run.len(), "cut sorted run");
                RunHandle::Memory(run)
            }
        };
        self.runs[partition].push(handle);
        Ok(())
    }

    /// Sort whatever is still buffered and hand the runs to the reduce side.
    pub fn finish(mut self) -> Result<ShuffleOutput> {
        for partition in 0..self.options.num_partitions {
            self.cut_run(partition)?;
        }
        debug!(
            records = self.records_written,
            runs = self.runs.iter().map(Vec::len).sum::<usize>(),
            "map side finished"
        );
        Ok(ShuffleOutput {
            partitions: self.runs,
            comparator: self.comparator,
        })
    }
}

/// Reduce side of the shuffle: the sorted runs of every partition.
pub struct ShuffleOutput {
    partitions: Vec<Vec<RunHandle>>,
    comparator: Arc<dyn RawComparator>,
}

impl ShuffleOutput {
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Runs currently held for `partition`.
    pub fn runs(&self, partition: usize) -> &[RunHandle] {
        self.partitions
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Take `partition`'s runs and merge them into one sorted stream.
    ///
    /// Spilled runs are checksummed here and then streamed record by record
    /// as the merge advances. A partition can only be merged once; a second
    /// call yields an empty stream.
    pub fn merge_partition(&mut self, partition: usize) -> Result<MergeIterator> {
        let handles = match self.partitions.get_mut(partition) {
            Some(runs) => mem::take(runs),
            None => {
                return Err(Error::Config(format!(
                    "partition {partition} out of range (num_partitions = {})",
                    self.partitions.len()
                )));
            }
        };

        let mut sources: Vec<Box<dyn RecordIterator>> = Vec::with_capacity(handles.len());
        for handle in handles {
            sources.push(handle.into_cursor()?);
        }
        debug!(partition, runs = sources.len(), "merging partition");
        MergeIterator::new(sources, Arc::clone(&self.comparator))
    }
}
