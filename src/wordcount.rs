//! Word count over the local shuffle.
//!
//! Tokens are whitespace-separated. The combiner and the reducer are the
//! same sum, so each sorted run carries at most one record per word.

use tracing::info;

use crate::error::Result;
use crate::job::{LocalJob, OutputCollector, ReduceGroup};
use crate::registry::ComparatorRegistry;
use crate::shuffle::ShuffleOptions;

/// Split a line into words.
pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
}

/// Emit `(word, 1)` for every token of `line`, reusing one key buffer.
pub fn map_line(line: &str, out: &mut dyn OutputCollector<String, u64>) -> Result<()> {
    let mut word = String::new();
    for token in tokenize(line) {
        word.clear();
        word.push_str(token);
        out.collect(&word, &1)?;
    }
    Ok(())
}

/// Add up the counts for one word.
pub fn sum_counts(_word: &String, counts: Vec<u64>) -> Result<u64> {
    Ok(counts.into_iter().sum())
}

/// Count words across `lines`.
///
/// Results are grouped by partition and sorted by word within each one;
/// with a single partition the whole result is sorted.
pub fn word_count<I, S>(
    lines: I,
    options: ShuffleOptions,
    registry: &ComparatorRegistry,
) -> Result<Vec<(String, u64)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let job = LocalJob::<String, u64>::new("word-count", options, registry)?.combiner(sum_counts);
    let counts = job.run(
        lines,
        |line, out| map_line(line.as_ref(), out),
        |group: ReduceGroup<String, u64>| {
            let total = sum_counts(group.key(), group.values().copied().collect())?;
            Ok((group.key().clone(), total))
        },
    )?;
    info!(distinct_words = counts.len(), "word count done");
    Ok(counts)
}
