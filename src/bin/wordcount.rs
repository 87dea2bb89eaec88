use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use pair_shuffle::wordcount::word_count;
use pair_shuffle::{ComparatorRegistry, ShuffleOptions};

/// Count whitespace-separated words in a text file.
#[derive(Parser)]
#[command(name = "wordcount")]
struct Cli {
    /// Input text file, one record per line
    input: PathBuf,

    /// Output file, written as `word<TAB>count` lines
    output: PathBuf,

    /// Number of reduce partitions
    #[arg(short, long, default_value_t = 1)]
    partitions: usize,

    /// Records buffered per partition before a sorted run is cut
    #[arg(long, default_value_t = 64 * 1024)]
    sort_buffer: usize,

    /// Key and value bytes buffered per partition before a sorted run is cut
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    sort_buffer_bytes: usize,

    /// Spill sorted runs to this directory instead of keeping them in memory
    #[arg(long)]
    spill_dir: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    let mut options = ShuffleOptions::default()
        .with_partitions(cli.partitions)
        .with_sort_buffer_records(cli.sort_buffer)
        .with_sort_buffer_bytes(cli.sort_buffer_bytes);
    if let Some(dir) = &cli.spill_dir {
        options = options.with_spill_dir(dir);
    }
    debug!(?options, "shuffle options");

    let input = File::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    let lines = BufReader::new(input)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let registry = ComparatorRegistry::with_defaults();
    let counts = word_count(&lines, options, &registry)?;

    let output = File::create(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;
    let mut writer = BufWriter::new(output);
    for (word, count) in &counts {
        writeln!(writer, "{word}\t{count}")?;
    }
    writer.flush()?;

    info!(
        lines = lines.len(),
        words = counts.len(),
        output = %cli.output.display(),
        "wrote word counts"
    );
    Ok(())
}
