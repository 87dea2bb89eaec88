// Shuffle tests
// Sort buffers, merge of sorted runs, grouping, and spill files.

use std::sync::Arc;

use tempfile::tempdir;

use pair_shuffle::iterator::{GroupIterator, MergeIterator, RecordIterator};
use pair_shuffle::shuffle::spill::{read_run, write_run};
use pair_shuffle::shuffle::{RunHandle, ShuffleWriter, SortBuffer, SortedRun, SpillFile, SpillReader};
use pair_shuffle::types::Record;
use pair_shuffle::{
    CompositeKey, Error, FullOrderComparator, PrimaryFieldComparator, RawComparator,
    ShuffleOptions, Writable,
};

fn raw(first: &str, second: &str) -> Vec<u8> {
    CompositeKey::new(first, second).encode()
}

fn decode_key(bytes: &[u8]) -> (String, String) {
    CompositeKey::decode(bytes).unwrap().0.into_parts()
}

fn full() -> Arc<dyn RawComparator> {
    Arc::new(FullOrderComparator)
}

fn sorted_run(pairs: &[(&str, &str)]) -> SortedRun {
    let mut buffer = SortBuffer::new();
    for (i, (f, s)) in pairs.iter().enumerate() {
        buffer.push(raw(f, s), vec![i as u8]);
    }
    buffer.sort(&FullOrderComparator).unwrap()
}

fn drain(mut iter: impl RecordIterator) -> Vec<(String, String)> {
    let mut out = Vec::new();
    while iter.is_valid() {
        out.push(decode_key(iter.key()));
        iter.next().unwrap();
    }
    out
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(f, s)| (f.to_string(), s.to_string()))
        .collect()
}

// =============================================================================
// Sort buffer
// =============================================================================
#[test]
fn sort_buffer_orders_by_full_key() {
    let run = sorted_run(&[("banana", "1"), ("apple", "2"), ("apple", "1")]);
    assert_eq!(
        drain(run.into_cursor()),
        owned(&[("apple", "1"), ("apple", "2"), ("banana", "1")])
    );
}

#[test]
fn sort_buffer_is_stable_for_equal_keys() {
    let run = sorted_run(&[("k", "v"), ("a", "a"), ("k", "v"), ("k", "v")]);
    let values: Vec<u8> = run.records().iter().map(|r| r.value[0]).collect();
    assert_eq!(values, vec![1, 0, 2, 3]);
}

#[test]
fn sort_buffer_tracks_size() {
    let mut buffer = SortBuffer::new();
    assert!(buffer.is_empty());
    buffer.push(vec![1, 2, 3], vec![4]);
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.size_bytes(), 4);
}

#[test]
fn sort_buffer_fails_on_corrupt_key() {
    let mut buffer = SortBuffer::new();
    buffer.push(raw("a", "b"), Vec::new());
    buffer.push(vec![0x7F, b'x'], Vec::new());
    buffer.push(raw("c", "d"), Vec::new());
    assert!(matches!(
        buffer.sort(&FullOrderComparator),
        Err(Error::Decode(_))
    ));
}

// =============================================================================
// Merge
// =============================================================================
#[test]
fn merge_interleaves_sorted_runs() {
    let runs = vec![
        sorted_run(&[("a", "1"), ("c", "1"), ("e", "1")]),
        sorted_run(&[("b", "1"), ("c", "0"), ("f", "1")]),
        sorted_run(&[]),
        sorted_run(&[("a", "0"), ("d", "9")]),
    ];
    let sources: Vec<Box<dyn RecordIterator>> = runs
        .into_iter()
        .map(|r| Box::new(r.into_cursor()) as Box<dyn RecordIterator>)
        .collect();
    let merged = MergeIterator::new(sources, full()).unwrap();
    assert_eq!(merged.num_sources(), 4);
    assert_eq!(
        drain(merged),
        owned(&[
            ("a", "0"),
            ("a", "1"),
            ("b", "1"),
            ("c", "0"),
            ("c", "1"),
            ("d", "9"),
            ("e", "1"),
            ("f", "1"),
        ])
    );
}

#[test]
fn merge_breaks_ties_by_source_order() {
    let mut first = SortBuffer::new();
    first.push(raw("k", "v"), b"run0".to_vec());
    let mut second = SortBuffer::new();
    second.push(raw("k", "v"), b"run1".to_vec());

    let sources: Vec<Box<dyn RecordIterator>> = vec![
        Box::new(second.sort(&FullOrderComparator).unwrap().into_cursor()),
        Box::new(first.sort(&FullOrderComparator).unwrap().into_cursor()),
    ];
    let mut merged = MergeIterator::new(sources, full()).unwrap();
    assert_eq!(merged.value(), b"run1");
    merged.next().unwrap();
    assert_eq!(merged.value(), b"run0");
    merged.next().unwrap();
    assert!(!merged.is_valid());
}

#[test]
fn merge_of_nothing_is_invalid() {
    let merged = MergeIterator::new(Vec::new(), full()).unwrap();
    assert!(!merged.is_valid());
    assert_eq!(merged.key(), b"");
}

// =============================================================================
// Grouping
// =============================================================================
#[test]
fn primary_field_groups_example_keys() {
    let run = sorted_run(&[("banana", "1"), ("apple", "2"), ("apple", "1")]);
    let groups: Vec<Vec<(String, String)>> =
        GroupIterator::new(run.into_cursor(), Arc::new(PrimaryFieldComparator))
            .map(|g| g.unwrap().iter().map(|r| decode_key(&r.key)).collect())
            .collect();

    assert_eq!(
        groups,
        vec![
            owned(&[("apple", "1"), ("apple", "2")]),
            owned(&[("banana", "1")]),
        ]
    );
}

#[test]
fn full_order_groups_only_identical_keys() {
    let run = sorted_run(&[("a", "1"), ("a", "2"), ("a", "1")]);
    let sizes: Vec<usize> = GroupIterator::new(run.into_cursor(), full())
        .map(|g| g.unwrap().len())
        .collect();
    assert_eq!(sizes, vec![2, 1]);
}

#[test]
fn grouping_sorted_keys_matches_grouping_by_first() {
    use std::collections::{BTreeMap, BTreeSet};

    let pairs: Vec<(String, String)> = (0..200)
        .map(|i| (format!("g{}", (i * 7) % 13), format!("s{}", (i * 31) % 17)))
        .collect();

    let mut expected: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
    for (f, s) in &pairs {
        expected
            .entry(f.clone())
            .or_default()
            .insert((f.clone(), s.clone()));
    }

    let mut buffer = SortBuffer::new();
    for (f, s) in &pairs {
        buffer.push(raw(f, s), Vec::new());
    }
    let run = buffer.sort(&FullOrderComparator).unwrap();

    let mut actual: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
    for group in GroupIterator::new(run.into_cursor(), Arc::new(PrimaryFieldComparator)) {
        let keys: Vec<_> = group.unwrap().iter().map(|r| decode_key(&r.key)).collect();
        let first = keys[0].0.clone();
        assert!(keys.iter().all(|(f, _)| *f == first));
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        let previous = actual.insert(first, keys.into_iter().collect());
        assert!(previous.is_none(), "a first field appeared in two groups");
    }

    assert_eq!(actual, expected);
}

#[test]
fn group_iterator_stops_after_error() {
    let records = vec![
        Record::new(raw("a", "1"), Vec::new()),
        Record::new(vec![0x09], Vec::new()),
        Record::new(raw("b", "1"), Vec::new()),
    ];
    let mut groups = GroupIterator::new(
        SortedRun::new(records).into_cursor(),
        Arc::new(PrimaryFieldComparator),
    );
    assert!(groups.next().unwrap().is_err());
    assert!(groups.next().is_none());
}

// =============================================================================
// Spill files
// =============================================================================
#[test]
fn spill_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.spill");
    let run = sorted_run(&[("x", "1"), ("", ""), ("x", "0")]);

    let bytes = write_run(&path, &run).unwrap();
    assert_eq!(bytes, std::fs::metadata(&path).unwrap().len());
    assert_eq!(read_run(&path).unwrap(), run);
}

#[test]
fn empty_spill_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.spill");
    write_run(&path, &SortedRun::default()).unwrap();
    assert!(read_run(&path).unwrap().is_empty());
}

#[test]
fn corrupted_spill_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.spill");
    write_run(&path, &sorted_run(&[("key", "value")])).unwrap();

    let mut data = std::fs::read(&path).unwrap();
    data[2] ^= 0xFF;
    std::fs::write(&path, &data).unwrap();

    assert!(matches!(read_run(&path), Err(Error::Corruption(_))));
}

#[test]
fn truncated_spill_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.spill");
    write_run(&path, &sorted_run(&[("key", "value")])).unwrap();

    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() - 3]).unwrap();

    assert!(matches!(read_run(&path), Err(Error::Corruption(_))));
}

#[test]
fn corrupted_trailer_count_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.spill");
    write_run(&path, &sorted_run(&[("key", "value")])).unwrap();

    // The record count sits at the start of the 20-byte trailer and is not
    // covered by the checksum.
    let mut data = std::fs::read(&path).unwrap();
    let count_at = data.len() - 20;
    data[count_at..count_at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    std::fs::write(&path, &data).unwrap();

    assert!(matches!(read_run(&path), Err(Error::Corruption(_))));
}

#[test]
fn spill_reader_streams_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.spill");
    let run = sorted_run(&[("a", "1"), ("b", "2"), ("c", "3")]);
    write_run(&path, &run).unwrap();

    let reader = SpillReader::open(&path).unwrap();
    assert_eq!(reader.expected_records(), 3);
    assert_eq!(drain(reader), owned(&[("a", "1"), ("b", "2"), ("c", "3")]));
    assert!(path.exists(), "a reader opened by path leaves the file alone");

    let mut reader = SpillFile::new(&path).open().unwrap();
    assert!(reader.is_valid());
    assert_eq!(reader.value(), &[0]);
    reader.next().unwrap();
    drop(reader);
    assert!(!path.exists(), "dropping an owning reader removes the file");
}

#[test]
fn spill_reader_checks_body_on_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.spill");
    write_run(&path, &sorted_run(&[("key", "value"), ("other", "value")])).unwrap();

    let mut data = std::fs::read(&path).unwrap();
    let last_body_byte = data.len() - 21;
    data[last_body_byte] ^= 0x01;
    std::fs::write(&path, &data).unwrap();

    assert!(matches!(SpillReader::open(&path), Err(Error::Corruption(_))));
}

#[test]
fn failed_spill_write_leaves_no_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("run.spill");
    let file = SpillFile::new(&path);
    assert!(matches!(
        write_run(file.path(), &sorted_run(&[("a", "b")])),
        Err(Error::Io(_))
    ));
    drop(file);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// =============================================================================
// Writer and output
// =============================================================================
#[test]
fn options_are_validated() {
    assert!(ShuffleOptions::default().validate().is_ok());
    assert!(matches!(
        ShuffleOptions::default().with_partitions(0).validate(),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        ShuffleOptions::default().with_sort_buffer_records(0).validate(),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        ShuffleOptions::default().with_sort_buffer_bytes(0).validate(),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        ShuffleOptions::default()
            .with_spill_dir("/definitely/not/a/real/dir")
            .validate(),
        Err(Error::Config(_))
    ));
}

#[test]
fn writer_rejects_unknown_partition() {
    let options = ShuffleOptions::default().with_partitions(2);
    let mut writer = ShuffleWriter::new(options, full()).unwrap();
    assert!(matches!(
        writer.write(2, raw("a", "b"), Vec::new()),
        Err(Error::Config(_))
    ));
}

#[test]
fn writer_cuts_runs_when_buffer_fills() {
    let options = ShuffleOptions::default().with_sort_buffer_records(3);
    let mut writer = ShuffleWriter::new(options, full()).unwrap();
    for i in (0..10).rev() {
        writer.write(0, raw("k", &format!("{i}")), Vec::new()).unwrap();
    }
    assert_eq!(writer.records_written(), 10);

    let mut output = writer.finish().unwrap();
    let runs = output.runs(0);
    assert_eq!(runs.len(), 4);
    assert_eq!(runs.iter().map(RunHandle::len).sum::<usize>(), 10);

    let merged = output.merge_partition(0).unwrap();
    let seconds: Vec<String> = drain(merged).into_iter().map(|(_, s)| s).collect();
    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(seconds, expected);
}

#[test]
fn writer_cuts_runs_on_byte_limit() {
    // Each key is 4 bytes and values are empty, so 8 bytes hold two records.
    let options = ShuffleOptions::default().with_sort_buffer_bytes(8);
    let mut writer = ShuffleWriter::new(options, full()).unwrap();
    for i in 0..5 {
        writer.write(0, raw("k", &format!("{i}")), Vec::new()).unwrap();
    }

    let mut output = writer.finish().unwrap();
    let sizes: Vec<usize> = output.runs(0).iter().map(RunHandle::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(drain(output.merge_partition(0).unwrap()).len(), 5);
}

#[test]
fn writer_spills_to_directory() {
    let dir = tempdir().unwrap();
    let options = ShuffleOptions::default()
        .with_partitions(2)
        .with_sort_buffer_records(2)
        .with_spill_dir(dir.path());
    let mut writer = ShuffleWriter::new(options, full()).unwrap();
    for i in 0..5 {
        writer.write(i % 2, raw(&format!("k{i}"), ""), Vec::new()).unwrap();
    }

    let mut output = writer.finish().unwrap();
    assert!(output.runs(0).iter().all(|r| matches!(r, RunHandle::Spilled { .. })));
    let spill_files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(spill_files, 3);

    let p0 = drain(output.merge_partition(0).unwrap());
    assert_eq!(p0, owned(&[("k0", ""), ("k2", ""), ("k4", "")]));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let p1 = drain(output.merge_partition(1).unwrap());
    assert_eq!(p1, owned(&[("k1", ""), ("k3", "")]));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn unmerged_spills_removed_with_output() {
    let dir = tempdir().unwrap();
    let options = ShuffleOptions::default()
        .with_sort_buffer_records(1)
        .with_spill_dir(dir.path());
    let mut writer = ShuffleWriter::new(options, full()).unwrap();
    for key in ["c", "a", "b"] {
        writer.write(0, raw(key, ""), Vec::new()).unwrap();
    }

    let output = writer.finish().unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    drop(output);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn combiner_runs_on_each_run() {
    let options = ShuffleOptions::default().with_sort_buffer_records(4);
    let mut calls = 0;
    {
        let mut writer = ShuffleWriter::new(options, full())
            .unwrap()
            .with_combiner(Box::new(|run: SortedRun| {
                calls += 1;
                let mut records = run.into_records();
                records.dedup_by(|a, b| a.key == b.key);
                Ok(SortedRun::new(records))
            }));
        for _ in 0..6 {
            writer.write(0, raw("dup", "x"), Vec::new()).unwrap();
        }
        let mut output = writer.finish().unwrap();
        assert_eq!(drain(output.merge_partition(0).unwrap()).len(), 2);
    }
    assert_eq!(calls, 2);
}

#[test]
fn merging_a_partition_twice_yields_nothing() {
    let mut writer = ShuffleWriter::new(ShuffleOptions::default(), full()).unwrap();
    writer.write(0, raw("a", "b"), Vec::new()).unwrap();
    let mut output = writer.finish().unwrap();
    assert!(output.merge_partition(0).unwrap().is_valid());
    assert!(!output.merge_partition(0).unwrap().is_valid());
    assert!(output.merge_partition(5).is_err());
}
