use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use tracing::{debug, warn};

use crate::error::{DecodeError, Error, Result};
use crate::iterator::RecordIterator;
use crate::shuffle::run::SortedRun;
use crate::types::Record;
use crate::varint::{decode_vlq, MAX_VLQ_LEN};

/// Magic number closing every spill file.
pub const SPILL_MAGIC: u64 = 0x5348_5546_5350_4C00; // "SHUFSPL\0"

/// A sorted run written to disk.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Record 0 (VLQ-framed key, value)     │
/// │ ...                                  │
/// │ Record N-1                           │
/// ├──────────────────────────────────────┤
/// │ Record count (8B)                    │
/// │ CRC32 of record bytes (4B)           │
/// │ Magic number (8B)                    │
/// └──────────────────────────────────────┘
/// ```
///
/// Spill files only live for one shuffle, so they are flushed but not
/// fsync'd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpillTrailer {
    pub record_count: u64,
    pub checksum: u32,
    pub magic: u64,
}

impl SpillTrailer {
    /// Size of the trailer in bytes (fixed).
    pub const SIZE: usize = 8 + 4 + 8;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.record_count.to_le_bytes());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&self.magic.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("spill trailer too short".into()));
        }
        let mut count = [0u8; 8];
        count.copy_from_slice(&data[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&data[8..12]);
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[12..20]);

        let magic = u64::from_le_bytes(magic);
        if magic != SPILL_MAGIC {
            return Err(Error::Corruption(format!(
                "bad spill magic: expected {:#x}, got {:#x}",
                SPILL_MAGIC, magic
            )));
        }

        Ok(SpillTrailer {
            record_count: u64::from_le_bytes(count),
            checksum: u32::from_le_bytes(crc),
            magic,
        })
    }
}

/// A spill file on disk, removed when dropped.
///
/// Created before the run is written, so a failed write leaves nothing
/// behind either.
#[derive(Debug)]
pub struct SpillFile {
    path: PathBuf,
}

impl SpillFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SpillFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a streaming reader that takes the file over.
    pub fn open(self) -> Result<SpillReader> {
        let mut reader = SpillReader::open(&self.path)?;
        reader.owned = Some(self);
        Ok(reader)
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed spill file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove spill file")
            }
        }
    }
}

/// Write `run` to `path`, returning the number of bytes written.
pub fn write_run(path: &Path, run: &SortedRun) -> Result<u64> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut hasher = Hasher::new();
    let mut scratch = Vec::new();
    let mut body_len = 0u64;
    for record in run.records() {
        scratch.clear();
        record.write_to(&mut scratch);
        hasher.update(&scratch);
        writer.write_all(&scratch)?;
        body_len += scratch.len() as u64;
    }

    let trailer = SpillTrailer {
        record_count: run.len() as u64,
        checksum: hasher.finalize(),
        magic: SPILL_MAGIC,
    };
    writer.write_all(&trailer.encode())?;
    writer.flush()?;

    Ok(body_len + SpillTrailer::SIZE as u64)
}

/// Read a whole run written by `write_run` into memory.
pub fn read_run(path: &Path) -> Result<SortedRun> {
    let mut reader = SpillReader::open(path)?;
    let mut records = Vec::new();
    while let Some(record) = reader.current.take() {
        records.push(record);
        reader.advance()?;
    }
    Ok(SortedRun::new(records))
}

/// Streams the records of a spill file one at a time.
///
/// `open` checks the trailer and the body checksum in one buffered pass,
/// then rewinds. After that only the current record is held in memory.
/// Every field length is bounded by the body bytes left, and the record
/// count is checked against the trailer once the body is used up.
pub struct SpillReader {
    reader: BufReader<File>,
    path: PathBuf,
    remaining: u64,
    expected: u64,
    read: u64,
    current: Option<Record>,
    owned: Option<SpillFile>,
}

impl SpillReader {
    /// Open `path` and position the reader at its first record.
    ///
    /// The file stays in place; use `SpillFile::open` to have it removed
    /// once the reader is dropped.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < SpillTrailer::SIZE as u64 {
            return Err(Error::Corruption(format!(
                "{}: file too short to contain trailer",
                path.display()
            )));
        }

        let body_len = file_size - SpillTrailer::SIZE as u64;
        file.seek(SeekFrom::Start(body_len))?;
        let mut trailer_buf = [0u8; SpillTrailer::SIZE];
        file.read_exact(&mut trailer_buf)?;
        let trailer = SpillTrailer::decode(&trailer_buf)?;

        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(file);
        if checksum_body(&mut reader, body_len)? != trailer.checksum {
            return Err(Error::Corruption(format!(
                "{}: spill checksum mismatch",
                path.display()
            )));
        }
        reader.seek(SeekFrom::Start(0))?;

        let mut spill = SpillReader {
            reader,
            path: path.to_path_buf(),
            remaining: body_len,
            expected: trailer.record_count,
            read: 0,
            current: None,
            owned: None,
        };
        spill.advance()?;
        Ok(spill)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record count announced by the trailer.
    pub fn expected_records(&self) -> u64 {
        self.expected
    }

    fn advance(&mut self) -> Result<()> {
        self.current = None;
        if self.remaining == 0 {
            if self.read != self.expected {
                return Err(Error::Corruption(format!(
                    "{}: trailer says {} records, found {}",
                    self.path.display(),
                    self.expected,
                    self.read
                )));
            }
            return Ok(());
        }

        let key = self.read_field()?;
        let value = self.read_field()?;
        self.read += 1;
        self.current = Some(Record::new(key, value));
        Ok(())
    }

    fn read_field(&mut self) -> Result<Vec<u8>> {
        let len = self.read_vlq()?;
        if len > self.remaining {
            return Err(DecodeError::LengthOutOfBounds {
                declared: len,
                remaining: self.remaining as usize,
            }
            .into());
        }
        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;
        self.remaining -= len;
        Ok(payload)
    }

    fn read_vlq(&mut self) -> Result<u64> {
        let mut prefix = [0u8; MAX_VLQ_LEN];
        for i in 0..MAX_VLQ_LEN {
            if self.remaining == 0 {
                return Err(DecodeError::UnexpectedEof.into());
            }
            self.reader.read_exact(&mut prefix[i..=i])?;
            self.remaining -= 1;
            if prefix[i] & 0x80 == 0 {
                let (value, _) = decode_vlq(&prefix[..=i])?;
                return Ok(value);
            }
        }
        Err(DecodeError::VarintOverflow.into())
    }
}

impl RecordIterator for SpillReader {
    fn key(&self) -> &[u8] {
        match &self.current {
            Some(record) => &record.key,
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match &self.current {
            Some(record) => &record.value,
            None => &[],
        }
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        self.advance()
    }
}

/// CRC32 of the next `len` bytes of `reader`.
fn checksum_body(reader: &mut BufReader<File>, len: u64) -> Result<u32> {
    let mut hasher = Hasher::new();
    let mut body = reader.by_ref().take(len);
    let mut chunk = [0u8; 8 * 1024];
    let mut seen = 0u64;
    loop {
        let n = body.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
        seen += n as u64;
    }
    if seen != len {
        return Err(DecodeError::UnexpectedEof.into());
    }
    Ok(hasher.finalize())
}
