//! On-disk layout of the shuffle.
//!
//! A map task writes one shard per non-empty bucket, `intermediate-{map}-{bucket}`,
//! holding one JSON-encoded [`KeyValue`] per line. The reduce task for a bucket
//! globs all shards of that bucket and writes `mr-out-{bucket}`. Every file is
//! written to a temporary file first and renamed into place, so a reader never
//! sees a shard that a crashed or slow worker left half-written.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use atomicwrites::{AllowOverwrite, AtomicFile};
use glob::Pattern;
use log::{trace, warn};

use crate::{KeyValue, Result};

const INTERMEDIATE_PREFIX: &str = "intermediate-";

pub fn intermediate_name(map_id: usize, bucket: usize) -> String {
    format!("{}{}-{}", INTERMEDIATE_PREFIX, map_id, bucket)
}

pub fn output_name(reduce_id: usize) -> String {
    format!("mr-out-{}", reduce_id)
}

/// Split a shard file name back into `(map_id, bucket)`.
pub fn parse_intermediate(name: &str) -> Option<(usize, usize)> {
    let (map_id, bucket) = name.strip_prefix(INTERMEDIATE_PREFIX)?.split_once('-')?;
    Some((map_id.parse().ok()?, bucket.parse().ok()?))
}

/// All shards of `bucket` found in `dir`, from any map task, sorted by path.
pub fn shards(dir: &Path, bucket: usize) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}*-{}",
        Pattern::escape(&dir.to_string_lossy()),
        INTERMEDIATE_PREFIX,
        bucket
    );
    let mut found = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(glob::GlobError::into_error)?;
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_intermediate)
            .map_or(false, |(_, b)| b == bucket);
        if matches {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Atomically replace `path` with `records`, one JSON object per line.
pub fn write_records(path: &Path, records: &[KeyValue]) -> Result<()> {
    let mut buf = Vec::new();
    for kv in records {
        serde_json::to_writer(&mut buf, kv)?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)?;
    trace!("wrote {} records to {:?}", records.len(), path);
    Ok(())
}

/// Read every record of a shard.
///
/// A line that does not decode is logged and skipped, so one corrupt record
/// cannot hide the rest of the shard from the reduce task.
pub fn read_records(path: &Path) -> Result<Vec<KeyValue>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<KeyValue>(&line) {
            Ok(kv) => records.push(kv),
            Err(e) => warn!("{:?}:{}: skipping malformed record: {}", path, lineno + 1, e),
        }
    }
    Ok(records)
}

/// Atomically replace `path` with one `"{key} {value}"` line per pair.
pub fn write_output(path: &Path, lines: &[(String, String)]) -> Result<()> {
    let mut buf = String::new();
    for (key, value) in lines {
        buf.push_str(key);
        buf.push(' ');
        buf.push_str(value);
        buf.push('\n');
    }
    write_atomic(path, buf.as_bytes())?;
    trace!("wrote {} lines to {:?}", lines.len(), path);
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(contents))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
}
