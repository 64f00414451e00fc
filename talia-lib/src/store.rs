//! Grouped record store: merge and atomic persistence.
//!
//! The store is a JSON object with an `available` and an `unavailable` bucket.
//! Older runs wrote a flat array of per-domain records instead; that shape is
//! still read and upgraded on the next write. Every write goes to a temporary
//! file in the destination directory and is renamed into place, so readers
//! only ever see the old content or the new content.

use crate::error::TaliaError;
use crate::types::{
    Availability, CheckResult, DomainRecord, ExtendedGroupedData, GroupedData, GroupedRecord,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

/// Parsed input document handed to the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDocument {
    /// Legacy flat array of records
    Flat(Vec<DomainRecord>),
    /// Grouped buckets, possibly with an `unverified` list still to check
    Grouped(ExtendedGroupedData),
}

/// Classify raw input as a flat array or a grouped document.
pub fn parse_input_document(raw: &str) -> Result<InputDocument, TaliaError> {
    let flat_err = match serde_json::from_str::<Vec<DomainRecord>>(raw) {
        Ok(records) => return Ok(InputDocument::Flat(records)),
        Err(e) => e,
    };
    match serde_json::from_str::<ExtendedGroupedData>(raw) {
        Ok(ext) => Ok(InputDocument::Grouped(ext)),
        Err(_) => Err(TaliaError::invalid_input(format!(
            "input is neither a domain array nor a grouped object: {}",
            flat_err
        ))),
    }
}

/// Merge `newest` into `existing`, deduplicating by domain.
///
/// A domain from `newest` replaces any existing entry for the same domain and
/// is removed from the opposite bucket, so each domain ends up in exactly the
/// bucket of its latest classification. Buckets come back sorted by domain.
pub fn merge_grouped(existing: GroupedData, newest: GroupedData) -> GroupedData {
    let mut available: BTreeMap<String, GroupedRecord> = existing
        .available
        .into_iter()
        .map(|r| (r.domain.clone(), r))
        .collect();
    let mut unavailable: BTreeMap<String, GroupedRecord> = existing
        .unavailable
        .into_iter()
        .map(|r| (r.domain.clone(), r))
        .collect();

    for record in newest.available {
        unavailable.remove(&record.domain);
        available.insert(record.domain.clone(), record);
    }
    for record in newest.unavailable {
        available.remove(&record.domain);
        unavailable.insert(record.domain.clone(), record);
    }

    GroupedData {
        available: available.into_values().collect(),
        unavailable: unavailable.into_values().collect(),
    }
}

/// Upgrade legacy flat records into grouped buckets.
///
/// Reason and log are kept. A record that was never checked has no reason;
/// it gets `NO_MATCH` or `TAKEN` from its `available` flag.
pub fn convert_array_to_grouped(records: Vec<DomainRecord>) -> GroupedData {
    let mut grouped = GroupedData::default();
    for rec in records {
        let reason = rec.reason.unwrap_or(if rec.available {
            Availability::NoMatch
        } else {
            Availability::Taken
        });
        let entry = GroupedRecord {
            domain: rec.domain,
            reason,
            log: rec.log,
        };
        if rec.available {
            grouped.available.push(entry);
        } else {
            grouped.unavailable.push(entry);
        }
    }
    grouped
}

/// Build the newest grouped batch from check results.
///
/// Logs are kept for errors always and for successful checks only when
/// `verbose` is set.
pub fn grouped_from_results(results: &[CheckResult], verbose: bool) -> GroupedData {
    let mut grouped = GroupedData::default();
    for result in results {
        let mut record = GroupedRecord::new(result.domain.clone(), result.availability);
        if verbose || result.availability == Availability::Error {
            record.log = Some(result.raw_log.clone());
        }
        grouped.push(record);
    }
    grouped
}

/// Read whatever is stored at `path`.
///
/// Missing or empty files and a bare `null` are an empty store; flat arrays are upgraded;
/// anything else is a `ParseExisting` error.
pub fn load_grouped_file<P: AsRef<Path>>(path: P) -> Result<GroupedData, TaliaError> {
    let path = path.as_ref();
    let shown = path.to_string_lossy();

    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(GroupedData::default()),
        Err(e) => return Err(TaliaError::read_existing(shown, e.to_string())),
    };
    if meta.is_dir() {
        return Err(TaliaError::read_existing(shown, "is a directory"));
    }
    if meta.len() == 0 {
        return Ok(GroupedData::default());
    }

    let raw = fs::read_to_string(path).map_err(|e| TaliaError::read_existing(shown.clone(), e.to_string()))?;

    match serde_json::from_str::<Option<GroupedData>>(&raw) {
        Ok(grouped) => Ok(grouped.unwrap_or_default()),
        Err(grouped_err) => match serde_json::from_str::<Vec<DomainRecord>>(&raw) {
            Ok(records) => {
                debug!(path = %shown, records = records.len(), "upgrading flat record file");
                Ok(convert_array_to_grouped(records))
            }
            Err(_) => Err(TaliaError::parse_existing(shown, grouped_err.to_string())),
        },
    }
}

/// Merge `newest` into the store at `path` and rewrite it atomically.
///
/// An empty `path` is a no-op. On error the destination is untouched.
///
/// # Errors
///
/// - `ReadExisting` / `ParseExisting` if the current content cannot be used
/// - `Marshal`, `WriteTemp` or `Rename` if the rewrite fails
pub fn merge_and_write<P: AsRef<Path>>(path: P, newest: GroupedData) -> Result<(), TaliaError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Ok(());
    }

    let existing = load_grouped_file(path)?;
    let merged = merge_grouped(existing, newest);
    info!(
        path = %path.display(),
        available = merged.available.len(),
        unavailable = merged.unavailable.len(),
        "writing merged grouped file"
    );
    write_grouped_data(path, &merged)
}

/// Atomically replace `path` with `data`, without merging.
pub fn write_grouped_data<P: AsRef<Path>>(path: P, data: &GroupedData) -> Result<(), TaliaError> {
    write_json_atomically(path.as_ref(), data)
}

/// Atomically replace `path` with a flat record array.
pub fn write_records<P: AsRef<Path>>(path: P, records: &[DomainRecord]) -> Result<(), TaliaError> {
    write_json_atomically(path.as_ref(), &records)
}

/// Atomically write the available domains of `data`, one per line.
pub fn export_available<P: AsRef<Path>>(path: P, data: &GroupedData) -> Result<(), TaliaError> {
    let mut text = data.available_domains().join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    persist_atomically(path.as_ref(), text.as_bytes(), |file, bytes| file.write_all(bytes))
}

fn write_json_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), TaliaError> {
    let mut out = serde_json::to_vec_pretty(value)?;
    out.push(b'\n');
    persist_atomically(path, &out, |file, bytes| file.write_all(bytes))
}

/// Write `bytes` to a fresh temp file next to `path`, then rename it over `path`.
///
/// `write` performs the actual write so tests can make that step fail. The
/// temp file is removed on every failure path when `NamedTempFile` drops.
fn persist_atomically<F>(path: &Path, bytes: &[u8], write: F) -> Result<(), TaliaError>
where
    F: FnOnce(&mut NamedTempFile, &[u8]) -> io::Result<()>,
{
    let shown = path.to_string_lossy();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| TaliaError::write_temp(shown.clone(), format!("create temp file: {}", e)))?;

    write(&mut tmp, bytes)
        .and_then(|_| tmp.as_file_mut().sync_all())
        .map_err(|e| TaliaError::write_temp(shown.clone(), e.to_string()))?;

    tmp.persist(path)
        .map_err(|e| TaliaError::rename(shown.clone(), e.error.to_string()))?;

    debug!(path = %shown, bytes = bytes.len(), "file replaced");
    Ok(())
}
