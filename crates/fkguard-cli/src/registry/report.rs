use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::redaction::RedactedConnection;

use super::{RegistryError, RegistryResult};

/// JSON document emitted by every command.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub engine: String,
    pub connection: RedactedConnection,
    pub command: String,
    pub result: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Print the report to stdout, or replace `out` atomically.
pub fn write_report(report: &RunReport, out: Option<&Path>) -> RegistryResult<()> {
    let mut data = serde_json::to_vec_pretty(report)?;
    data.push(b'\n');

    match out {
        Some(path) => write_bytes_atomic(path, &data),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn write_bytes_atomic(path: &Path, data: &[u8]) -> RegistryResult<()> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    std::fs::rename(&tmp_path, path)?;
    if let Some(parent) = parent {
        sync_dir(parent)?;
    }

    Ok(())
}

fn temp_path(path: &Path) -> RegistryResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| RegistryError::InvalidPath(path.display().to_string()))?;
    Ok(path.with_file_name(format!("{}.tmp", file_name.to_string_lossy())))
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> io::Result<()> {
    OpenOptions::new().read(true).open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
