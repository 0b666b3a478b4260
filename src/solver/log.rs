use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, Clone)]
pub struct SolverLog {
    path: PathBuf,
}

impl SolverLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reset(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::File::create(&self.path).map(|_| ())
    }

    /// Appends one line. Failures are swallowed; the log is advisory.
    pub fn append(&self, line: impl AsRef<str>) {
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{}", line.as_ref()));
        if let Err(err) = written {
            tracing::warn!("failed appending to solver log {}: {err}", self.path.display());
        }
    }
}

/// Incremental reader over a growing log file.
///
/// Only complete lines are returned by `poll`; a trailing partial line is held
/// back until its newline arrives or `flush` is called.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
    partial: String,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            partial: String::new(),
        }
    }

    /// New complete lines since the last call. A missing file yields nothing.
    pub async fn poll(&mut self) -> Vec<String> {
        let Ok(meta) = tokio::fs::metadata(&self.path).await else {
            return Vec::new();
        };
        if meta.len() < self.offset {
            // truncated underneath us
            self.offset = 0;
            self.partial.clear();
        }
        if meta.len() == self.offset {
            return Vec::new();
        }

        let Ok(buf) = read_from(&self.path, self.offset).await else {
            return Vec::new();
        };
        self.offset += buf.len() as u64;
        self.partial.push_str(&String::from_utf8_lossy(&buf));

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line = self.partial[..pos].trim_end_matches('\r').to_string();
            self.partial.drain(..=pos);
            lines.push(line);
        }
        lines
    }

    pub fn flush(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.partial))
    }
}

async fn read_from(path: &Path, offset: u64) -> io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(io::SeekFrom::Start(offset)).await?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(buf)
}
