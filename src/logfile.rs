//! Log file access: opening (plain or zstd-compressed), rotated siblings,
//! and sync-log discovery.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Open a log for line reading. Paths ending in `.zst` are decompressed.
pub fn open_log(path: &Path) -> Result<Box<dyn BufRead>, LogError> {
    let file = File::open(path).map_err(|source| LogError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().is_some_and(|ext| ext == "zst") {
        let decoder = zstd::stream::read::Decoder::new(file).map_err(|source| LogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Call `f` for every line of the log at `path`.
///
/// Bytes that aren't valid UTF-8 (client-supplied request paths, user
/// agents) are replaced rather than failing the whole file.
pub fn for_each_line<F>(path: &Path, mut f: F) -> Result<(), LogError>
where
    F: FnMut(&str),
{
    let mut reader = open_log(path)?;
    let mut buf = Vec::with_capacity(512);
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| LogError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        f(line.trim_end_matches(['\n', '\r']));
    }
}

/// `path` with the rotation suffix appended, if that file exists.
pub fn rotated_sibling(path: &Path, suffix: &str) -> Option<PathBuf> {
    if suffix.is_empty() {
        return None;
    }
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    let sibling = PathBuf::from(name);
    sibling.is_file().then_some(sibling)
}

/// Expand the configured web logs into the files to read, in order:
/// each primary followed by its rotated sibling when one exists.
pub fn with_rotated_siblings(primaries: &[PathBuf], suffix: &str) -> Vec<PathBuf> {
    let mut files = Vec::with_capacity(primaries.len() * 2);
    for primary in primaries {
        files.push(primary.clone());
        match rotated_sibling(primary, suffix) {
            Some(sibling) => files.push(sibling),
            None => tracing::debug!(log = %primary.display(), suffix, "no rotated sibling"),
        }
    }
    files
}

/// Every `*.log` file in the sync log directory, sorted by path.
pub fn discover_sync_logs(dir: &Path) -> Result<Vec<PathBuf>, LogError> {
    if !dir.is_dir() {
        return Err(LogError::Open {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    // Directory names may contain glob metacharacters such as `[1]`.
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join("*.log");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern).map_err(|e| LogError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(p) if p.is_file() => Some(p),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable entry in sync log directory");
                None
            }
        })
        .collect();
    logs.sort();
    Ok(logs)
}

/// Project a sync log belongs to: its file name without `.log` (and `.zst`).
pub fn sync_log_project(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".zst").unwrap_or(name);
    let stem = name.strip_suffix(".log").unwrap_or(name);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[derive(Debug)]
pub enum LogError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Pattern {
        pattern: String,
        message: String,
    },
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::Open { path, source } => {
                write!(f, "failed to open log {}: {source}", path.display())
            }
            LogError::Read { path, source } => {
                write!(f, "failed to read log {}: {source}", path.display())
            }
            LogError::Pattern { pattern, message } => {
                write!(f, "invalid log pattern {pattern}: {message}")
            }
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Open { source, .. } | LogError::Read { source, .. } => Some(source),
            LogError::Pattern { .. } => None,
        }
    }
}
