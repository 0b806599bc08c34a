/// Project enumeration and request classification.
///
/// The set of projects is fixed once per run: every immediate subdirectory
/// of the storage root, plus the catch-all `other`.
use std::collections::BTreeSet;
use std::path::Path;

/// Catch-all bucket for traffic that matches no known project.
pub const OTHER: &str = "other";

/// Result of mapping a request path or log name onto the project set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    Known(&'a str),
    Unknown,
}

impl<'a> Classification<'a> {
    /// Bucket the traffic lands in: the project itself, or `other`.
    pub fn bucket(self) -> &'a str {
        match self {
            Classification::Known(name) => name,
            Classification::Unknown => OTHER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSet {
    names: BTreeSet<String>,
}

impl ProjectSet {
    /// Build a set from explicit names. `other` is always included.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        names.insert(OTHER.to_string());
        Self { names }
    }

    /// List the immediate subdirectories of `root` as projects.
    ///
    /// Plain files and names that aren't valid UTF-8 are ignored.
    pub fn enumerate(root: &Path) -> std::io::Result<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::debug!(name = ?raw, "skipping non-UTF-8 directory name");
                }
            }
        }
        Ok(Self::from_names(names))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Classify by exact project name (sync logs are named after their project).
    pub fn classify_name<'a>(&'a self, name: &str) -> Classification<'a> {
        match self.names.get(name) {
            Some(known) => Classification::Known(known.as_str()),
            None => Classification::Unknown,
        }
    }

    /// Classify a request path by its first segment: `/debian/pool/x.deb` -> `debian`.
    pub fn classify_path<'a>(&'a self, path: &str) -> Classification<'a> {
        let rest = path.strip_prefix('/').unwrap_or(path);
        let segment = rest.split('/').next().unwrap_or("");
        if segment.is_empty() {
            return Classification::Unknown;
        }
        self.classify_name(segment)
    }
}
