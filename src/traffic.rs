/// Per-project byte counters and the aggregate table they live in.
use crate::project::{Classification, ProjectSet, OTHER};
use serde::Serialize;
use std::collections::BTreeMap;

/// Bytes served (`up`) and received (`down`) by one project on the run date.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrafficCounters {
    pub up: u64,
    pub down: u64,
}

impl TrafficCounters {
    #[cfg(test)]
    pub fn new(up: u64, down: u64) -> Self {
        Self { up, down }
    }

    fn add(&mut self, up: u64, down: u64) {
        self.up = self.up.saturating_add(up);
        self.down = self.down.saturating_add(down);
    }
}

/// One parsed log record, consumed immediately by [`TrafficTable::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEvent<'a> {
    pub class: Classification<'a>,
    pub up: u64,
    pub down: u64,
}

/// The run's aggregate: one zero-initialized entry per known project.
///
/// Keys are fixed at construction; recording never adds a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficTable {
    counters: BTreeMap<String, TrafficCounters>,
}

impl TrafficTable {
    pub fn new(projects: &ProjectSet) -> Self {
        let counters = projects
            .iter()
            .map(|name| (name.to_string(), TrafficCounters::default()))
            .collect();
        Self { counters }
    }

    /// Fold one event into its project's counters.
    pub fn record(&mut self, event: LogEvent<'_>) {
        self.add(event.class, event.up, event.down);
    }

    /// Add bytes to the bucket `class` resolves to.
    pub fn add(&mut self, class: Classification<'_>, up: u64, down: u64) {
        let mut bucket = class.bucket();
        if !self.counters.contains_key(bucket) {
            tracing::warn!(project = bucket, "project not in table, using other");
            bucket = OTHER;
        }
        if let Some(c) = self.counters.get_mut(bucket) {
            c.add(up, down);
        }
    }

    #[cfg(test)]
    pub fn get(&self, project: &str) -> Option<TrafficCounters> {
        self.counters.get(project).copied()
    }

    /// Entries in project-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TrafficCounters)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn total(&self) -> TrafficCounters {
        let mut total = TrafficCounters::default();
        for c in self.counters.values() {
            total.add(c.up, c.down);
        }
        total
    }
}

/// What one log file contributed, for the per-file log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub lines: u64,
    pub matched: u64,
    pub skipped: u64,
    pub malformed: u64,
    pub up: u64,
    pub down: u64,
}

impl SourceStats {
    pub fn merge(&mut self, other: &SourceStats) {
        self.lines += other.lines;
        self.matched += other.matched;
        self.skipped += other.skipped;
        self.malformed += other.malformed;
        self.up = self.up.saturating_add(other.up);
        self.down = self.down.saturating_add(other.down);
    }
}
