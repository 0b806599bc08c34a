/// Sync-daemon (rsyncd) transfer log parsing.
///
/// Each project has its own log, `<project>.log`, whose transfer summary
/// lines look like:
///
/// ```text
/// 2024/01/15 08:00:00 [123] sent 1000 bytes  received 50 bytes  total size 2000
/// ```
///
/// Any other line (connection notices, module listings) is ignored.
use crate::logfile::{self, LogError};
use crate::project::ProjectSet;
use crate::traffic::{SourceStats, TrafficTable};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static TRANSFER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+ \S+) \[\d+\] sent ([\d,]+) bytes\s+received ([\d,]+) bytes\s+total size \S+")
        .unwrap()
});

/// Length of the `YYYY/MM/DD` prefix of a timestamp.
const DATE_LEN: usize = 10;

/// Bytes the daemon sent and received across one log file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncTotals {
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Transfer { sent: u64, received: u64 },
    Skipped,
    /// Matches the grammar but a counter doesn't fit in 64 bits.
    Malformed,
}

fn parse_count(s: &str) -> Option<u64> {
    if s.contains(',') {
        s.replace(',', "").parse().ok()
    } else {
        s.parse().ok()
    }
}

/// Classify one line against `target_date` (formatted like `2024/01/15`).
pub fn parse_line(line: &str, target_date: &str) -> LineOutcome {
    let Some(caps) = TRANSFER_LINE.captures(line) else {
        return LineOutcome::Skipped;
    };
    if caps[1].get(..DATE_LEN) != Some(target_date) {
        return LineOutcome::Skipped;
    }
    match (parse_count(&caps[2]), parse_count(&caps[3])) {
        (Some(sent), Some(received)) => LineOutcome::Transfer { sent, received },
        _ => LineOutcome::Malformed,
    }
}

/// Sum the transfers in one sync log for the target date.
pub fn tally_file(path: &Path, target_date: &str) -> Result<(SyncTotals, SourceStats), LogError> {
    let mut totals = SyncTotals::default();
    let mut stats = SourceStats::default();

    logfile::for_each_line(path, |line| {
        stats.lines += 1;
        match parse_line(line, target_date) {
            LineOutcome::Transfer { sent, received } => {
                stats.matched += 1;
                totals.sent = totals.sent.saturating_add(sent);
                totals.received = totals.received.saturating_add(received);
            }
            LineOutcome::Skipped => stats.skipped += 1,
            LineOutcome::Malformed => stats.malformed += 1,
        }
    })?;

    if stats.malformed > 0 {
        tracing::warn!(
            log = %path.display(),
            malformed = stats.malformed,
            "skipped sync log lines with out-of-range byte counters"
        );
    }

    // Sent by the daemon is traffic served to clients.
    stats.up = totals.sent;
    stats.down = totals.received;
    Ok((totals, stats))
}

/// Tally one project's sync log and add it to that project's counters.
///
/// The project is the log's file name without extension; a name outside
/// the known set is counted under `other`.
pub fn ingest_file(
    path: &Path,
    target_date: &str,
    projects: &ProjectSet,
    table: &mut TrafficTable,
) -> Result<SourceStats, LogError> {
    let name = logfile::sync_log_project(path).unwrap_or_default();
    let class = projects.classify_name(&name);
    if class.bucket() != name {
        tracing::warn!(
            log = %path.display(),
            project = %name,
            "sync log names an unknown project, counting as other"
        );
    }

    let (totals, stats) = tally_file(path, target_date)?;
    table.add(class, totals.sent, totals.received);
    Ok(stats)
}
