/// Web-access log parsing.
///
/// Records are whitespace-separated, combined-log style with two byte
/// counters appended by the server config:
///
/// ```text
/// 10.0.0.1 - - [15/Jan/2024:08:00:00 +0000] "GET /debian/pool/x.deb HTTP/1.1" 200 512 "-" "curl/8.0" - 500 0
/// ```
///
/// Field 4 carries the date, field 7 the request path, field 9 the status.
/// The second-to-last field is bytes sent (up), the last bytes received (down).
use crate::logfile::{self, LogError};
use crate::project::{Classification, ProjectSet};
use crate::traffic::{LogEvent, SourceStats, TrafficTable};
use std::path::Path;

/// Fewer fields than this and the line isn't a complete access record.
const MIN_FIELDS: usize = 14;

const DATE_FIELD: usize = 3;
const PATH_FIELD: usize = 6;
const STATUS_FIELD: usize = 8;

/// Outcome of looking at a single access-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome<'a> {
    Event(LogEvent<'a>),
    /// Too short or dated for another day.
    Skipped,
    /// Structurally complete but with non-numeric byte counters.
    Malformed,
}

/// Classify one line against `target_date` (formatted like `15/Jan/2024`).
pub fn parse_line<'p>(line: &str, target_date: &str, projects: &'p ProjectSet) -> LineOutcome<'p> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return LineOutcome::Skipped;
    }

    // `[15/Jan/2024:08:00:00` -> `15/Jan/2024`
    let date = fields[DATE_FIELD]
        .strip_prefix('[')
        .and_then(|d| d.split(':').next());
    if date != Some(target_date) {
        return LineOutcome::Skipped;
    }

    let sent = fields[fields.len() - 2].parse::<u64>();
    let received = fields[fields.len() - 1].parse::<u64>();
    let (up, down) = match (sent, received) {
        (Ok(up), Ok(down)) => (up, down),
        _ => return LineOutcome::Malformed,
    };

    let successful = matches!(fields[STATUS_FIELD].as_bytes().first(), Some(b'2' | b'3'));
    let class = match projects.classify_path(fields[PATH_FIELD]) {
        Classification::Known(name) if successful => Classification::Known(name),
        _ => Classification::Unknown,
    };

    LineOutcome::Event(LogEvent { class, up, down })
}

/// Feed every line of one access log into `table`.
pub fn ingest_file(
    path: &Path,
    target_date: &str,
    projects: &ProjectSet,
    table: &mut TrafficTable,
) -> Result<SourceStats, LogError> {
    let mut stats = SourceStats::default();

    logfile::for_each_line(path, |line| {
        stats.lines += 1;
        match parse_line(line, target_date, projects) {
            LineOutcome::Event(event) => {
                stats.matched += 1;
                stats.up = stats.up.saturating_add(event.up);
                stats.down = stats.down.saturating_add(event.down);
                table.record(event);
            }
            LineOutcome::Skipped => stats.skipped += 1,
            LineOutcome::Malformed => {
                stats.malformed += 1;
                tracing::debug!(log = %path.display(), line = stats.lines, "malformed byte counters, line skipped");
            }
        }
    })?;

    if stats.malformed > 0 {
        tracing::warn!(
            log = %path.display(),
            malformed = stats.malformed,
            "skipped access log lines with non-numeric byte counters"
        );
    }

    Ok(stats)
}
