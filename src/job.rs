/// One daily run: enumerate projects, fold every log into the traffic
/// table, then report and (when committing) persist.
use crate::config::{RunSettings, SyncLogs};
use crate::db;
use crate::logfile::{self, LogError};
use crate::project::ProjectSet;
use crate::report::{self, ReportFormat};
use crate::run_date::RunDate;
use crate::secret::{self, SecretError};
use crate::sync;
use crate::traffic::{SourceStats, TrafficTable};
use crate::web;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct JobOptions {
    pub date: RunDate,
    /// Write rows to the database; otherwise a dry run.
    pub commit: bool,
    /// `None` suppresses the report.
    pub report: Option<ReportFormat>,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub table: TrafficTable,
    pub web: SourceStats,
    pub sync: SourceStats,
    /// Rows inserted, or `None` for a dry run.
    pub rows_written: Option<usize>,
}

/// Build the traffic table for `date` from every configured log.
///
/// Any missing or unreadable log aborts the run rather than producing
/// partial totals.
pub fn aggregate(
    settings: &RunSettings,
    date: &RunDate,
) -> Result<(TrafficTable, SourceStats, SourceStats), JobError> {
    let projects =
        ProjectSet::enumerate(&settings.storage_root).map_err(|source| JobError::Projects {
            root: settings.storage_root.clone(),
            source,
        })?;
    tracing::info!(
        root = %settings.storage_root.display(),
        projects = projects.len(),
        "enumerated projects"
    );

    let mut table = TrafficTable::new(&projects);

    let web_date = date.web_format();
    let mut web_total = SourceStats::default();
    for path in &settings.web_logs {
        let stats = web::ingest_file(path, &web_date, &projects, &mut table)?;
        log_source("web", path, &stats);
        web_total.merge(&stats);
    }

    let sync_logs = match &settings.sync_logs {
        SyncLogs::Discover(dir) => logfile::discover_sync_logs(dir)?,
        SyncLogs::Explicit(paths) => paths.clone(),
    };
    let sync_date = date.sync_format();
    let mut sync_total = SourceStats::default();
    for path in &sync_logs {
        let stats = sync::ingest_file(path, &sync_date, &projects, &mut table)?;
        log_source("sync", path, &stats);
        sync_total.merge(&stats);
    }

    Ok((table, web_total, sync_total))
}

fn log_source(kind: &str, path: &std::path::Path, stats: &SourceStats) {
    tracing::info!(
        kind,
        log = %path.display(),
        lines = stats.lines,
        matched = stats.matched,
        skipped = stats.skipped,
        malformed = stats.malformed,
        up = stats.up,
        down = stats.down,
        "consumed log"
    );
}

/// Write one row per project for `date`.
pub fn persist(
    settings: &RunSettings,
    date: &RunDate,
    table: &TrafficTable,
) -> Result<usize, JobError> {
    let key = secret::load(&settings.secret_env)?;
    let conn = db::open_or_create(&settings.db_path, key.as_deref()).map_err(JobError::Db)?;
    let written = db::insert_traffic(&conn, date, table).map_err(JobError::Db)?;
    tracing::info!(
        db = %settings.db_path.display(),
        date = %date,
        rows = written,
        "committed traffic rows"
    );
    Ok(written)
}

/// Run the whole job, writing any report to `out`.
pub fn run<W: Write>(
    settings: &RunSettings,
    opts: &JobOptions,
    out: &mut W,
) -> Result<JobOutcome, JobError> {
    tracing::info!(date = %opts.date, commit = opts.commit, "mirror traffic run starting");

    let (table, web, sync) = aggregate(settings, &opts.date)?;

    if let Some(format) = opts.report {
        report::print(out, format, &opts.date, &table).map_err(JobError::Report)?;
    }

    let rows_written = if opts.commit {
        Some(persist(settings, &opts.date, &table)?)
    } else {
        tracing::info!("dry run, nothing written (pass --commit to persist)");
        None
    };

    Ok(JobOutcome {
        table,
        web,
        sync,
        rows_written,
    })
}

#[derive(Debug)]
pub enum JobError {
    Projects {
        root: PathBuf,
        source: std::io::Error,
    },
    Log(LogError),
    Secret(SecretError),
    Db(rusqlite::Error),
    Report(std::io::Error),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Projects { root, source } => {
                write!(f, "failed to list projects in {}: {source}", root.display())
            }
            JobError::Log(e) => write!(f, "{e}"),
            JobError::Secret(e) => write!(f, "{e}"),
            JobError::Db(e) => write!(f, "database error: {e}"),
            JobError::Report(e) => write!(f, "failed to write report: {e}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Projects { source, .. } => Some(source),
            JobError::Log(e) => Some(e),
            JobError::Secret(e) => Some(e),
            JobError::Db(e) => Some(e),
            JobError::Report(e) => Some(e),
        }
    }
}

impl From<LogError> for JobError {
    fn from(e: LogError) -> Self {
        JobError::Log(e)
    }
}

impl From<SecretError> for JobError {
    fn from(e: SecretError) -> Self {
        JobError::Secret(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::OTHER;
    use crate::traffic::TrafficCounters;
    use std::path::Path;
    use tempfile::TempDir;

    const WEB_LINE: &str = "10.0.0.1 - - [15/Jan/2024:08:00:00 +0000] \"GET /debian/pool/x.deb HTTP/1.1\" 200 512 \"-\" \"apt/2.6\" - 500 0";
    const SYNC_LINE: &str =
        "2024/01/15 08:00:00 [123] sent 1000 bytes  received 50 bytes  total size 2000";

    struct Fixture {
        dir: TempDir,
        settings: RunSettings,
    }

    /// Storage root with `debian` and `archlinux`, one access log, one sync log.
    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mirrors");
        std::fs::create_dir_all(root.join("debian")).unwrap();
        std::fs::create_dir_all(root.join("archlinux")).unwrap();

        let web_log = dir.path().join("access.log");
        std::fs::write(&web_log, format!("{WEB_LINE}\n")).unwrap();

        let sync_dir = dir.path().join("rsyncd");
        std::fs::create_dir_all(&sync_dir).unwrap();
        std::fs::write(sync_dir.join("archlinux.log"), format!("{SYNC_LINE}\n")).unwrap();

        let settings = RunSettings {
            storage_root: root,
            web_logs: vec![web_log],
            sync_logs: SyncLogs::Discover(sync_dir),
            db_path: dir.path().join("traffic.db"),
            secret_env: "MIRRORSTATS_TEST_SECRET_VARIABLE_THAT_IS_NEVER_SET".to_string(),
        };
        Fixture { dir, settings }
    }

    fn opts(commit: bool) -> JobOptions {
        JobOptions {
            date: RunDate::parse("2024-01-15").unwrap(),
            commit,
            report: None,
        }
    }

    fn stored_rows(path: &Path) -> Vec<db::TrafficRow> {
        let conn = db::open_or_create(path, None).unwrap();
        db::rows_for_date(&conn, &RunDate::parse("2024-01-15").unwrap()).unwrap()
    }

    #[test]
    fn end_to_end_totals() {
        let fx = fixture();
        let outcome = run(&fx.settings, &opts(false), &mut std::io::sink()).unwrap();

        let t = &outcome.table;
        assert_eq!(t.len(), 3);
        assert_eq!(t.get("debian"), Some(TrafficCounters::new(500, 0)));
        assert_eq!(t.get("archlinux"), Some(TrafficCounters::new(1000, 50)));
        assert_eq!(t.get(OTHER), Some(TrafficCounters::new(0, 0)));
        assert_eq!(outcome.web.matched, 1);
        assert_eq!(outcome.sync.matched, 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let fx = fixture();
        let outcome = run(&fx.settings, &opts(false), &mut std::io::sink()).unwrap();
        assert_eq!(outcome.rows_written, None);
        assert!(!fx.settings.db_path.exists());
    }

    #[test]
    fn commit_writes_one_row_per_project() {
        let fx = fixture();
        let outcome = run(&fx.settings, &opts(true), &mut std::io::sink()).unwrap();
        assert_eq!(outcome.rows_written, Some(3));

        let rows = stored_rows(&fx.settings.db_path);
        let debian = rows.iter().find(|r| r.project == "debian").unwrap();
        assert_eq!((debian.up, debian.down), (500, 0));
    }

    #[test]
    fn committing_twice_duplicates_rows() {
        let fx = fixture();
        run(&fx.settings, &opts(true), &mut std::io::sink()).unwrap();
        run(&fx.settings, &opts(true), &mut std::io::sink()).unwrap();

        let rows = stored_rows(&fx.settings.db_path);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows.iter().filter(|r| r.project == "archlinux").count(), 2);
    }

    #[test]
    fn rotated_sibling_is_added_not_deduplicated() {
        let mut fx = fixture();
        let rotated = fx.dir.path().join("access.log.1");
        std::fs::write(&rotated, format!("{WEB_LINE}\n")).unwrap();
        fx.settings.web_logs.push(rotated);

        let outcome = run(&fx.settings, &opts(false), &mut std::io::sink()).unwrap();
        assert_eq!(
            outcome.table.get("debian"),
            Some(TrafficCounters::new(1000, 0))
        );
    }

    #[test]
    fn report_goes_to_writer() {
        let fx = fixture();
        let mut out: Vec<u8> = Vec::new();
        let mut o = opts(false);
        o.report = Some(ReportFormat::Text);
        run(&fx.settings, &o, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("archlinux"));
        assert!(text.contains("1000 B"));
    }

    #[test]
    fn quiet_run_prints_nothing() {
        let fx = fixture();
        let mut out: Vec<u8> = Vec::new();
        run(&fx.settings, &opts(false), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn missing_web_log_aborts() {
        let mut fx = fixture();
        fx.settings.web_logs = vec![fx.dir.path().join("absent.log")];
        let err = run(&fx.settings, &opts(true), &mut std::io::sink()).unwrap_err();
        assert!(matches!(err, JobError::Log(LogError::Open { .. })));
        assert!(!fx.settings.db_path.exists());
    }

    #[test]
    fn missing_storage_root_aborts() {
        let mut fx = fixture();
        fx.settings.storage_root = fx.dir.path().join("absent");
        let err = run(&fx.settings, &opts(false), &mut std::io::sink()).unwrap_err();
        assert!(matches!(err, JobError::Projects { .. }));
    }

    #[test]
    fn explicit_sync_logs_used_as_given() {
        let mut fx = fixture();
        let debian_log = fx.dir.path().join("debian.log");
        std::fs::write(&debian_log, SYNC_LINE).unwrap();
        fx.settings.sync_logs = SyncLogs::Explicit(vec![debian_log]);

        let outcome = run(&fx.settings, &opts(false), &mut std::io::sink()).unwrap();
        assert_eq!(
            outcome.table.get("debian"),
            Some(TrafficCounters::new(1500, 50))
        );
        assert_eq!(
            outcome.table.get("archlinux"),
            Some(TrafficCounters::default())
        );
    }

    #[test]
    fn other_day_logs_yield_zero() {
        let fx = fixture();
        let mut o = opts(false);
        o.date = RunDate::parse("2024-01-16").unwrap();
        let outcome = run(&fx.settings, &o, &mut std::io::sink()).unwrap();
        assert_eq!(outcome.table.total(), TrafficCounters::default());
    }
}
