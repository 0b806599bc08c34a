/// The calendar day a run computes statistics for.
///
/// Each log format carries its own date representation; parsers compare
/// against a pre-formatted target string instead of parsing every line.
use chrono::{Local, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunDate(NaiveDate);

impl RunDate {
    /// The day before today, in local time.
    pub fn yesterday() -> Self {
        let today = Local::now().date_naive();
        Self(today.pred_opt().unwrap_or(today))
    }

    /// Parse a `YYYY-MM-DD` argument.
    pub fn parse(s: &str) -> Result<Self, RunDateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|source| RunDateError {
                input: s.to_string(),
                source,
            })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Date as it appears inside a web-access timestamp: `15/Jan/2024`.
    pub fn web_format(&self) -> String {
        self.0.format("%d/%b/%Y").to_string()
    }

    /// Date prefix of a sync-daemon timestamp: `2024/01/15`.
    pub fn sync_format(&self) -> String {
        self.0.format("%Y/%m/%d").to_string()
    }

    /// Key stored alongside persisted rows: `2024-01-15`.
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for RunDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[derive(Debug)]
pub struct RunDateError {
    input: String,
    source: chrono::ParseError,
}

impl std::fmt::Display for RunDateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid date {:?} (expected YYYY-MM-DD): {}",
            self.input, self.source
        )
    }
}

impl std::error::Error for RunDateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
