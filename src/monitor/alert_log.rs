//! Append-only alert log (one JSON object per line)

use super::tracker::Alert;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const ALERT_LOG_FILE: &str = "alerts.jsonl";

#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    /// Log at `<dir>/alerts.jsonl`; the directory is created if needed
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            path: dir.as_ref().join(ALERT_LOG_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, alert: &Alert) -> io::Result<()> {
        let mut line = serde_json::to_vec(alert)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.flush()
    }

    /// All alerts in the log. A torn last line is skipped.
    pub fn read_all(&self) -> io::Result<Vec<Alert>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut alerts = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(alert) => alerts.push(alert),
                Err(e) => tracing::warn!(line = lineno + 1, error = %e, "Skipping bad alert line"),
            }
        }
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{AlertKind, Severity};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn alert(token: &str) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            token_id: token.to_string(),
            old_price: dec!(0.50),
            new_price: dec!(0.60),
            pct_change: dec!(0.2),
            severity: Severity::Critical,
            baseline_at: Utc::now(),
            triggered_at: Utc::now(),
            kind: AlertKind::Threshold,
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let log = AlertLog::open(dir.path().join("alerts")).unwrap();

        let first = alert("a");
        let second = alert("b");
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        assert_eq!(log.read_all().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = AlertLog::open(dir.path()).unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_torn_line_skipped() {
        let dir = TempDir::new().unwrap();
        let log = AlertLog::open(dir.path()).unwrap();
        log.append(&alert("a")).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"{\"id\": \"tru")
            .unwrap();

        assert_eq!(log.read_all().unwrap().len(), 1);
    }
}
