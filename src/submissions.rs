use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

const CSV_HEADER: &str =
    "TIMESTAMP,EMAIL,ROLE,PAIN_POINT,CRM_PERSONALITY,GENDER_PREFERENCE,GENERATED_TITLE,GENERATED_QUOTE";

/// One row of the submission log.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub timestamp: DateTime<Utc>,
    pub email: String,
    pub role: String,
    pub pain_point: String,
    pub personality: String,
    pub gender_presentation: String,
    pub title: String,
    pub quote: String,
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl SubmissionRecord {
    fn to_csv_row(&self) -> String {
        [
            self.timestamp.to_rfc3339(),
            csv_escape(&self.email),
            csv_escape(&self.role),
            csv_escape(&self.pain_point),
            csv_escape(&self.personality),
            csv_escape(&self.gender_presentation),
            csv_escape(&self.title),
            csv_escape(&self.quote),
        ]
        .join(",")
    }
}

/// Append-only CSV sink for submissions. Writes are serialized through an internal
/// lock; the header is written once when the file is first created.
#[derive(Debug)]
pub struct SubmissionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SubmissionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SubmissionLog {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn append(&self, record: &SubmissionRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let is_new = !tokio::fs::try_exists(&self.path).await.unwrap_or(false);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut line = String::new();
        if is_new {
            line.push_str(CSV_HEADER);
            line.push('\n');
        }
        line.push_str(&record.to_csv_row());
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Logs one submission. Sink failures never affect the request: they are reported
    /// in diagnostics and swallowed.
    pub async fn log_submission(&self, record: &SubmissionRecord) {
        match self.append(record).await {
            Ok(()) => info!("Submission logged to {}", self.path.display()),
            Err(err) => warn!(
                "Failed to log submission to {}: {err}",
                self.path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(title: &str, quote: &str) -> SubmissionRecord {
        SubmissionRecord {
            timestamp: DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
                .expect("valid timestamp")
                .with_timezone(&Utc),
            email: "dev@example.org".to_string(),
            role: "Grant Writer".to_string(),
            pain_point: "Data entry takes forever".to_string(),
            personality: "Micromanager".to_string(),
            gender_presentation: "ambiguous".to_string(),
            title: title.to_string(),
            quote: quote.to_string(),
        }
    }

    #[tokio::test]
    async fn writes_header_once_and_appends_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("submissions.csv");
        let log = SubmissionLog::new(&path);

        log.append(&test_record("The Duplicator", "Twice the fun"))
            .await
            .expect("first append");
        log.append(&test_record("Captain Micromanager", "Details matter"))
            .await
            .expect("second append");

        let content = std::fs::read_to_string(&path).expect("read csv");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains("The Duplicator"));
        assert!(lines[2].contains("Captain Micromanager"));
    }

    #[tokio::test]
    async fn quotes_fields_containing_commas_and_quotes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("submissions.csv");
        let log = SubmissionLog::new(&path);

        log.append(&test_record(
            "The \"Duplicator\"",
            "Contacts, contacts everywhere!",
        ))
        .await
        .expect("append");

        let content = std::fs::read_to_string(&path).expect("read csv");
        assert!(content.contains("\"The \"\"Duplicator\"\"\""));
        assert!(content.contains("\"Contacts, contacts everywhere!\""));
    }

    #[tokio::test]
    async fn log_submission_swallows_sink_failures() {
        // Points at a directory that does not exist; append fails but the call returns.
        let log = SubmissionLog::new("/nonexistent-submission-dir/submissions.csv");
        log.log_submission(&test_record("The Duplicator", "Twice the fun"))
            .await;
    }
}
