use std::time::Instant;

use crate::config::CONFIG;
use crate::submissions::SubmissionLog;

/// Shared application state handed to every request handler.
#[derive(Debug)]
pub struct AppState {
    pub started_at: Instant,
    pub submission_log: SubmissionLog,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            started_at: Instant::now(),
            submission_log: SubmissionLog::new(&CONFIG.submissions_csv_path),
        }
    }
}
