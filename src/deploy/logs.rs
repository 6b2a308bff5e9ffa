// ABOUTME: Counts error-indicating lines in the soak window's logs.
// ABOUTME: Unavailable logs are an explicit sample variant that counts as zero.

use futures::StreamExt;
use serde::Serialize;

use crate::cluster::LogLines;

/// What the soak log fetch produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "logs", rename_all = "snake_case")]
pub enum LogSample {
    Observed { errors: usize, lines: usize },
    /// Logs could not be read. Counts as zero errors.
    Unavailable { reason: String },
}

impl LogSample {
    pub fn errors(&self) -> usize {
        match self {
            LogSample::Observed { errors, .. } => *errors,
            LogSample::Unavailable { .. } => 0,
        }
    }
}

pub struct LogErrorCounter;

impl LogErrorCounter {
    /// Number of lines containing `error`, ignoring case.
    pub fn count_errors<I, S>(lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter(|line| Self::is_error_line(line.as_ref()))
            .count()
    }

    fn is_error_line(line: &str) -> bool {
        line.to_lowercase().contains("error")
    }

    /// Drain a log stream. A read failure part way through keeps what was
    /// counted so far.
    pub async fn sample(mut stream: LogLines) -> LogSample {
        let mut errors = 0;
        let mut lines = 0;

        while let Some(item) = stream.next().await {
            match item {
                Ok(line) => {
                    lines += 1;
                    if Self::is_error_line(&line) {
                        errors += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, lines, "log stream ended early");
                    break;
                }
            }
        }

        LogSample::Observed { errors, lines }
    }
}
