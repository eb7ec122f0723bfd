use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default reply-text pattern marking a `550` as "this mailbox does not exist".
/// Matched case-insensitively against every line of the reply.
pub const DEFAULT_UNKNOWN_MAILBOX_PATTERN: &str = r"5\.1\.1|user unknown|no such user|unknown user|mailbox unavailable|does not exist|not found|invalid recipient|recipient rejected";

/// Configuration knobs for [`Verifier`](super::Verifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierOptions {
    pub port: u16,
    pub helo_domain: String,
    pub mail_from: String,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub rcpt_timeout_ms: u64,
    pub workers: usize,
    pub batch_deadline_ms: Option<u64>,
    pub unknown_mailbox_pattern: String,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_domain: "verifier.local".to_string(),
            mail_from: "verify@verifier.local".to_string(),
            connect_timeout_ms: 15_000,
            command_timeout_ms: 8_000,
            rcpt_timeout_ms: 10_000,
            workers: 5,
            batch_deadline_ms: None,
            unknown_mailbox_pattern: DEFAULT_UNKNOWN_MAILBOX_PATTERN.to_string(),
        }
    }
}

impl VerifierOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Budget for the greeting and for every command other than `RCPT TO`.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn rcpt_timeout(&self) -> Duration {
        Duration::from_millis(self.rcpt_timeout_ms)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_ms.map(Duration::from_millis)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    pub fn helo_name(&self) -> &str {
        let trimmed = self.helo_domain.trim();
        if trimmed.is_empty() {
            "localhost"
        } else {
            trimmed
        }
    }

    /// Envelope sender for `MAIL FROM`. An empty value yields the null
    /// reverse-path `<>`.
    pub fn envelope_sender(&self) -> &str {
        self.mail_from.trim()
    }
}
