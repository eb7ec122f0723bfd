use regex::{Regex, RegexBuilder};

use super::error::VerifierError;
use super::types::{Outcome, SmtpReply};

/// How `RCPT TO` replies map to outcomes.
///
/// Only `250` and a `550` whose text looks like "mailbox unknown" are
/// decisive. Vendors word their rejections differently, so the text pattern
/// is configurable and both false positives and false negatives remain
/// possible.
#[derive(Debug, Clone)]
pub struct MailboxPolicy {
    unknown_mailbox: Regex,
}

impl MailboxPolicy {
    pub fn new(unknown_mailbox_pattern: &str) -> Result<Self, VerifierError> {
        let unknown_mailbox = RegexBuilder::new(unknown_mailbox_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| VerifierError::Pattern { source })?;
        Ok(Self { unknown_mailbox })
    }

    pub fn is_unknown_mailbox(&self, reply: &SmtpReply) -> bool {
        reply
            .lines
            .iter()
            .any(|line| self.unknown_mailbox.is_match(line))
    }

    pub fn classify_rcpt(&self, reply: &SmtpReply) -> Outcome {
        match reply.code {
            250 => Outcome::Affirmative,
            550 if self.is_unknown_mailbox(reply) => Outcome::Negative,
            // greylisting, mailbox busy, local error, storage
            421 | 450 | 451 | 452 => Outcome::Indeterminate,
            _ => Outcome::Indeterminate,
        }
    }
}
