use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a mailbox after probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The exchanger accepted the recipient.
    Affirmative,
    /// Malformed address, no mail exchanger, or an explicit unknown-mailbox
    /// rejection.
    Negative,
    /// Nothing decisive: temporary failures, timeouts, policy refusals,
    /// unexpected codes.
    Indeterminate,
}

impl Outcome {
    pub fn is_decisive(self) -> bool {
        !matches!(self, Self::Indeterminate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Affirmative => "affirmative",
            Self::Negative => "negative",
            Self::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub address: String,
    pub outcome: Outcome,
}

impl VerificationResult {
    pub fn new(address: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            address: address.into(),
            outcome,
        }
    }
}

/// A complete SMTP reply: the code of the terminating line and the text of
/// every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        self.code >= 500
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" / "))
    }
}

/// Dialog step, used in logs and probe errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greeting => "greeting",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Quit => "QUIT",
        })
    }
}
