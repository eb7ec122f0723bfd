use std::io;

use thiserror::Error;

use super::types::Stage;

/// Failure while waiting for a single SMTP reply.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("timed out waiting for reply")]
    Timeout,
    #[error("connection closed before a complete reply")]
    ConnectionClosed,
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
}

impl ReplyError {
    pub(crate) fn io(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io { source },
        }
    }
}

/// Why a probe gave up before classifying the `RCPT TO` reply. Only logged;
/// the caller always sees [`Outcome::Indeterminate`](super::Outcome).
#[derive(Debug, Error)]
pub(crate) enum ProbeError {
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("sending {stage} failed: {source}")]
    Send {
        stage: Stage,
        #[source]
        source: io::Error,
    },
    #[error("no usable {stage} reply: {source}")]
    Reply {
        stage: Stage,
        #[source]
        source: ReplyError,
    },
    #[error("{stage} refused with {code}")]
    Refused { stage: Stage, code: u16 },
}

impl ProbeError {
    pub(crate) fn is_refusal(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }
}

/// Errors raised while building a [`Verifier`](super::Verifier). Verification
/// itself never fails.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("invalid unknown-mailbox pattern: {source}")]
    Pattern {
        #[source]
        source: regex::Error,
    },
}
