//! Direct SMTP mailbox verification.
//!
//! [`Verifier::verify_batch`] (or the free [`verify_batch`]) resolves each
//! address's mail exchangers and runs a minimal `HELO` / `MAIL FROM` /
//! `RCPT TO` dialog against them, without sending mail. Nothing crosses the
//! public boundary as an error: every address ends up [`Outcome::Affirmative`],
//! [`Outcome::Negative`] or [`Outcome::Indeterminate`], and internal failures
//! are logged through `tracing`.

mod batch;
mod error;
mod options;
mod policy;
mod probe;
mod session;
mod transport;
mod types;

pub use batch::{Verifier, split_address, verify_batch};
pub use error::{ReplyError, VerifierError};
pub use options::{DEFAULT_UNKNOWN_MAILBOX_PATTERN, VerifierOptions};
pub use policy::MailboxPolicy;
pub use probe::probe;
pub use transport::{Connector, TcpConnector, Transport};
pub use types::{Outcome, SmtpReply, Stage, VerificationResult};

#[cfg(test)]
pub(crate) mod tests;
