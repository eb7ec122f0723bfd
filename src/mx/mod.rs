//! Mail exchanger resolution.
//!
//! [`check_mx`] is the strict lookup that surfaces DNS failures to the caller.
//! [`resolve_exchangers`] is the lenient form used while verifying mailboxes:
//! every failure collapses into "no exchangers", since a domain that cannot
//! be resolved cannot receive mail either.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, SystemResolver, check_mx, normalize_domain, resolve_exchangers};
pub use types::{MxRecord, MxStatus};
