//! Lead records: CSV import with header mapping and per-file email
//! deduplication, CSV export, list filtering, and the verification status
//! bookkeeping stored per lead.

mod apply;
mod error;
mod export;
mod filter;
mod import;
mod status;
mod types;

pub use apply::{apply_results, mark_queued};
pub use error::{LeadCsvError, ParseStatusError};
pub use export::{EXPORT_HEADERS, export_file_name, export_leads};
pub use filter::LeadFilter;
pub use import::{import_leads, verifiable_emails};
pub use status::VerificationStatus;
pub use types::{Lead, LeadImport};
