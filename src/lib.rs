#![forbid(unsafe_code)]
//! leadcheck_lib: lead import/export and SMTP mailbox verification

pub mod leads;
pub mod mx;
pub mod smtp_verify;
pub mod vendor;

pub use leads::{
    Lead, LeadFilter, LeadImport, VerificationStatus, apply_results, export_leads, import_leads,
};
pub use mx::{Error as MxError, MxRecord, MxStatus, check_mx};
pub use smtp_verify::{
    Outcome, VerificationResult, Verifier, VerifierError, VerifierOptions, verify_batch,
};
pub use vendor::{UploadHandle, parse_upload_response};
