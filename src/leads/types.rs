use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::status::VerificationStatus;
use crate::smtp_verify::Outcome;

/// A sales lead as imported from a CSV export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub email: Option<String>,
    pub personal_email: Option<String>,
    pub linkedin: Option<String>,
    pub title: Option<String>,
    pub industry: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub enriched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    /// When `verification_status` was last settled. Cleared while queued.
    #[serde(default)]
    pub verification_checked_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Handed to a verifier; the previous check no longer applies.
    pub fn mark_queued(&mut self) {
        self.verification_status = VerificationStatus::Queued;
        self.verification_checked_at = None;
    }

    pub fn apply_outcome(&mut self, outcome: Outcome, checked_at: DateTime<Utc>) {
        self.verification_status = outcome.into();
        self.verification_checked_at = Some(checked_at);
    }

    /// The email used to match verification results: trimmed, lowercased.
    pub fn email_key(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
    }
}

/// Result of [`import_leads`](super::import_leads).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeadImport {
    pub leads: Vec<Lead>,
    /// Non-empty data rows seen, duplicates included.
    pub rows_read: usize,
    /// Rows dropped because an earlier row had the same email.
    pub duplicates: usize,
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC). Anything else
/// is `None`.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}
