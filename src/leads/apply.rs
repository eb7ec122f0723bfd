use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::Lead;
use crate::smtp_verify::{Outcome, VerificationResult};

/// Write each result's outcome onto the leads sharing its email
/// (case-insensitive). Returns how many leads changed.
pub fn apply_results(
    leads: &mut [Lead],
    results: &[VerificationResult],
    checked_at: DateTime<Utc>,
) -> usize {
    let by_email: HashMap<String, Outcome> = results
        .iter()
        .map(|result| (result.address.trim().to_lowercase(), result.outcome))
        .collect();

    let mut updated = 0;
    for lead in leads.iter_mut() {
        let Some(outcome) = lead.email_key().and_then(|key| by_email.get(&key).copied()) else {
            continue;
        };
        lead.apply_outcome(outcome, checked_at);
        updated += 1;
    }
    debug!(results = results.len(), updated, "verification results applied");
    updated
}

/// Mark every lead with a verifiable email as queued. Returns the count.
pub fn mark_queued(leads: &mut [Lead]) -> usize {
    let mut queued = 0;
    for lead in leads.iter_mut().filter(|lead| lead.email_key().is_some()) {
        lead.mark_queued();
        queued += 1;
    }
    queued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::VerificationStatus;
    use chrono::TimeZone;

    fn lead(email: Option<&str>) -> Lead {
        Lead {
            email: email.map(str::to_string),
            ..Lead::default()
        }
    }

    #[test]
    fn applies_outcomes_by_lowercased_email() {
        let checked = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();
        let mut leads = vec![
            lead(Some("jane@acme.com")),
            lead(Some("Bob@Acme.com")),
            lead(None),
            lead(Some("nobody@acme.com")),
        ];
        let results = [
            VerificationResult::new("JANE@acme.com ", Outcome::Affirmative),
            VerificationResult::new("bob@acme.com", Outcome::Indeterminate),
        ];
        assert_eq!(apply_results(&mut leads, &results, checked), 2);
        assert_eq!(leads[0].verification_status, VerificationStatus::VerifiedOk);
        assert_eq!(leads[0].verification_checked_at, Some(checked));
        assert_eq!(leads[1].verification_status, VerificationStatus::VerifiedUnknown);
        assert_eq!(leads[2].verification_status, VerificationStatus::Unverified);
        assert_eq!(leads[3].verification_checked_at, None);
    }

    #[test]
    fn queues_only_leads_with_email() {
        let mut leads = vec![lead(Some("jane@acme.com")), lead(None)];
        leads[0].verification_checked_at = Some(Utc::now());
        assert_eq!(mark_queued(&mut leads), 1);
        assert_eq!(leads[0].verification_status, VerificationStatus::Queued);
        assert_eq!(leads[0].verification_checked_at, None);
        assert_eq!(leads[1].verification_status, VerificationStatus::Unverified);
    }
}
