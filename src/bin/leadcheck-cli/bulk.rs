use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow, bail};
use leadcheck_lib::leads::{Lead, LeadFilter, verifiable_emails};
use leadcheck_lib::vendor::{BulkSource, bulk_file_contents, bulk_file_name};

use crate::import::read_leads;
use crate::output::emit;

pub fn run_bulk_file(
    path: &str,
    campaign: &str,
    source: &str,
    filter: Option<&str>,
    out: Option<&str>,
) -> Result<()> {
    let source: BulkSource = source.parse().map_err(|err: String| anyhow!(err))?;
    let leads = read_leads(path)?;
    let emails = select_emails(&leads, source, filter)?;
    if emails.is_empty() {
        bail!("no emails to verify in {path}");
    }
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    eprintln!(
        "{} ({} lines)",
        bulk_file_name(campaign, source, stamp),
        emails.len()
    );
    emit(bulk_file_contents(&emails).as_bytes(), out)
}

/// `selected` takes every lead in the file; `filtered` applies the query.
fn select_emails(leads: &[Lead], source: BulkSource, filter: Option<&str>) -> Result<Vec<String>> {
    match (source, filter) {
        (BulkSource::Selected, Some(_)) => bail!("--filter needs --source filtered"),
        (BulkSource::Selected, None) => Ok(verifiable_emails(leads)),
        (BulkSource::Filtered, query) => {
            let filter = LeadFilter::from_query(query.unwrap_or_default());
            let matching: Vec<Lead> = leads
                .iter()
                .filter(|lead| filter.matches(lead))
                .cloned()
                .collect();
            Ok(verifiable_emails(&matching))
        }
    }
}
