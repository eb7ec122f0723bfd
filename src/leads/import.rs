use std::collections::HashSet;
use std::io::Read;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use super::error::LeadCsvError;
use super::status::VerificationStatus;
use super::types::{Lead, LeadImport, parse_timestamp};

/// A field read from either its Apollo-style "Title Case" header or its
/// `snake_case` header, first non-empty value wins.
#[derive(Debug, Clone, Copy, Default)]
struct Column {
    primary: Option<usize>,
    alias: Option<usize>,
}

impl Column {
    fn locate(headers: &StringRecord, title: &str, snake: &str) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim_start_matches('\u{feff}') == name)
        };
        Self {
            primary: find(title),
            alias: find(snake),
        }
    }

    fn get(&self, record: &StringRecord) -> Option<String> {
        [self.primary, self.alias]
            .into_iter()
            .flatten()
            .filter_map(|index| record.get(index))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

struct Columns {
    first_name: Column,
    last_name: Column,
    full_name: Column,
    company_name: Column,
    company_website: Column,
    company_domain: Column,
    email: Column,
    personal_email: Column,
    linkedin: Column,
    title: Column,
    industry: Column,
    city: Column,
    state: Column,
    country: Column,
    enriched_at: Column,
    verification_status: Column,
    verified_at: Column,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let col = |title: &str, snake: &str| Column::locate(headers, title, snake);
        Self {
            first_name: col("First Name", "first_name"),
            last_name: col("Last Name", "last_name"),
            full_name: col("Full Name", "full_name"),
            company_name: col("Company Name", "company_name"),
            company_website: col("Company Website", "company_website"),
            company_domain: col("Company Domain", "company_domain"),
            email: col("Email", "email"),
            personal_email: col("Personal Email", "personal_email"),
            linkedin: col("LinkedIn", "linkedin"),
            title: col("Title", "title"),
            industry: col("Industry", "industry"),
            city: col("City", "city"),
            state: col("State", "state"),
            country: col("Country", "country"),
            enriched_at: col("Enriched At", "enriched_at"),
            verification_status: col("Verification Status", "verification_status"),
            verified_at: col("verified_at", "verification_checked_at"),
        }
    }

    fn lead(&self, record: &StringRecord) -> Lead {
        let first_name = self.first_name.get(record);
        let last_name = self.last_name.get(record);
        let full_name = self.full_name.get(record).or_else(|| {
            let joined = [first_name.as_deref(), last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        });
        let company_website = self
            .company_website
            .get(record)
            .or_else(|| self.company_domain.get(record))
            .map(|site| strip_scheme(&site).to_string())
            .filter(|site| !site.is_empty());

        Lead {
            first_name,
            last_name,
            full_name,
            company_name: self.company_name.get(record),
            company_website,
            email: self.email.get(record).map(|e| e.to_lowercase()),
            personal_email: self.personal_email.get(record).map(|e| e.to_lowercase()),
            linkedin: self.linkedin.get(record),
            title: self.title.get(record),
            industry: self.industry.get(record),
            city: self.city.get(record),
            state: self.state.get(record),
            country: self.country.get(record),
            enriched_at: timestamp(&self.enriched_at, record),
            verification_status: self
                .verification_status
                .get(record)
                .and_then(|status| status.parse::<VerificationStatus>().ok())
                .unwrap_or_default(),
            verification_checked_at: timestamp(&self.verified_at, record),
        }
    }
}

fn timestamp(column: &Column, record: &StringRecord) -> Option<DateTime<Utc>> {
    let raw = column.get(record)?;
    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        debug!(value = %raw, "ignoring unparseable timestamp");
    }
    parsed
}

/// Parse a lead CSV export (header row required).
///
/// Rows are deduplicated on their lowercased email, keeping the first
/// occurrence; rows without an email are always kept.
pub fn import_leads<R: Read>(reader: R) -> Result<LeadImport, LeadCsvError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(LeadCsvError::MissingHeaders);
    }
    let columns = Columns::new(&headers);

    let mut import = LeadImport::default();
    let mut seen = HashSet::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        import.rows_read += 1;
        let lead = columns.lead(&record);
        if let Some(email) = &lead.email {
            if !seen.insert(email.clone()) {
                import.duplicates += 1;
                continue;
            }
        }
        import.leads.push(lead);
    }
    debug!(
        rows = import.rows_read,
        kept = import.leads.len(),
        duplicates = import.duplicates,
        "lead CSV imported"
    );
    Ok(import)
}

/// Emails worth sending to a verifier: containing `@`, longer than three
/// characters, lowercased, first occurrence only.
pub fn verifiable_emails(leads: &[Lead]) -> Vec<String> {
    let mut seen = HashSet::new();
    leads
        .iter()
        .filter_map(|lead| lead.email.as_deref())
        .map(|email| email.trim().to_lowercase())
        .filter(|email| email.len() > 3 && email.contains('@'))
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

fn strip_scheme(site: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if let Some(prefix) = site.get(..scheme.len()) {
            if prefix.eq_ignore_ascii_case(scheme) {
                return &site[scheme.len()..];
            }
        }
    }
    site
}
