use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::{Terminator, WriterBuilder};

use super::error::LeadCsvError;
use super::types::Lead;

pub const EXPORT_HEADERS: [&str; 16] = [
    "first_name",
    "last_name",
    "full_name",
    "company_name",
    "company_website",
    "email",
    "personal_email",
    "linkedin",
    "title",
    "industry",
    "city",
    "state",
    "country",
    "enriched_at",
    "verification_status",
    "verified_at",
];

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Write `leads` as CSV prefixed with a UTF-8 BOM so spreadsheet tools
/// detect the encoding. Headers are the `snake_case` names
/// [`import_leads`](super::import_leads) reads back.
pub fn export_leads<W: Write>(mut writer: W, leads: &[Lead]) -> Result<(), LeadCsvError> {
    writer.write_all(BOM)?;
    let mut wtr = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(EXPORT_HEADERS)?;
    for lead in leads {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let stamp = |value: &Option<DateTime<Utc>>| {
            value
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default()
        };
        wtr.write_record([
            opt(&lead.first_name),
            opt(&lead.last_name),
            opt(&lead.full_name),
            opt(&lead.company_name),
            opt(&lead.company_website),
            opt(&lead.email),
            opt(&lead.personal_email),
            opt(&lead.linkedin),
            opt(&lead.title),
            opt(&lead.industry),
            opt(&lead.city),
            opt(&lead.state),
            opt(&lead.country),
            stamp(&lead.enriched_at),
            lead.verification_status.as_str().to_string(),
            stamp(&lead.verification_checked_at),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// File name stem for an export: the campaign name slugged to `[a-z0-9-]`,
/// at most 80 characters, or `campaign-<id>` when nothing usable remains.
pub fn export_file_name(campaign_name: &str, campaign_id: &str) -> String {
    let lowered = campaign_name.to_lowercase();
    let slug = lowered
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug: String = slug.chars().take(80).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("campaign-{campaign_id}")
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::{VerificationStatus, import_leads};
    use chrono::TimeZone;

    fn jane() -> Lead {
        Lead {
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            full_name: Some("Jane Doe".into()),
            company_name: Some("Acme, Inc".into()),
            company_website: Some("acme.com".into()),
            email: Some("jane@acme.com".into()),
            title: Some("CEO".into()),
            city: Some("Paris".into()),
            country: Some("France".into()),
            verification_status: VerificationStatus::VerifiedOk,
            verification_checked_at: Some(Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap()),
            ..Lead::default()
        }
    }

    #[test]
    fn export_renders_bom_header_and_quoted_fields() {
        let mut out = Vec::new();
        export_leads(&mut out, &[jane()]).expect("export");
        assert!(out.starts_with(BOM));
        let text = String::from_utf8(out[BOM.len()..].to_vec()).expect("utf8");
        insta::assert_snapshot!(text.trim_end(), @r###"
        first_name,last_name,full_name,company_name,company_website,email,personal_email,linkedin,title,industry,city,state,country,enriched_at,verification_status,verified_at
        Jane,Doe,Jane Doe,"Acme, Inc",acme.com,jane@acme.com,,,CEO,,Paris,,France,,verified_ok,2024-06-02T08:00:00Z
        "###);
    }

    #[test]
    fn export_reimports() {
        let mut out = Vec::new();
        export_leads(&mut out, &[jane()]).expect("export");
        let import = import_leads(out.as_slice()).expect("import");
        let lead = &import.leads[0];
        assert_eq!(lead.company_name.as_deref(), Some("Acme, Inc"));
        assert_eq!(lead.email.as_deref(), Some("jane@acme.com"));
        assert_eq!(lead, &jane());
    }

    #[test]
    fn file_name_slugs_campaign_name() {
        assert_eq!(export_file_name("  Q3 — Paris SaaS Founders!  ", "42"), "q3-paris-saas-founders");
        assert_eq!(export_file_name("***", "42"), "campaign-42");
        assert_eq!(export_file_name(&"a".repeat(100), "1").len(), 80);
    }
}
