use anyhow::{Context, Result, bail};
use leadcheck_lib::leads::{Lead, LeadFilter, export_leads, import_leads};
use tracing::info;

use crate::output::emit;

pub fn read_leads(path: &str) -> Result<Vec<Lead>> {
    let file = std::fs::File::open(path).with_context(|| format!("open {path}"))?;
    let import = import_leads(file).with_context(|| format!("parse {path}"))?;
    info!(
        path,
        rows = import.rows_read,
        duplicates = import.duplicates,
        "leads loaded"
    );
    Ok(import.leads)
}

pub fn run_import(path: &str, format: &str, filter: Option<&str>, out: Option<&str>) -> Result<()> {
    let mut leads = read_leads(path)?;
    if let Some(query) = filter {
        let filter = LeadFilter::from_query(query);
        leads.retain(|lead| filter.matches(lead));
        info!(kept = leads.len(), "filter applied");
    }
    emit(&render_leads(&leads, format)?, out)
}

pub fn render_leads(leads: &[Lead], format: &str) -> Result<Vec<u8>> {
    Ok(match format {
        "csv" => {
            let mut buf = Vec::new();
            export_leads(&mut buf, leads)?;
            buf
        }
        "json" => {
            let mut buf = serde_json::to_vec_pretty(leads)?;
            buf.push(b'\n');
            buf
        }
        "ndjson" => {
            let mut buf = Vec::new();
            for lead in leads {
                serde_json::to_writer(&mut buf, lead)?;
                buf.push(b'\n');
            }
            buf
        }
        other => bail!("unknown --format '{other}', use: json|ndjson|csv"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(email: &str) -> Lead {
        Lead {
            email: Some(email.to_string()),
            ..Lead::default()
        }
    }

    #[test]
    fn ndjson_is_one_lead_per_line() {
        let bytes = render_leads(&[lead("a@x.test"), lead("b@x.test")], "ndjson").expect("render");
        let text = String::from_utf8(bytes).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains(r#""email":"b@x.test""#));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = render_leads(&[], "xml").expect_err("format");
        assert!(err.to_string().contains("unknown --format 'xml'"));
    }
}
