use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Read};

use anyhow::{Context, Result};
use chrono::Utc;
use leadcheck_lib::leads::{Lead, apply_results, import_leads, verifiable_emails};
use leadcheck_lib::{Outcome, VerificationResult, VerificationStatus, Verifier, VerifierOptions};
use serde::Serialize;
use tracing::info;

use crate::args::VerifyArgs;
use crate::import::render_leads;
use crate::output::{ReportRow, emit, write_reports};

#[derive(Debug, Serialize)]
pub struct VerifyRow {
    pub address: String,
    pub outcome: Outcome,
    pub status: VerificationStatus,
}

impl ReportRow for VerifyRow {
    fn human(&self) -> String {
        let tag = match self.outcome {
            Outcome::Affirmative => "[OK]     ",
            Outcome::Negative => "[BAD]    ",
            Outcome::Indeterminate => "[UNKNOWN]",
        };
        format!("{tag} {}", self.address)
    }

    fn csv_headers() -> &'static [&'static str] {
        &["address", "outcome", "verification_status"]
    }

    fn csv_record(&self) -> Vec<String> {
        vec![
            self.address.clone(),
            self.outcome.to_string(),
            self.status.to_string(),
        ]
    }
}

/// Runs the batch and reports. Returns true when any address is negative.
pub fn run_verify(args: &VerifyArgs) -> Result<bool> {
    let (addresses, mut leads) = collect_addresses(args)?;
    if addresses.is_empty() {
        anyhow::bail!("no addresses given (positional, --stdin or --csv)");
    }

    let verifier = Verifier::new(options_from(args)).context("build verifier")?;
    let results = verifier.verify_batch(&addresses);

    if let (Some(path), Some(leads)) = (&args.leads_out, leads.as_mut()) {
        let updated = apply_results(leads, &results, Utc::now());
        info!(path = %path, updated, "writing leads with verification results");
        emit(&render_leads(leads, "csv")?, Some(path.as_str()))?;
    }

    let rows = in_input_order(&addresses, results);
    write_reports(&rows, &args.format, args.out.as_deref())?;
    Ok(rows.iter().any(|row| row.outcome == Outcome::Negative))
}

fn options_from(args: &VerifyArgs) -> VerifierOptions {
    let mut options = VerifierOptions {
        port: args.port,
        connect_timeout_ms: args.connect_timeout_ms,
        command_timeout_ms: args.timeout_ms,
        rcpt_timeout_ms: args.rcpt_timeout_ms,
        workers: args.workers,
        batch_deadline_ms: args.deadline_ms,
        ..VerifierOptions::default()
    };
    if let Some(helo) = &args.helo {
        options.helo_domain = helo.clone();
    }
    if let Some(mail_from) = &args.mail_from {
        options.mail_from = mail_from.clone();
    }
    if let Some(pattern) = &args.unknown_pattern {
        options.unknown_mailbox_pattern = pattern.clone();
    }
    options
}

/// Addresses to verify, plus the parsed leads when they came from a lead CSV.
fn collect_addresses(args: &VerifyArgs) -> Result<(Vec<String>, Option<Vec<Lead>>)> {
    let mut leads = None;
    let mut addresses: Vec<String> = args.emails.clone();
    if args.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            let line = line.trim();
            if !line.is_empty() {
                addresses.push(line.to_string());
            }
        }
    }
    if let Some(path) = &args.csv {
        let file = std::fs::File::open(path).with_context(|| format!("open {path}"))?;
        match &args.column {
            Some(column) => addresses.extend(
                read_column(file, column).with_context(|| format!("parse {path}"))?,
            ),
            None => {
                let import = import_leads(file).with_context(|| format!("parse {path}"))?;
                addresses.extend(verifiable_emails(&import.leads));
                leads = Some(import.leads);
            }
        }
    }
    Ok((addresses, leads))
}

fn read_column<R: Read>(reader: R, column: &str) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let index = rdr
        .headers()?
        .iter()
        .position(|header| header.eq_ignore_ascii_case(column))
        .with_context(|| format!("no column named '{column}'"))?;
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(value) = record.get(index).filter(|v| !v.is_empty()) {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

/// Results come back in completion order; line them up with the input again.
fn in_input_order(addresses: &[String], results: Vec<VerificationResult>) -> Vec<VerifyRow> {
    let mut by_address: HashMap<String, VecDeque<Outcome>> = HashMap::new();
    for result in results {
        by_address
            .entry(result.address)
            .or_default()
            .push_back(result.outcome);
    }
    addresses
        .iter()
        .map(|address| {
            let outcome = by_address
                .get_mut(address)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Outcome::Indeterminate);
            VerifyRow {
                address: address.clone(),
                outcome,
                status: outcome.into(),
            }
        })
        .collect()
}
