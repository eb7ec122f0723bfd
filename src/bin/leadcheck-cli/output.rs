use std::io::Write;

use anyhow::{Context, Result, bail};
use serde::Serialize;

/// A report line printable in every output format.
pub trait ReportRow: Serialize {
    fn human(&self) -> String;
    fn csv_headers() -> &'static [&'static str];
    fn csv_record(&self) -> Vec<String>;
}

pub fn write_reports<R: ReportRow>(rows: &[R], format: &str, out: Option<&str>) -> Result<()> {
    match format {
        "human" => {
            let mut text = String::new();
            for row in rows {
                text.push_str(&row.human());
                text.push('\n');
            }
            emit(text.as_bytes(), out)
        }
        "json" => {
            let mut s = serde_json::to_string_pretty(rows)?;
            s.push('\n');
            emit(s.as_bytes(), out)
        }
        "ndjson" => {
            let mut buf = Vec::new();
            for row in rows {
                serde_json::to_writer(&mut buf, row)?;
                buf.push(b'\n');
            }
            emit(&buf, out)
        }
        "csv" => {
            let mut wtr = csv::Writer::from_writer(Vec::new());
            wtr.write_record(R::csv_headers())?;
            for row in rows {
                wtr.write_record(row.csv_record())?;
            }
            let data = wtr.into_inner()?;
            emit(&data, out)
        }
        other => bail!("unknown --format '{other}', use: human|json|ndjson|csv"),
    }
}

/// Write to `out` atomically, or to stdout.
pub fn emit(bytes: &[u8], out: Option<&str>) -> Result<()> {
    match out {
        Some(path) => write_all_atomically(path, bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp).with_context(|| format!("create {tmp}"))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} -> {path}"))?;
    Ok(())
}
