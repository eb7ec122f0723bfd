use anyhow::{Result, bail};
use leadcheck_lib::{MxStatus, check_mx};

pub fn run_mx(domain: &str, format: &str) -> Result<()> {
    let status = check_mx(domain)?;
    match format {
        "human" => println!("{domain}: {}", human_summary(&status)),
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        other => bail!("unknown --format '{other}', use: human|json"),
    }
    Ok(())
}

fn human_summary(status: &MxStatus) -> String {
    match status {
        MxStatus::Records(records) => records
            .iter()
            .map(|r| format!("{}:{}", r.preference, r.exchange))
            .collect::<Vec<_>>()
            .join(", "),
        MxStatus::NoRecords => "no MX records".to_string(),
    }
}
