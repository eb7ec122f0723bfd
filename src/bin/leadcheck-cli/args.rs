use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "leadcheck-cli", version, about = "Lead CSV tooling and SMTP mailbox verification")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// probe mailboxes over SMTP
    Verify(VerifyArgs),
    /// list the MX records of a domain
    Mx {
        domain: String,
        /// format: human|json
        #[arg(long, default_value = "human")]
        format: String,
    },
    /// normalise and deduplicate a lead CSV export
    Import {
        file: String,
        /// format: json|ndjson|csv
        #[arg(long, default_value = "csv")]
        format: String,
        /// keep only leads matching this query string (q=..&f_email_not_empty=1)
        #[arg(long)]
        filter: Option<String>,
        /// write to file instead of stdout
        #[arg(long)]
        out: Option<String>,
    },
    /// build a bulk-verification upload file from a lead CSV
    #[command(name = "bulk-file")]
    BulkFile {
        file: String,
        /// campaign id used in the file name
        #[arg(long)]
        campaign: String,
        /// source: selected|filtered
        #[arg(long, default_value = "selected")]
        source: String,
        /// with --source filtered: query string selecting the leads
        #[arg(long)]
        filter: Option<String>,
        /// write to file instead of stdout
        #[arg(long)]
        out: Option<String>,
    },
}

#[derive(Args)]
pub struct VerifyArgs {
    /// addresses to verify
    pub emails: Vec<String>,

    /// read addresses from stdin (one per line)
    #[arg(long)]
    pub stdin: bool,

    /// read addresses from a lead CSV export
    #[arg(long)]
    pub csv: Option<String>,

    /// with --csv: read this raw column instead of the lead email columns
    #[arg(long, requires = "csv")]
    pub column: Option<String>,

    /// with --csv: write the leads back with verification results applied
    #[arg(long = "leads-out", requires = "csv", conflicts_with = "column")]
    pub leads_out: Option<String>,

    /// format: human|json|ndjson|csv
    #[arg(long, default_value = "human")]
    pub format: String,

    /// write report to file
    #[arg(long)]
    pub out: Option<String>,

    /// concurrent probes
    #[arg(long, default_value_t = 5)]
    pub workers: usize,

    /// name sent with HELO
    #[arg(long)]
    pub helo: Option<String>,

    /// envelope sender for MAIL FROM (empty for <>)
    #[arg(long = "from")]
    pub mail_from: Option<String>,

    /// SMTP port
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// connect timeout (ms)
    #[arg(long = "connect-timeout-ms", default_value_t = 15_000)]
    pub connect_timeout_ms: u64,

    /// greeting/command timeout (ms)
    #[arg(long = "timeout-ms", default_value_t = 8_000)]
    pub timeout_ms: u64,

    /// RCPT TO timeout (ms)
    #[arg(long = "rcpt-timeout-ms", default_value_t = 10_000)]
    pub rcpt_timeout_ms: u64,

    /// stop starting new probes after this long (ms)
    #[arg(long = "deadline-ms")]
    pub deadline_ms: Option<u64>,

    /// regex marking a 550 reply as "unknown mailbox"
    #[arg(long = "unknown-pattern")]
    pub unknown_pattern: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
