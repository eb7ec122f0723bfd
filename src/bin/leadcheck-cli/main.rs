use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod args;
mod bulk;
mod import;
mod mx;
mod output;
mod verify;

use args::{Cli, Commands};

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.cmd {
        Commands::Verify(args) => {
            // exit codes: 0 OK, 2 some address negative, 1 fatal
            if verify::run_verify(args)? {
                std::process::exit(2);
            }
        }
        Commands::Mx { domain, format } => mx::run_mx(domain, format)?,
        Commands::Import {
            file,
            format,
            filter,
            out,
        } => import::run_import(file, format, filter.as_deref(), out.as_deref())?,
        Commands::BulkFile {
            file,
            campaign,
            source,
            filter,
            out,
        } => bulk::run_bulk_file(
            file,
            campaign,
            source,
            filter.as_deref(),
            out.as_deref(),
        )?,
    }
    Ok(())
}
