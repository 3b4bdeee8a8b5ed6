use neatrix_session::cli::{parse_args, run_cli_command};
use neatrix_session::config::BackendConfig;

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "neatrix_session=info";

fn main() -> Result<()> {
    let command = parse_args(std::env::args());

    color_eyre::install()?;

    // Logs go to stderr so command output stays parseable
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_cli_command(command, BackendConfig::from_env()))
}
