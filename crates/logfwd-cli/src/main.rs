//! logfwd entry point

use anyhow::Result;
use clap::Parser;
use logfwd_cli::commands::{Cli, CommandExecutor, LogFormat};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = CommandExecutor::new().execute(cli.command).await?;
    if !result.message.is_empty() {
        print!("{}", result.message);
        if !result.message.ends_with('\n') {
            println!();
        }
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
