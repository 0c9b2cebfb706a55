use std::process::ExitCode;

use clap::Parser;
use noteweave_cli::{App, Cli, commands, telemetry};
use noteweave_rag::RagError;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so env-backed flags see it.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init_logging(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(hint) = e.downcast_ref::<RagError>().and_then(commands::hint) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let app = App::from_settings(cli.settings).await?;
    commands::execute(&app, cli.command).await
}
