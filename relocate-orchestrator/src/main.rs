use clap::Parser;
use relocate_orchestrator::cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// One instance at a time: a single-threaded runtime is all the workflow needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // .env first so clap's env fallbacks see its values.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
