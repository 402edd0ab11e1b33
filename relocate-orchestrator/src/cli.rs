use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use relocate_common::InstanceId;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

use crate::batch::MigrationBatch;
use crate::coordinator::{BatchCoordinator, ConsoleReporter, MigrationReport};
use crate::driver::TransitionDriver;
use crate::gateway::RegionGateway;
use crate::inspector::get_instance_details;
use crate::logger::ActionLogger;
use crate::provider_manager::ProviderManager;
use crate::settings::Settings;
use crate::waiter::Waits;

#[derive(Parser, Debug)]
#[command(
    name = "relocate",
    version,
    about = "Move instances to another region: stop, image, copy the image, launch"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate a batch of instances, one after the other
    Migrate(MigrateArgs),
    /// Show type and state of one instance in the source region
    Describe(DescribeArgs),
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub settings: Settings,

    /// Instance ids, processed in the order given
    pub instance_ids: Vec<String>,

    /// File with one instance id per line (`#` starts a comment); appended after the arguments
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Append action-log events to this file as JSON lines
    #[arg(long, env = "MIGRATION_JOURNAL")]
    pub journal: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[arg(long, env = "SOURCE_REGION")]
    pub region: String,

    #[arg(long, env = "PROVIDER", default_value = "ec2")]
    pub provider: String,

    pub instance_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            Command::Migrate(args) => migrate(args).await,
            Command::Describe(args) => describe(args).await,
        }
    }
}

async fn migrate(args: MigrateArgs) -> Result<ExitCode> {
    let settings = args.settings;
    settings.validate()?;

    let batch = MigrationBatch::from_sources(&args.instance_ids, args.file.as_deref())?;
    if batch.is_empty() {
        bail!("no instance ids given (pass them as arguments or with --file)");
    }

    let correlation_id = Uuid::new_v4();
    let mut logger = ActionLogger::new(correlation_id);
    if let Some(path) = &args.journal {
        logger = logger.with_journal(path)?;
    }

    let (source, destination) = ProviderManager::connect_pair(
        &settings.provider,
        settings.source_region.trim(),
        settings.destination_region.trim(),
    )
    .await?;
    let waits = settings.waits();
    let driver = TransitionDriver::new(
        RegionGateway::new(source, waits),
        RegionGateway::new(destination, waits),
        Arc::new(logger),
    );
    let coordinator = BatchCoordinator::new(driver, correlation_id);

    let report = match args.output {
        OutputFormat::Text => {
            let report = coordinator.migrate(batch, &ConsoleReporter::stdout()).await;
            print_summary(&report);
            report
        }
        OutputFormat::Json => {
            let report = coordinator.migrate(batch, &ConsoleReporter::stderr()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            report
        }
    };

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_summary(report: &MigrationReport) {
    for outcome in &report.outcomes {
        println!("{}", outcome.summary_line());
    }
    println!(
        "{} succeeded, {} failed ({} -> {})",
        report.succeeded(),
        report.failed(),
        report.source_region,
        report.destination_region
    );
}

async fn describe(args: DescribeArgs) -> Result<ExitCode> {
    let provider = ProviderManager::connect(&args.provider, args.region.trim()).await?;
    let gateway = RegionGateway::new(provider, Waits::default());
    let instance_id = InstanceId::new(args.instance_id.trim());
    let details = get_instance_details(&instance_id, &gateway).await?;
    println!(
        "{}: type={} state={}",
        instance_id, details.instance_type, details.state
    );
    Ok(ExitCode::SUCCESS)
}
