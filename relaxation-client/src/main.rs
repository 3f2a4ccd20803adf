use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use relaxation_client::{
    cli::{Cli, OutputFormat},
    codec::Codec,
    relaxation::ConvergenceLoop,
    report::{OutcomeKind, RunReport},
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.client_config().context("invalid configuration")?;

    info!(
        index = config.index,
        temperature = config.initial_temperature,
        server = %config.server,
        "starting external process"
    );

    let mut relaxation = ConvergenceLoop::new(config.index, config.initial_temperature);
    let result = relaxation
        .connect_and_run(config.server, Codec::new(config.byte_order))
        .await;
    if let Err(err) = &result {
        warn!(error = ?err, "exchange failed");
    }

    let report = RunReport::new(&relaxation, &result);
    emit_report(&report, cli.output).await?;

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn emit_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    let rendered = report.render(format).context("failed to render report")?;
    // Text-mode failures go to stderr; every JSON report stays on stdout.
    if format == OutputFormat::Text && report.outcome == OutcomeKind::Failed {
        write_line(&mut io::stderr(), &rendered).await?;
    } else {
        write_line(&mut io::stdout(), &rendered).await?;
    }
    Ok(())
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{line}\n").as_bytes()).await?;
    writer.flush().await
}
