mod collect;
mod expire;
mod find;
mod kubemodel;
mod pods;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use kube::Client;

#[derive(Parser)]
#[command(version, about = "Garbage collects terminal pods and expired labeled objects")]
struct Opts {
    /// Seconds to sleep between reconciliation cycles
    #[arg(long, default_value_t = 30)]
    interval: u64,
    /// Liveness sentinel written on successful startup
    #[arg(long, default_value = "/tmp/health")]
    health_file: PathBuf,
    /// Run a single cycle and exit, for CronJob-style deployments
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LOG_LEVEL", "info"))
        .init();
    let opts = Opts::parse();

    fs::write(&opts.health_file, "healthy").with_context(|| {
        format!(
            "failed to write health sentinel {}",
            opts.health_file.display()
        )
    })?;

    log::info!("creating kubernetes client");
    let client = Client::try_default()
        .await
        .context("failed to create kubernetes client")?;

    loop {
        pods::sweep_terminal(&client)
            .await
            .context("failed to retrieve pods")?;
        collect::run_cycle(&client).await?;

        if opts.once {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(opts.interval)) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("received shutdown signal");
                break;
            }
        }
    }
    Ok(())
}
