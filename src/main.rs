//! # Fabric Bench - Main Entry Point
//!
//! Wires the pieces together: parse arguments, install logging, load the
//! immutable campaign configuration, build the SSH relay and artifact store,
//! and hand control to the campaign scheduler.
//!
//! ## Error handling
//!
//! Relay and configuration failures abort the process with a nonzero exit
//! through `anyhow::Result`. Per-run failures (unparseable client output,
//! artifact write errors) are contained inside the scheduler: they are
//! logged, counted as skipped, and the campaign continues.

use anyhow::Result;
use clap::Parser;
use fabric_bench::{
    campaign::CampaignRunner,
    cli::{Args, CampaignKind},
    config::CampaignConfig,
    logging,
    relay::SshRelay,
    results::ResultStore,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = CampaignConfig::load(&args.config)?;
    info!(
        "starting {} campaign: {} cases, stream levels {:?}, {}s per run",
        args.campaign,
        config.cases.len(),
        config.stream_levels,
        args.run_duration().as_secs()
    );

    let relay = SshRelay::new(config.bastion.clone(), config.endpoint_login.clone());
    let store = ResultStore::new(args.output_root());
    let output_root = store.root().to_path_buf();
    let runner = CampaignRunner::new(&config, &relay, store, args.run_duration());

    let summary = match args.campaign {
        CampaignKind::Steady => runner.run_steady().await?,
        CampaignKind::Fault => runner.run_fault().await?,
    };

    info!(
        "campaign complete: {} artifacts saved, {} runs skipped, results under {:?}",
        summary.completed, summary.skipped, output_root
    );
    Ok(())
}
