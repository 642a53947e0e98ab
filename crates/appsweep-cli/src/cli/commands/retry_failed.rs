//! `appsweep retry-failed` – rerun failed ids in rounds until none remain.

use anyhow::Result;
use appsweep_core::config::SweepConfig;
use appsweep_core::pipeline::Pipeline;
use appsweep_core::sink::FsSink;
use appsweep_core::transport::CurlTransport;
use std::path::Path;
use std::time::Duration;

use super::{print_report, stop_on_ctrl_c};

pub async fn run_retry_failed(
    cfg: &SweepConfig,
    output_dir: &Path,
    max_rounds: u32,
    round_pause_secs: u64,
) -> Result<()> {
    let settings = cfg.orchestrator_settings()?;
    let transport_settings = cfg.transport_settings();
    let output_dir = output_dir.to_path_buf();
    let stop = stop_on_ctrl_c();

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let transport = CurlTransport::new(&transport_settings)?;
        let sink = FsSink::new(&output_dir);
        let pipeline = Pipeline::new(settings, &transport, &sink)?.with_stop_signal(stop);
        Ok(pipeline.retry_failed(max_rounds, Duration::from_secs(round_pause_secs))?)
    })
    .await??;

    if report.rounds.is_empty() && report.remaining.is_empty() {
        println!("No failed ids to retry.");
        return Ok(());
    }
    for (i, round) in report.rounds.iter().enumerate() {
        println!("Round {}:", i + 1);
        print_report(round);
    }
    if report.remaining.is_empty() {
        println!("All failed ids recovered.");
    } else {
        println!(
            "{} id(s) still failed after {} round(s).",
            report.remaining.len(),
            report.rounds.len()
        );
    }
    if report.stopped {
        println!("Stopped early.");
    }
    Ok(())
}
