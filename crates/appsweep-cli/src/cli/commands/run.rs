//! `appsweep run` – classify pending ids and export the outcome.

use anyhow::{bail, Result};
use appsweep_core::catalog::Catalog;
use appsweep_core::config::SweepConfig;
use appsweep_core::pipeline::Pipeline;
use appsweep_core::sink::FsSink;
use appsweep_core::transport::CurlTransport;
use appsweep_core::types::AppId;
use std::path::Path;

use super::{print_report, stop_on_ctrl_c};

#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub limit: Option<usize>,
    pub resume: bool,
    pub no_validate: bool,
    /// When non-empty, these ids are processed instead of the catalog plan.
    pub ids: Vec<AppId>,
}

pub async fn run_sweep(cfg: &SweepConfig, output_dir: &Path, opts: SweepOptions) -> Result<()> {
    let mut settings = cfg.orchestrator_settings()?;
    if opts.limit.is_some() {
        settings.limit = opts.limit;
    }
    if opts.no_validate {
        settings.validate_before_fetch = false;
    }
    let transport_settings = cfg.transport_settings();
    let output_dir = output_dir.to_path_buf();
    let stop = stop_on_ctrl_c();

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let transport = CurlTransport::new(&transport_settings)?;
        let sink = FsSink::new(&output_dir);
        let pipeline = Pipeline::new(settings, &transport, &sink)?.with_stop_signal(stop);

        let ids = if opts.ids.is_empty() {
            let catalog = Catalog::load(&sink)?;
            if catalog.is_empty() {
                bail!("catalog is empty; run `appsweep catalog` first");
            }
            let plan = pipeline.plan(&catalog)?;
            tracing::info!(
                pending = plan.pending.len(),
                already_fetched = plan.already_fetched,
                known_non_existent = plan.known_non_existent,
                "planned sweep"
            );
            plan.pending
        } else {
            opts.ids
        };
        if ids.is_empty() {
            return Ok(None);
        }
        Ok(Some(pipeline.run(&ids, opts.resume)?))
    })
    .await??;

    let Some(report) = report else {
        println!("Nothing to do: every catalog id is fetched or known missing.");
        return Ok(());
    };
    print_report(&report);
    if report.run.stopped {
        println!("Stopped early; continue with `appsweep run --resume`.");
    }
    Ok(())
}
