//! `appsweep catalog` – download the app list and merge it into catalog.json.

use anyhow::{anyhow, Context, Result};
use appsweep_core::catalog::Catalog;
use appsweep_core::config::SweepConfig;
use appsweep_core::retry::ThreadSleeper;
use appsweep_core::sink::FsSink;
use appsweep_core::transport::CurlTransport;
use std::path::Path;

pub async fn run_catalog(cfg: &SweepConfig, output_dir: &Path) -> Result<()> {
    let transport_settings = cfg.transport_settings();
    let output_dir = output_dir.to_path_buf();

    let (added, total) = tokio::task::spawn_blocking(move || -> Result<(usize, usize)> {
        let transport = CurlTransport::new(&transport_settings)?;
        let sink = FsSink::new(&output_dir);
        let entries = transport.fetch_catalog().context("fetching app list")?;
        tracing::info!(listed = entries.len(), "fetched app list");

        let mut catalog = Catalog::load(&sink)?;
        let added = catalog.merge(entries);
        catalog
            .save(&sink, &ThreadSleeper)
            .map_err(|w| anyhow!("{w}"))?;
        Ok((added, catalog.len()))
    })
    .await??;

    println!("Catalog: {added} new id(s), {total} total");
    Ok(())
}
