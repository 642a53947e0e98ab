//! `appsweep status` – summarize what is on disk in the output dir.

use anyhow::Result;
use appsweep_core::catalog::Catalog;
use appsweep_core::export::{load_failed_ids, DetailsStore, ExportCategory, NonExistentExport};
use appsweep_core::logging;
use appsweep_core::orchestrator::Checkpoint;
use appsweep_core::sink::FsSink;
use std::path::Path;

pub fn run_status(output_dir: &Path) -> Result<()> {
    let sink = FsSink::new(output_dir);
    let catalog = Catalog::load(&sink)?;
    let details = DetailsStore::load(&sink)?;
    let non_existent = NonExistentExport::load(&sink)?;

    println!("Output dir: {}", output_dir.display());
    println!("{:<28} {}", "catalog ids", catalog.len());
    println!("{:<28} {}", "fetched details", details.len());
    println!("{:<28} {}", "non-existent", non_existent.len());
    for category in ExportCategory::ALL {
        let ids = load_failed_ids(&sink, category)?;
        println!("{:<28} {}", category.file_name(), ids.len());
    }

    match Checkpoint::load(&sink)? {
        Some(cp) => {
            let state = if cp.finalized { "finished" } else { "interrupted" };
            println!(
                "Last run: {state}, {}/{} processed, updated {}",
                cp.processed, cp.total, cp.updated_at
            );
        }
        None => println!("Last run: none"),
    }
    if let Ok(path) = logging::log_path() {
        println!("Log: {}", path.display());
    }
    Ok(())
}
