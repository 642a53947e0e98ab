//! CLI command handlers. Each command is in its own file.

mod catalog;
mod retry_failed;
mod run;
mod status;

pub use catalog::run_catalog;
pub use retry_failed::run_retry_failed;
pub use run::{run_sweep, SweepOptions};
pub use status::run_status;

use appsweep_core::control::StopSignal;
use appsweep_core::pipeline::PipelineReport;

/// Stop signal that trips on the first Ctrl-C. The sweep then checkpoints and returns.
fn stop_on_ctrl_c() -> StopSignal {
    let stop = StopSignal::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current id...");
            signal.request_stop();
        }
    });
    stop
}

fn print_report(report: &PipelineReport) {
    let counts = report.run.counts();
    println!(
        "Processed {}/{}: {} succeeded, {} non-existent, {} failed",
        report.run.processed, report.run.total, counts.succeeded, counts.non_existent, counts.failed
    );
    if report.details_added > 0 {
        println!("  {} new detail record(s) stored", report.details_added);
    }
    for category in &report.exports.written {
        println!("  wrote {}", category.file_name());
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}
