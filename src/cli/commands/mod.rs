mod check_link;
mod config;
mod sweep;
mod wanted;

pub use check_link::cmd_check_link;
pub use config::{cmd_config_init, cmd_config_show, masked};
pub use sweep::cmd_sweep;
pub use wanted::cmd_wanted;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Token cancelled on Ctrl+C so one-shot commands stop between items.
pub(crate) fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current item");
            cancel.cancel();
        }
    });
    token
}

pub(crate) fn print_summary(label: &str, summary: &crate::services::SweepSummary) {
    println!("{label}");
    println!("{:-<50}", "");
    println!("  Series processed:    {}", summary.series_processed);
    println!("  Movies processed:    {}", summary.movies_processed);
    println!("  Items processed:     {}", summary.items_processed);
    println!("  Valid links:         {}", summary.valid_links);
    println!("  Missing:             {}", summary.missing);
    println!("  Artifacts created:   {}", summary.artifacts_created);
    println!("  Rescans triggered:   {}", summary.rescans_triggered);
    println!("  Monitoring updates:  {}", summary.monitoring_updates);
    println!("  Errors:              {}", summary.errors);
    println!();
}
