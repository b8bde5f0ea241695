//! One-shot full series sweep

use crate::config::Config;
use crate::state::SharedState;

use super::{ctrl_c_token, print_summary};

pub async fn cmd_sweep(config: Config, include_unmonitored: bool) -> anyhow::Result<()> {
    let state = SharedState::new(config, ctrl_c_token())?;
    let summary = state
        .sweeps
        .run_full_sweep(!include_unmonitored, &state.shutdown)
        .await?;

    print_summary("Full sweep", &summary);
    Ok(())
}
