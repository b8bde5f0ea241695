//! One-shot wanted/missing sweep

use crate::config::Config;
use crate::state::SharedState;

use super::{ctrl_c_token, print_summary};

pub async fn cmd_wanted(config: Config) -> anyhow::Result<()> {
    let state = SharedState::new(config, ctrl_c_token())?;
    let summary = state.sweeps.run_wanted(&state.shutdown).await?;

    print_summary("Wanted episodes", &summary.episodes);
    match &summary.movies {
        Some(movies) => print_summary("Wanted movies", movies),
        None => println!("Movies: Radarr not enabled"),
    }
    Ok(())
}
