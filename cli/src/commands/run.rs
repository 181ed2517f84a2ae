//! Run command implementation.

use anyhow::Context;
use borderlink_core::{stop_signal, Config, Grid, Role, StepStats};

use crate::args::RunArgs;
use crate::ui::{print_banner, print_session};

/// Run one peer until Ctrl+C, the step limit, or a session failure.
pub async fn run_session(config: Config, args: RunArgs) -> anyhow::Result<()> {
    print_banner();
    print_session(&config);

    let seed = args.seed.unwrap_or(match config.role {
        Role::Left => 1,
        Role::Right => 2,
    });
    let grid = Grid::seeded(config.grid_width, config.grid_height, seed);

    // Handle Ctrl+C gracefully
    let (handle, signal) = stop_signal();
    ctrlc::set_handler(move || handle.stop())?;

    println!("\n\x1b[1;33mWaiting for {} peer...\x1b[0m", config.role.partner());
    println!("\x1b[2mPress Ctrl+C to stop.\x1b[0m\n");

    let outcome = borderlink_core::run_peer(&config, grid, signal)
        .await
        .context("failed to set up peer link")?;

    println!("\n\x1b[1;32m✓\x1b[0m Completed {} step(s)", outcome.steps);
    println!("\x1b[1mLive cells:\x1b[0m {}", outcome.grid.live_cells());
    print!("{}", outcome.stats.summary());

    if let Some(path) = &args.stats_file {
        write_stats(path, &outcome.stats)?;
    }

    outcome.result.context("session ended with an error")?;
    Ok(())
}

fn write_stats(path: &std::path::Path, stats: &StepStats) -> anyhow::Result<()> {
    std::fs::write(path, stats.summary())
        .with_context(|| format!("failed to write stats to {}", path.display()))?;
    tracing::info!("wrote step timings to {}", path.display());
    Ok(())
}
