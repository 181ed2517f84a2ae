//! High-level entry point that brings a peer up and runs it to completion

use crate::grid::GridEdges;
use crate::stats::StepStats;
use crate::sync::{establish, StepCoordinator, StopSignal};
use crate::{Config, Error, Result};

/// How a session ended once the link was up
pub struct RunOutcome<G> {
    pub grid: G,
    pub steps: u64,
    pub stats: StepStats,
    /// `Err` if the session ended on a protocol or stream failure
    pub result: Result<()>,
}

/// Connect to the partner and step until stopped, `config.max_steps`, or a
/// session error.
///
/// Setup failures are returned as `Err`. Session failures are reported in
/// [`RunOutcome::result`] so the stats gathered so far are not lost. A stop
/// during setup abandons the link and returns the grid untouched.
pub async fn run_peer<G: GridEdges>(config: &Config, grid: G, mut stop: StopSignal) -> Result<RunOutcome<G>> {
    if grid.width() != config.grid_width || grid.height() != config.grid_height {
        return Err(Error::Config(format!(
            "grid is {}x{} but the session expects {}x{}",
            grid.width(),
            grid.height(),
            config.grid_width,
            config.grid_height
        )));
    }

    let session = tokio::select! {
        biased;
        _ = stop.stopped() => {
            tracing::info!("stop requested before the link came up");
            return Ok(RunOutcome {
                grid,
                steps: 0,
                stats: StepStats::new(),
                result: Ok(()),
            });
        }
        session = establish(config) => session?,
    };
    let mut coordinator = StepCoordinator::new(session, grid)?;

    tracing::info!(
        "{} peer stepping {}x{} grid",
        config.role,
        config.grid_width,
        config.grid_height
    );
    let result = coordinator.run(stop, config.max_steps).await.map(|_| ());

    let steps = coordinator.steps_completed();
    let stats = coordinator.stats().clone();
    Ok(RunOutcome {
        grid: coordinator.into_grid(),
        steps,
        stats,
        result,
    })
}
