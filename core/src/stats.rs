//! Per-phase step timing

use std::fmt::Write as _;
use std::time::Duration;

/// Parts of one lockstep iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Encode,
    Send,
    Receive,
    Decode,
    Apply,
    Barrier,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Extract,
        Phase::Encode,
        Phase::Send,
        Phase::Receive,
        Phase::Decode,
        Phase::Apply,
        Phase::Barrier,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Extract => "Extracting border",
            Phase::Encode => "Encoding border frame",
            Phase::Send => "Sending border frame",
            Phase::Receive => "Receiving border frame",
            Phase::Decode => "Decoding border frame",
            Phase::Apply => "Applying partner border",
            Phase::Barrier => "Step barrier",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated time spent in one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub total: Duration,
    pub count: u32,
}

impl PhaseTiming {
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepStats {
    phases: [PhaseTiming; 7],
}

impl StepStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let timing = &mut self.phases[phase.index()];
        timing.total += elapsed;
        timing.count += 1;
    }

    pub fn timing(&self, phase: Phase) -> PhaseTiming {
        self.phases[phase.index()]
    }

    pub fn average(&self, phase: Phase) -> Duration {
        self.timing(phase).average()
    }

    /// One `name = seconds` line per phase, averaged over recorded steps
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for phase in Phase::ALL {
            let _ = writeln!(out, "{} = {:.6}", phase.name(), self.average(phase).as_secs_f64());
        }
        out
    }
}
