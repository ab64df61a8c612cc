//! Fixed-timestep driver.
//!
//! Display frames arrive at an irregular rate; the world only ever advances
//! in fixed steps. The driver turns frame deltas into a number of sub-steps
//! and carries the remainder over to the next frame.

use crate::config::SandboxConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Assets not ready yet; nothing is simulated.
    Idle,
    Running,
    Paused,
}

/// Outcome of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub substeps: u32,
    /// Accumulated time left for the next frame.
    pub remainder: f32,
}

#[derive(Debug, Clone)]
pub struct StepDriver {
    state: SimState,
    accumulator: f32,
    fixed_dt: f32,
    max_frame_delta: f32,
    max_substeps: u32,
}

impl StepDriver {
    pub fn new(fixed_dt: f32, max_frame_delta: f32, max_substeps: u32) -> Self {
        Self {
            state: SimState::Idle,
            accumulator: 0.0,
            fixed_dt,
            max_frame_delta,
            max_substeps,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(config.fixed_dt, config.max_frame_delta, config.max_substeps)
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn is_running(&self) -> bool {
        self.state == SimState::Running
    }

    /// Leaves `Idle` once assets are ready. No-op in any other state.
    pub fn start(&mut self) {
        if self.state == SimState::Idle {
            self.state = SimState::Running;
            self.accumulator = 0.0;
        }
    }

    pub fn pause(&mut self) {
        if self.state == SimState::Running {
            self.state = SimState::Paused;
        }
    }

    /// Resumes with an empty accumulator, so time spent paused is not replayed.
    pub fn resume(&mut self) {
        if self.state == SimState::Paused {
            self.state = SimState::Running;
            self.accumulator = 0.0;
        }
    }

    /// Flips between running and paused. Returns the new state.
    pub fn toggle(&mut self) -> SimState {
        match self.state {
            SimState::Running => self.pause(),
            SimState::Paused => self.resume(),
            SimState::Idle => {}
        }
        self.state
    }

    /// Consumes one frame delta and returns how many fixed steps to run.
    pub fn advance(&mut self, delta: f32) -> StepReport {
        if self.state != SimState::Running {
            return StepReport {
                substeps: 0,
                remainder: self.accumulator,
            };
        }

        // max() also maps NaN to zero.
        self.accumulator += delta.max(0.0).min(self.max_frame_delta);

        let mut substeps = 0;
        while self.accumulator >= self.fixed_dt && substeps < self.max_substeps {
            self.accumulator -= self.fixed_dt;
            substeps += 1;
        }

        StepReport {
            substeps,
            remainder: self.accumulator,
        }
    }
}
