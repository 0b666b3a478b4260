pub mod backend;
pub mod log;

use std::time::Duration;

use serde::Serialize;

use crate::model::LinearModel;

pub use backend::GoodLpSolver;
pub use log::{LogTail, SolverLog};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolveLimits {
    pub time_limit: Duration,
    pub relative_gap: f64,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            relative_gap: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SolverStatus {
    Optimal,
    /// Stopped by the time limit with an incumbent in hand.
    FeasibleAtTimeout,
    Infeasible,
    Unbounded,
    NotSolved(String),
}

impl SolverStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, Self::Optimal | Self::FeasibleAtTimeout)
    }
}

#[derive(Debug, Clone)]
pub struct SolverRun {
    pub status: SolverStatus,
    pub values: Vec<f64>,
    pub objective: Option<f64>,
    pub elapsed: Duration,
}

/// A MILP backend. Implementations block the calling thread until done.
pub trait MilpSolver: Send + Sync {
    fn name(&self) -> &'static str;
    fn solve(&self, model: &LinearModel, limits: &SolveLimits, log: &SolverLog) -> SolverRun;
}
