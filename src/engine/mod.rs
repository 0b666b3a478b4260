pub mod monitor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::domain::{Camp, ValidationErrors};
use crate::model::{build_model, ModelStats};
use crate::results::{interpret, AssignmentTable};
use crate::solver::{GoodLpSolver, MilpSolver, SolverLog, SolverStatus};

use monitor::Monitor;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a solve is already in progress")]
    Busy,
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed resetting solver log: {0}")]
    Log(#[from] std::io::Error),
    #[error("solver worker failed: {0}")]
    WorkerJoin(#[from] tokio::task::JoinError),
}

/// Externally visible progress of one solve. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Building,
    Optimizing,
    Stopping,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SolveEvent {
    Phase(Phase),
    Log(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    NotSolved = 0,
    Solved = 1,
    Failed = -1,
}

impl StatusCode {
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.as_i8())
    }
}

impl From<&SolverStatus> for StatusCode {
    fn from(status: &SolverStatus) -> Self {
        if status.has_solution() {
            Self::Solved
        } else {
            Self::Failed
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub status: SolverStatus,
    pub code: StatusCode,
    /// Optimal within the configured relative gap.
    pub certified_optimal: bool,
    pub objective: Option<f64>,
    pub table: Option<AssignmentTable>,
    pub backend: &'static str,
    pub model_stats: ModelStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub(crate) fn advance(phase: &watch::Sender<Phase>, next: Phase) -> bool {
    phase.send_if_modified(|current| {
        if next > *current {
            *current = next;
            true
        } else {
            false
        }
    })
}

pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Marks the solve finished when the worker exits, panics included.
struct FinishOnDrop(Arc<watch::Sender<Phase>>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        advance(&self.0, Phase::Finished);
    }
}

#[derive(Clone)]
pub struct AssignmentEngine {
    solver: Arc<dyn MilpSolver>,
    busy: Arc<AtomicBool>,
}

impl AssignmentEngine {
    pub fn new(solver: Arc<dyn MilpSolver>) -> Self {
        Self {
            solver,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_default_solver() -> Self {
        Self::new(Arc::new(GoodLpSolver))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn backend(&self) -> &'static str {
        self.solver.name()
    }

    /// Starts a solve in the background. Must be called inside a tokio runtime.
    pub fn start(&self, camp: Arc<Camp>, config: &Config) -> Result<SolveHandle, EngineError> {
        config.validate()?;
        let guard = BusyGuard::try_acquire(&self.busy).ok_or(EngineError::Busy)?;

        let log = SolverLog::new(config.resolved_log_path());
        log.reset()?;

        let (phase_tx, phase_rx) = watch::channel(Phase::Building);
        let phase_tx = Arc::new(phase_tx);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            campers = camp.campers().len(),
            cabins = camp.cabins().len(),
            seatrades = camp.seatrades().len(),
            backend = self.solver.name(),
            "starting assignment solve"
        );

        let monitor = Monitor::new(
            log.path(),
            config.engine.poll_interval(),
            Arc::clone(&phase_tx),
            phase_rx.clone(),
            stop_rx,
            events_tx,
            guard,
        );
        let monitor = tokio::spawn(monitor.run());

        let solver = Arc::clone(&self.solver);
        let config = config.clone();
        let worker = tokio::task::spawn_blocking(move || {
            run_worker(camp.as_ref(), &config, solver.as_ref(), &log, phase_tx)
        });

        Ok(SolveHandle {
            phase: phase_rx,
            stop: StopHandle(Arc::new(stop_tx)),
            events: events_rx,
            worker,
            monitor,
        })
    }

    pub async fn solve(&self, camp: Arc<Camp>, config: &Config) -> Result<SolveOutcome, EngineError> {
        self.start(camp, config)?.wait().await
    }
}

fn run_worker(
    camp: &Camp,
    config: &Config,
    solver: &dyn MilpSolver,
    log: &SolverLog,
    phase: Arc<watch::Sender<Phase>>,
) -> SolveOutcome {
    let _finish = FinishOnDrop(Arc::clone(&phase));
    let started_at = Utc::now();

    log.append("Building assignment model");
    let built = build_model(camp, &config.optimization);
    let model_stats = built.stats();
    log.append(format!(
        "Model ready: {} variables, {} constraints",
        model_stats.variables, model_stats.rows
    ));

    advance(&phase, Phase::Optimizing);
    let run = solver.solve(&built.model, &config.solver.limits(), log);

    // interpretation waits for a terminal status; nothing partial leaks out
    let table = run
        .status
        .has_solution()
        .then(|| interpret(camp, &built.layout, &run.values));
    let code = StatusCode::from(&run.status);
    match code {
        StatusCode::Solved => info!(objective = ?run.objective, "assignment solved"),
        _ => warn!(status = ?run.status, "assignment solve failed"),
    }

    SolveOutcome {
        certified_optimal: run.status == SolverStatus::Optimal,
        code,
        status: run.status,
        objective: run.objective,
        table,
        backend: solver.name(),
        model_stats,
        started_at,
        finished_at: Utc::now(),
    }
}

#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn request(&self) {
        self.0.send_replace(true);
    }
}

pub struct SolveHandle {
    phase: watch::Receiver<Phase>,
    stop: StopHandle,
    events: mpsc::UnboundedReceiver<SolveEvent>,
    worker: JoinHandle<SolveOutcome>,
    monitor: JoinHandle<()>,
}

impl SolveHandle {
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Reports the solve as stopping. The solver itself runs on until its
    /// time limit; there is no hard cancellation.
    pub fn request_stop(&self) {
        self.stop.request();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn next_event(&mut self) -> Option<SolveEvent> {
        self.events.recv().await
    }

    pub fn take_events(&mut self) -> Vec<SolveEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn wait(self) -> Result<SolveOutcome, EngineError> {
        let outcome = self.worker.await?;
        if let Err(err) = self.monitor.await {
            warn!("solve monitor ended abnormally: {err}");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build_camp;
    use crate::input::{CamperRow, SeatradeRow};
    use crate::model::builder::tests::small_camp;

    fn scratch_config(name: &str) -> Config {
        let mut config = Config::default();
        config.engine.log_path = std::env::temp_dir()
            .join(format!("seatrade-engine-{name}-{}.log", std::process::id()))
            .to_string_lossy()
            .into_owned();
        config.engine.poll_interval_ms = 20;
        config.solver.relative_gap = 0.0;
        config
    }

    fn seatrade(id: &str, min: i64, max: i64) -> SeatradeRow {
        SeatradeRow {
            seatrade_id: id.to_string(),
            min_capacity: min,
            max_capacity: max,
        }
    }

    fn camper(id: &str, cabin: &str, gender: &str, prefs: &[&str]) -> CamperRow {
        CamperRow {
            camper_id: id.to_string(),
            cabin_id: cabin.to_string(),
            gender: gender.to_string(),
            preferences: prefs.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn solves_two_cabin_camp() {
        let camp = Arc::new(small_camp());
        let config = scratch_config("two-cabin");
        let engine = AssignmentEngine::with_default_solver();
        let outcome = engine.solve(Arc::clone(&camp), &config).await.expect("solve");

        assert_eq!(outcome.code, StatusCode::Solved);
        assert!(outcome.certified_optimal);
        let table = outcome.table.expect("assignment table");
        let summary = table.summary(&camp);
        assert_eq!(summary.assignments, 8);
        assert_eq!(summary.unranked, 0);
        // four campers, four block-one instances with min 1: one camper each
        assert!(summary.instances.iter().all(|fill| fill.assigned == 1));
        assert!(table
            .assigned()
            .all(|r| (1..=2).contains(&r.preference_rank)));

        // each cabin sits wholly in one fleet per block
        for (cabin, campers) in table.by_cabin() {
            for block in crate::domain::Block::ALL {
                let fleets = campers
                    .values()
                    .flatten()
                    .filter(|p| p.block == block)
                    .map(|p| p.fleet)
                    .collect::<std::collections::BTreeSet<_>>();
                assert_eq!(fleets.len(), 1, "cabin {cabin} split in block {block}");
            }
        }
        assert!(!engine.is_busy());
    }

    #[test]
    fn oversubscribed_seatrade_fails() {
        let seatrades = vec![seatrade("S1", 0, 2), seatrade("S2", 0, 2)];
        let campers = vec![
            camper("c1", "A", "f", &["S1"]),
            camper("c2", "A", "f", &["S1"]),
            camper("c3", "A", "f", &["S1"]),
        ];
        let camp = Arc::new(build_camp(&seatrades, &campers, &[]).expect("valid camp"));
        let config = scratch_config("infeasible");
        let engine = AssignmentEngine::with_default_solver();

        let outcome = tokio_test::block_on(engine.solve(camp, &config)).expect("solve");
        assert_eq!(outcome.code, StatusCode::Failed);
        assert_eq!(outcome.code.as_i8(), -1);
        assert_eq!(outcome.status, SolverStatus::Infeasible);
        assert!(outcome.table.is_none());
        assert_eq!(serde_json::to_value(outcome.code).expect("json"), -1);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_busy() {
        let camp = Arc::new(small_camp());
        let config = scratch_config("busy");
        let engine = AssignmentEngine::with_default_solver();

        let first = engine.start(Arc::clone(&camp), &config).expect("first start");
        assert!(engine.is_busy());
        assert!(matches!(
            engine.start(Arc::clone(&camp), &config),
            Err(EngineError::Busy)
        ));

        first.wait().await.expect("first solve");
        let again = engine.start(camp, &config).expect("engine free again");
        again.wait().await.expect("second solve");
    }

    #[tokio::test]
    async fn relays_log_lines_and_finishes_last() {
        let camp = Arc::new(small_camp());
        let config = scratch_config("events");
        let engine = AssignmentEngine::with_default_solver();
        let mut handle = engine.start(camp, &config).expect("start");

        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        assert_eq!(handle.phase(), Phase::Finished);
        handle.wait().await.expect("outcome");

        assert!(matches!(events.first(), Some(SolveEvent::Phase(_))));
        assert_eq!(events.last(), Some(&SolveEvent::Phase(Phase::Finished)));
        assert!(events
            .iter()
            .any(|e| matches!(e, SolveEvent::Log(line) if line.contains("Model ready"))));
    }

    #[tokio::test]
    async fn invalid_config_never_starts() {
        let mut config = scratch_config("bad-config");
        config.solver.relative_gap = 2.0;
        let engine = AssignmentEngine::with_default_solver();
        let err = engine
            .start(Arc::new(small_camp()), &config)
            .err()
            .expect("config rejected");
        assert!(matches!(err, EngineError::Config(ConfigError::GapOutOfRange(_))));
        assert!(!engine.is_busy());
    }

    #[tokio::test]
    async fn cohesion_weight_concentrates_cabins() {
        let seatrades = vec![
            seatrade("S1", 0, 2),
            seatrade("S2", 0, 2),
            seatrade("S3", 0, 2),
        ];
        // best picks are {S1, S2} and {S3, S2}: at least three activations
        let campers = vec![
            camper("c1", "A", "f", &["S1", "S2", "S3"]),
            camper("c2", "A", "f", &["S3", "S2", "S1"]),
        ];
        let camp = Arc::new(build_camp(&seatrades, &campers, &[]).expect("valid camp"));
        let engine = AssignmentEngine::with_default_solver();

        let mut loose = scratch_config("cohesion-loose");
        loose.optimization.cabins_weight = None;
        loose.optimization.sparsity_weight = None;
        let mut tight = scratch_config("cohesion-tight");
        tight.optimization.cabins_weight = Some(50.0);
        tight.optimization.sparsity_weight = None;

        let activations = |outcome: SolveOutcome| {
            outcome
                .table
                .expect("assignment table")
                .summary(&camp)
                .cabin_activations
        };
        let without = activations(engine.solve(Arc::clone(&camp), &loose).await.expect("solve"));
        let with = activations(engine.solve(Arc::clone(&camp), &tight).await.expect("solve"));
        assert!(without >= 3, "{without}");
        assert_eq!(with, 2);
    }

    #[tokio::test]
    async fn favourite_seatrade_is_not_repeated() {
        let seatrades = vec![
            seatrade("S1", 0, 4),
            seatrade("S2", 0, 4),
            seatrade("S3", 0, 4),
        ];
        let campers = vec![
            camper("c1", "A", "f", &["S1", "S2", "S3"]),
            camper("c2", "A", "f", &["S1", "S3", "S2"]),
        ];
        let camp = Arc::new(build_camp(&seatrades, &campers, &[]).expect("valid camp"));
        let engine = AssignmentEngine::with_default_solver();
        let outcome = engine
            .solve(Arc::clone(&camp), &scratch_config("no-repeat"))
            .await
            .expect("solve");

        let table = outcome.table.expect("assignment table");
        for (camper, placements) in table.by_cabin().into_values().flatten() {
            let seatrades = placements
                .iter()
                .map(|p| p.seatrade.as_str())
                .collect::<std::collections::BTreeSet<_>>();
            assert_eq!(seatrades.len(), 2, "{camper} repeated a seatrade");
            assert!(seatrades.contains("S1"));
        }
    }

    #[tokio::test]
    async fn unwritable_log_never_starts() {
        let blocker = std::env::temp_dir().join(format!("seatrade-engine-blocker-{}", std::process::id()));
        std::fs::write(&blocker, "not a directory").expect("blocker file");
        let mut config = scratch_config("unwritable");
        config.engine.log_path = blocker.join("solve.log").to_string_lossy().into_owned();

        let engine = AssignmentEngine::with_default_solver();
        let err = engine
            .start(Arc::new(small_camp()), &config)
            .err()
            .expect("log reset rejected");
        assert!(matches!(err, EngineError::Log(_)));
        assert!(!engine.is_busy());
        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn phase_only_moves_forward() {
        let (tx, rx) = watch::channel(Phase::Building);
        assert!(advance(&tx, Phase::Stopping));
        assert!(!advance(&tx, Phase::Optimizing));
        assert!(advance(&tx, Phase::Finished));
        assert!(!advance(&tx, Phase::Stopping));
        assert_eq!(*rx.borrow(), Phase::Finished);
    }
}
