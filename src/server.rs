use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode as HttpStatus;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::{Config, OptimizationConfig, SolverConfig};
use crate::domain::{build_camp, Camp};
use crate::engine::{
    AssignmentEngine, EngineError, Phase, SolveEvent, SolveHandle, SolveOutcome, StatusCode,
    StopHandle,
};
use crate::input::{CabinRow, CamperRow, SeatradeRow};
use crate::results::{AssignmentRecord, AssignmentSummary};

#[derive(Clone)]
struct ApiState {
    config: Config,
    engine: AssignmentEngine,
    run: Arc<RwLock<RunState>>,
}

#[derive(Default)]
struct RunState {
    generation: u64,
    phase: Option<Phase>,
    log: Vec<String>,
    camp: Option<Arc<Camp>>,
    outcome: Option<SolveOutcome>,
    stop: Option<StopHandle>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: HttpStatus,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: HttpStatus::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: HttpStatus::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: HttpStatus::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Busy => Self::conflict(err.to_string()),
            EngineError::Validation(_) | EngineError::Config(_) => Self::bad_request(err.to_string()),
            EngineError::Log(_) | EngineError::WorkerJoin(_) => Self::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    busy: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SolveRequest {
    seatrades: Vec<SeatradeRow>,
    campers: Vec<CamperRow>,
    #[serde(default)]
    cabins: Vec<CabinRow>,
    optimization: Option<OptimizationConfig>,
    solver: Option<SolverConfig>,
}

#[derive(Debug, Serialize)]
struct SolveStarted {
    started: bool,
    backend: &'static str,
    campers: usize,
    cabins: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StatusQuery {
    /// Skip this many log lines already seen by the caller.
    since: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SolveStatusResponse {
    status: StatusCode,
    running: bool,
    phase: Option<Phase>,
    log_offset: usize,
    log: Vec<String>,
    certified_optimal: bool,
    objective: Option<f64>,
    error: Option<String>,
    summary: Option<AssignmentSummary>,
    assignments: Option<Vec<AssignmentRecord>>,
}

#[derive(Debug, Serialize)]
struct StopResponse {
    requested: bool,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        config,
        engine: AssignmentEngine::with_default_solver(),
        run: Arc::new(RwLock::new(RunState::default())),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/solve", post(start_solve).get(solve_status))
        .route("/v1/solve/stop", post(stop_solve))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        backend: state.engine.backend(),
        busy: state.engine.is_busy(),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn start_solve(
    State(state): State<ApiState>,
    Json(request): Json<SolveRequest>,
) -> ApiResult<SolveStarted> {
    let camp = build_camp(&request.seatrades, &request.campers, &request.cabins)
        .map_err(EngineError::from)?;
    let camp = Arc::new(camp);
    let config = effective_config(&state.config, &request);

    let handle = state.engine.start(Arc::clone(&camp), &config)?;
    let generation = {
        let mut run = state.run.write().await;
        let generation = run.generation + 1;
        *run = RunState {
            generation,
            phase: Some(handle.phase()),
            camp: Some(Arc::clone(&camp)),
            stop: Some(handle.stop_handle()),
            ..RunState::default()
        };
        generation
    };
    tokio::spawn(drive(Arc::clone(&state.run), generation, handle));

    ok_result(SolveStarted {
        started: true,
        backend: state.engine.backend(),
        campers: camp.campers().len(),
        cabins: camp.cabins().len(),
    })
}

/// Folds one solve into the shared state. Writes stop once a newer solve has
/// taken over the state.
async fn drive(run: Arc<RwLock<RunState>>, generation: u64, mut handle: SolveHandle) {
    while let Some(event) = handle.next_event().await {
        let mut run = run.write().await;
        if run.generation != generation {
            continue;
        }
        match event {
            SolveEvent::Phase(phase) => run.phase = Some(phase),
            SolveEvent::Log(line) => run.log.push(line),
        }
    }
    let result = handle.wait().await;
    if let Err(err) = &result {
        warn!("solve worker failed: {err}");
    }
    let mut run = run.write().await;
    if run.generation != generation {
        return;
    }
    run.stop = None;
    match result {
        Ok(outcome) => run.outcome = Some(outcome),
        Err(err) => run.error = Some(err.to_string()),
    }
}

async fn solve_status(
    State(state): State<ApiState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<SolveStatusResponse> {
    let run = state.run.read().await;
    let since = query.since.unwrap_or(0).min(run.log.len());

    let code = match (&run.outcome, &run.error) {
        (Some(outcome), _) => outcome.code,
        (None, Some(_)) => StatusCode::Failed,
        (None, None) => StatusCode::NotSolved,
    };
    let table = run.outcome.as_ref().and_then(|o| o.table.as_ref());
    let summary = match (table, &run.camp) {
        (Some(table), Some(camp)) => Some(table.summary(camp)),
        _ => None,
    };

    ok_result(SolveStatusResponse {
        status: code,
        running: run.stop.is_some(),
        phase: run.phase,
        log_offset: run.log.len(),
        log: run.log[since..].to_vec(),
        certified_optimal: run.outcome.as_ref().is_some_and(|o| o.certified_optimal),
        objective: run.outcome.as_ref().and_then(|o| o.objective),
        error: run.error.clone(),
        summary,
        assignments: table.map(|t| t.assigned().cloned().collect()),
    })
}

async fn stop_solve(State(state): State<ApiState>) -> ApiResult<StopResponse> {
    let run = state.run.read().await;
    let requested = match &run.stop {
        Some(stop) => {
            stop.request();
            true
        }
        None => false,
    };
    ok_result(StopResponse { requested })
}

fn effective_config(base: &Config, request: &SolveRequest) -> Config {
    let mut config = base.clone();
    if let Some(optimization) = &request.optimization {
        config.optimization = optimization.clone();
    }
    if let Some(solver) = &request.solver {
        config.solver = solver.clone();
    }
    config
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn ok_result<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ok(data))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn request() -> SolveRequest {
        serde_json::from_value(serde_json::json!({
            "seatrades": [
                {"seatrade": "S1", "campers_min": 1, "campers_max": 2},
                {"seatrade": "S2", "campers_min": 1, "campers_max": 2}
            ],
            "campers": [
                {"camper": "c1", "cabin": "A", "gender": "f", "preferences": ["S1", "S2"]},
                {"camper": "c2", "cabin": "A", "gender": "f", "preferences": ["S2", "S1"]},
                {"camper": "c3", "cabin": "B", "gender": "m", "preferences": ["S1", "S2"]},
                {"camper": "c4", "cabin": "B", "gender": "m", "preferences": ["S2", "S1"]}
            ],
            "solver": {"time_limit_secs": 5}
        }))
        .expect("request json")
    }

    fn state(name: &str) -> ApiState {
        let mut config = Config::default();
        config.engine.log_path = std::env::temp_dir()
            .join(format!("seatrade-server-{name}-{}.log", std::process::id()))
            .to_string_lossy()
            .into_owned();
        config.engine.poll_interval_ms = 20;
        ApiState {
            config,
            engine: AssignmentEngine::with_default_solver(),
            run: Arc::new(RwLock::new(RunState::default())),
        }
    }

    #[test]
    fn request_overrides_only_given_sections() {
        let base = Config::default();
        let config = effective_config(&base, &request());
        assert_eq!(config.solver.time_limit_secs, 5);
        assert!((config.solver.relative_gap - 0.1).abs() < 1e-12);
        assert_eq!(config.optimization, base.optimization);
    }

    #[test]
    fn engine_errors_map_to_http_status() {
        assert_eq!(ApiError::from(EngineError::Busy).status, HttpStatus::CONFLICT);
        let invalid = build_camp(&[], &[], &[]).expect_err("empty input");
        assert_eq!(
            ApiError::from(EngineError::from(invalid)).status,
            HttpStatus::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn solve_then_poll_until_solved() {
        let state = state("poll");
        let Json(started) = start_solve(State(state.clone()), Json(request()))
            .await
            .expect("solve started");
        assert!(started.data.started);

        let mut status = StatusCode::NotSolved;
        for _ in 0..500 {
            let Json(resp) = solve_status(State(state.clone()), Query(StatusQuery::default()))
                .await
                .expect("status");
            status = resp.data.status;
            if status != StatusCode::NotSolved {
                assert_eq!(resp.data.assignments.map(|a| a.len()), Some(8));
                assert!(!resp.data.log.is_empty());
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(status, StatusCode::Solved);
    }

    #[tokio::test]
    async fn superseded_solve_leaves_newer_state_alone() {
        let state = state("superseded");
        let camp = Arc::new(build_camp(&request().seatrades, &request().campers, &[]).expect("camp"));
        let handle = state
            .engine
            .start(Arc::clone(&camp), &state.config)
            .expect("start");
        let stop = handle.stop_handle();
        {
            let mut run = state.run.write().await;
            *run = RunState {
                generation: 2,
                phase: Some(Phase::Building),
                stop: Some(stop),
                ..RunState::default()
            };
        }

        drive(Arc::clone(&state.run), 1, handle).await;

        let Json(resp) = solve_status(State(state.clone()), Query(StatusQuery::default()))
            .await
            .expect("status");
        assert_eq!(resp.data.status, StatusCode::NotSolved);
        assert!(resp.data.running);
        assert_eq!(resp.data.phase, Some(Phase::Building));
        assert!(resp.data.log.is_empty());
        assert!(resp.data.assignments.is_none());
    }

    #[tokio::test]
    async fn current_solve_records_its_outcome() {
        let state = state("current");
        let camp = Arc::new(build_camp(&request().seatrades, &request().campers, &[]).expect("camp"));
        let handle = state
            .engine
            .start(Arc::clone(&camp), &state.config)
            .expect("start");
        {
            let mut run = state.run.write().await;
            run.generation = 1;
            run.camp = Some(camp);
            run.stop = Some(handle.stop_handle());
        }

        drive(Arc::clone(&state.run), 1, handle).await;

        let run = state.run.read().await;
        assert!(run.stop.is_none());
        assert_eq!(run.phase, Some(Phase::Finished));
        assert_eq!(run.outcome.as_ref().map(|o| o.code), Some(StatusCode::Solved));
    }
}
