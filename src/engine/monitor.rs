use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::{advance, BusyGuard, Phase, SolveEvent};
use crate::solver::LogTail;

/// Solver log phrases that mean the search is wrapping up.
const TERMINAL_PHRASES: [&str; 4] = [
    "time limit reached",
    "reached time limit",
    "exiting on maximum time",
    "stopping",
];

pub fn is_terminal_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    TERMINAL_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Polls the solver log and owns the event stream for one solve.
///
/// Holds the engine's busy flag until its final drain so a new solve cannot
/// truncate the log while this one is still being read.
pub(crate) struct Monitor {
    tail: LogTail,
    poll_interval: Duration,
    phase_tx: Arc<watch::Sender<Phase>>,
    phase_rx: watch::Receiver<Phase>,
    stop_rx: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<SolveEvent>,
    _guard: BusyGuard,
}

impl Monitor {
    pub(crate) fn new(
        log_path: impl Into<PathBuf>,
        poll_interval: Duration,
        phase_tx: Arc<watch::Sender<Phase>>,
        phase_rx: watch::Receiver<Phase>,
        stop_rx: watch::Receiver<bool>,
        events: mpsc::UnboundedSender<SolveEvent>,
        guard: BusyGuard,
    ) -> Self {
        Self {
            tail: LogTail::new(log_path),
            poll_interval,
            phase_tx,
            phase_rx,
            stop_rx,
            events,
            _guard: guard,
        }
    }

    fn emit(&self, event: SolveEvent) {
        // receiver gone means nobody is listening; keep draining anyway
        let _ = self.events.send(event);
    }

    async fn relay_lines(&mut self) {
        for line in self.tail.poll().await {
            if is_terminal_line(&line) {
                advance(&self.phase_tx, Phase::Stopping);
            }
            debug!(target: "solver", "{line}");
            self.emit(SolveEvent::Log(line));
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut phase = *self.phase_rx.borrow_and_update();
        let mut stop_open = true;
        if phase != Phase::Finished {
            self.emit(SolveEvent::Phase(phase));
        }

        while phase != Phase::Finished {
            tokio::select! {
                _ = ticker.tick() => self.relay_lines().await,
                changed = self.phase_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *self.phase_rx.borrow_and_update();
                    if next != phase && next != Phase::Finished {
                        self.emit(SolveEvent::Phase(next));
                    }
                    phase = next;
                }
                changed = self.stop_rx.changed(), if stop_open => {
                    stop_open = false;
                    if changed.is_ok() && *self.stop_rx.borrow() {
                        info!("stop requested; solver continues until its time limit");
                        advance(&self.phase_tx, Phase::Stopping);
                    }
                }
            }
        }

        self.relay_lines().await;
        if let Some(rest) = self.tail.flush() {
            self.emit(SolveEvent::Log(rest));
        }
        self.emit(SolveEvent::Phase(Phase::Finished));
    }
}
