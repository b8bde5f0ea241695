//! Minute-resolution scheduler for the sweep cadences.
//!
//! One poll loop owns the decision to launch. Each run is a detached task that
//! reports back over a channel; the [`ScheduleBook`] makes the due check and
//! the in-flight flag one atomic step so a cadence never runs twice at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::sweep::{SweepError, SweepService};

pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceId {
    FullSweep,
    WantedSweep,
}

impl CadenceId {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullSweep => "full_sweep",
            Self::WantedSweep => "wanted_sweep",
        }
    }
}

impl fmt::Display for CadenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a cadence fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Every `minutes` after the previous completed run (minimum 1).
    Interval { minutes: u32 },
    /// Once per hour when the clock reaches `minute`.
    HourlyAt { minute: u32 },
    /// Once per day at `hour:minute`.
    DailyAt { hour: u32, minute: u32 },
}

impl Trigger {
    #[must_use]
    pub fn is_due(&self, now: DateTime<Local>, state: &CadenceState) -> bool {
        match *self {
            Self::Interval { minutes } => state.last_run.is_none_or(|last| {
                now.signed_duration_since(last)
                    >= chrono::Duration::minutes(i64::from(minutes.max(1)))
            }),
            Self::HourlyAt { minute } => {
                now.minute() == minute
                    && state.last_started.is_none_or(|last| {
                        last.date_naive() != now.date_naive() || last.hour() != now.hour()
                    })
            }
            Self::DailyAt { hour, minute } => {
                now.hour() == hour
                    && now.minute() == minute
                    && state
                        .last_started
                        .is_none_or(|last| last.date_naive() != now.date_naive())
            }
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { minutes } => write!(f, "every {minutes}m"),
            Self::HourlyAt { minute } => write!(f, "hourly at :{minute:02}"),
            Self::DailyAt { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl<T> From<&Result<T, SweepError>> for RunOutcome {
    fn from(result: &Result<T, SweepError>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(SweepError::Cancelled) => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CadenceState {
    pub last_run: Option<DateTime<Local>>,
    pub last_started: Option<DateTime<Local>>,
    pub in_flight: bool,
    pub last_outcome: Option<RunOutcome>,
}

/// Per-cadence state. Lives only in memory; a restart starts empty.
#[derive(Debug, Default)]
pub struct ScheduleBook {
    states: Mutex<HashMap<CadenceId, CadenceState>>,
}

impl ScheduleBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` in flight if it is idle and `due` agrees, in one step.
    pub fn try_begin(
        &self,
        id: CadenceId,
        now: DateTime<Local>,
        due: impl FnOnce(&CadenceState) -> bool,
    ) -> bool {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(id).or_default();
        if state.in_flight || !due(state) {
            return false;
        }
        state.in_flight = true;
        state.last_started = Some(now);
        true
    }

    /// Clears the in-flight flag. A cancelled run does not count as a run.
    pub fn complete(&self, id: CadenceId, outcome: RunOutcome, now: DateTime<Local>) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(id).or_default();
        state.in_flight = false;
        state.last_outcome = Some(outcome);
        if outcome != RunOutcome::Cancelled {
            state.last_run = Some(now);
        }
    }

    #[must_use]
    pub fn state(&self, id: CadenceId) -> CadenceState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<(CadenceId, CadenceState)> {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = states.iter().map(|(id, s)| (*id, s.clone())).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

/// Executes one run of a cadence.
#[async_trait]
pub trait CadenceRunner: Send + Sync {
    async fn run(&self, cadence: CadenceId, token: &CancellationToken) -> RunOutcome;
}

/// Runs the real sweeps.
pub struct SweepRunner {
    sweeps: Arc<SweepService>,
    only_monitored: bool,
}

impl SweepRunner {
    #[must_use]
    pub const fn new(sweeps: Arc<SweepService>, only_monitored: bool) -> Self {
        Self {
            sweeps,
            only_monitored,
        }
    }
}

#[async_trait]
impl CadenceRunner for SweepRunner {
    async fn run(&self, cadence: CadenceId, token: &CancellationToken) -> RunOutcome {
        match cadence {
            CadenceId::FullSweep => {
                RunOutcome::from(&self.sweeps.run_full_sweep(self.only_monitored, token).await)
            }
            CadenceId::WantedSweep => RunOutcome::from(&self.sweeps.run_wanted(token).await),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub id: CadenceId,
    pub enabled: bool,
    pub trigger: Trigger,
    pub run_on_startup: bool,
}

pub struct Scheduler {
    cadences: Vec<Cadence>,
    runner: Arc<dyn CadenceRunner>,
    book: Arc<ScheduleBook>,
    clock: Clock,
    poll_interval: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(cadences: Vec<Cadence>, runner: Arc<dyn CadenceRunner>, book: Arc<ScheduleBook>) -> Self {
        Self {
            cadences,
            runner,
            book,
            clock: Arc::new(Local::now),
            poll_interval: crate::constants::scheduler::POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn book(&self) -> Arc<ScheduleBook> {
        Arc::clone(&self.book)
    }

    /// Polls until `token` is cancelled, then waits for running sweeps to
    /// observe the cancellation and report back.
    pub async fn run(self, token: CancellationToken) {
        for cadence in &self.cadences {
            info!(
                cadence = %cadence.id,
                enabled = cadence.enabled,
                trigger = %cadence.trigger,
                run_on_startup = cadence.run_on_startup,
                "Cadence configured"
            );
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(CadenceId, RunOutcome)>();
        let mut running = 0usize;

        let now = (self.clock)();
        for cadence in self.cadences.iter().filter(|c| c.enabled && c.run_on_startup) {
            if self.book.try_begin(cadence.id, now, |_| true) {
                info!(event = "job_started", job_name = cadence.id.as_str(), "Running startup sweep");
                self.launch(cadence.id, &tx, &token);
                running += 1;
            }
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                Some((id, outcome)) = rx.recv() => {
                    running = running.saturating_sub(1);
                    self.book.complete(id, outcome, (self.clock)());
                    info!(event = "job_finished", job_name = id.as_str(), outcome = ?outcome, "Cadence run finished");
                }
                _ = ticker.tick() => {
                    running += self.launch_due(&tx, &token);
                }
            }
        }

        info!(in_flight = running, "Scheduler stopping");
        while running > 0 {
            let Some((id, outcome)) = rx.recv().await else {
                break;
            };
            running -= 1;
            self.book.complete(id, outcome, (self.clock)());
        }
        info!("Scheduler stopped");
    }

    fn launch_due(
        &self,
        tx: &mpsc::UnboundedSender<(CadenceId, RunOutcome)>,
        token: &CancellationToken,
    ) -> usize {
        let now = (self.clock)();
        let mut launched = 0;

        for cadence in self.cadences.iter().filter(|c| c.enabled) {
            let trigger = cadence.trigger;
            if self
                .book
                .try_begin(cadence.id, now, |state| trigger.is_due(now, state))
            {
                info!(
                    event = "job_started",
                    job_name = cadence.id.as_str(),
                    trigger = %trigger,
                    "Starting scheduled sweep"
                );
                self.launch(cadence.id, tx, token);
                launched += 1;
            }
        }

        launched
    }

    fn launch(
        &self,
        id: CadenceId,
        tx: &mpsc::UnboundedSender<(CadenceId, RunOutcome)>,
        token: &CancellationToken,
    ) {
        let runner = Arc::clone(&self.runner);
        let tx = tx.clone();
        let token = token.child_token();

        tokio::spawn(async move {
            let run = tokio::spawn(async move { runner.run(id, &token).await });
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_name = id.as_str(), error = %e, "Sweep task panicked");
                    RunOutcome::Failed
                }
            };
            if tx.send((id, outcome)).is_err() {
                warn!(job_name = id.as_str(), "Scheduler gone before sweep completed");
            }
        });
    }
}
