//! Tick loop driving the emit and refresh tasks
//!
//! - One coordinator ticks at a fixed period (60s in production)
//! - A task fires when `tick % task_interval == 0`, both fire on tick 0
//! - Each run is a separate tokio task; a still-running task skips its tick
//! - No catch-up for skipped or late ticks

use crate::connector::Connector;
use crate::error::ConnectorError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Emit,
    Refresh,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Emit => write!(f, "Emit Metrics"),
            TaskKind::Refresh => write!(f, "Refresh Cluster"),
        }
    }
}

/// Busy flag for one recurring task
#[derive(Debug, Clone, Default)]
pub struct TaskGate {
    busy: Arc<AtomicBool>,
}

impl TaskGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while a previous run still holds the gate
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { busy: self.busy.clone() })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when the run ends, including by panic
#[derive(Debug)]
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    NotDue,
    Started,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub emit: Dispatch,
    pub refresh: Dispatch,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub tick_period: Duration,
    /// Emit every N ticks
    pub emit_every: u64,
    /// Refresh every N ticks
    pub refresh_every: u64,
}

impl ScheduleSettings {
    /// One tick per minute; intervals are given in minutes
    pub fn from_minutes(emit_interval: u64, refresh_interval: u64) -> Self {
        Self {
            tick_period: Duration::from_secs(60),
            emit_every: emit_interval.max(1),
            refresh_every: refresh_interval.max(1),
        }
    }
}

pub struct Scheduler {
    connector: Arc<Connector>,
    settings: ScheduleSettings,
    emit_gate: TaskGate,
    refresh_gate: TaskGate,
    in_flight: Vec<JoinHandle<()>>,
    tick: u64,
}

impl Scheduler {
    pub fn new(connector: Arc<Connector>, settings: ScheduleSettings) -> Self {
        Self {
            connector,
            settings: ScheduleSettings {
                emit_every: settings.emit_every.max(1),
                refresh_every: settings.refresh_every.max(1),
                ..settings
            },
            emit_gate: TaskGate::new(),
            refresh_gate: TaskGate::new(),
            in_flight: Vec::new(),
            tick: 0,
        }
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.gate(kind).is_busy()
    }

    fn gate(&self, kind: TaskKind) -> &TaskGate {
        match kind {
            TaskKind::Emit => &self.emit_gate,
            TaskKind::Refresh => &self.refresh_gate,
        }
    }

    /// Handle the current tick and advance the counter. Must run inside a runtime.
    pub fn dispatch(&mut self) -> TickReport {
        let tick = self.tick;
        self.tick += 1;
        self.in_flight.retain(|handle| !handle.is_finished());

        let emit = if tick % self.settings.emit_every == 0 {
            self.launch(TaskKind::Emit)
        } else {
            Dispatch::NotDue
        };

        let refresh = if tick % self.settings.refresh_every == 0 {
            self.launch(TaskKind::Refresh)
        } else {
            Dispatch::NotDue
        };

        TickReport { tick, emit, refresh }
    }

    fn launch(&mut self, kind: TaskKind) -> Dispatch {
        let Some(guard) = self.gate(kind).try_acquire() else {
            error!("Skipping {} Event, {} task is still running", kind, kind);
            return Dispatch::Skipped;
        };

        let connector = self.connector.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            info!("{} - Started", kind);
            match kind {
                TaskKind::Emit => report(kind, connector.emit_metrics().await),
                TaskKind::Refresh => report(kind, connector.refresh_session().await),
            }
            info!("{} - Ended", kind);
        });
        self.in_flight.push(handle);

        Dispatch::Started
    }

    /// Wait for every spawned run to finish
    pub async fn wait_idle(&mut self) {
        for handle in self.in_flight.drain(..) {
            if let Err(e) = handle.await {
                error!("Scheduled task aborted: {}", e);
            }
        }
    }

    /// Tick until `shutdown` resolves, then let in-flight runs finish
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.settings.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Monitoring Connector - Started (emit every {} tick(s), refresh every {} tick(s))",
            self.settings.emit_every, self.settings.refresh_every
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Monitoring Connector Events - Triggered");
                    self.dispatch();
                }
                _ = &mut shutdown => {
                    info!("Monitoring Connector - Shutdown requested");
                    break;
                }
            }
        }

        self.wait_idle().await;
        self.connector.shutdown().await;
        info!("Monitoring Connector - Stopped");
    }
}

fn report<T: fmt::Debug>(kind: TaskKind, outcome: Result<T, ConnectorError>) {
    match outcome {
        Ok(value) => info!("{} - Completed: {:?}", kind, value),
        Err(e) if e.is_timeout() => error!("{} - Terminated: {}", kind, e),
        Err(e) => error!("{} - Failed: {}", kind, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_admits_one_run_at_a_time() {
        let gate = TaskGate::new();
        let first = gate.try_acquire();
        assert!(first.is_some());
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_gate_released_when_run_panics() {
        let gate = TaskGate::new();
        let guard = gate.try_acquire().unwrap();

        let result = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        })
        .await;

        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let settings = ScheduleSettings::from_minutes(0, 0);
        assert_eq!(settings.emit_every, 1);
        assert_eq!(settings.refresh_every, 1);
        assert_eq!(settings.tick_period, Duration::from_secs(60));
    }

    #[test]
    fn test_task_names() {
        assert_eq!(TaskKind::Emit.to_string(), "Emit Metrics");
        assert_eq!(TaskKind::Refresh.to_string(), "Refresh Cluster");
    }
}
