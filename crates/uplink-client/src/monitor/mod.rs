// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection lifecycle management for the automation backend.
//!
//! The monitor owns a tri-state connection status and keeps it current with
//! the cheapest possible signal: a single probe call. After `start()` the
//! first probe fires once a startup delay elapses (so it never races initial
//! surface rendering), failures enter a fixed-delay bounded retry loop, and
//! once retries are exhausted the monitor falls back to a slow periodic
//! resweep that runs until a probe succeeds again.
//!
//! All timers belong to one background task and are cancelled by `stop()`;
//! after that no status mutation is observable, even if a probe that was in
//! flight settles later.

use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::probe::Probe;

const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Connection status for the automation backend.
///
/// There is no "never started" state; a monitor begins in `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A probe is in flight (also the initial state).
    Connecting,
    /// The most recent probe succeeded.
    Connected,
    /// The most recent probe failed.
    Disconnected,
}

/// Configuration for the connection monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay before the first probe after `start()`.
    pub startup_delay: Duration,
    /// Fixed delay between attempts during the tight-retry phase.
    pub retry_delay: Duration,
    /// Retries allowed beyond the initial failed probe before the monitor
    /// falls back to the resweep cadence.
    pub max_retries: u32,
    /// Interval between probes once retries are exhausted.
    pub resweep_interval: Duration,
    /// Upper bound on a single probe call; a probe that has not settled
    /// within this window counts as a failure. `None` leaves probes
    /// unbounded, which stalls the monitor in `Connecting` if the backend
    /// hangs.
    pub probe_timeout: Option<Duration>,
    /// Broadcast channel capacity for monitor events.
    pub event_channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(2500),
            retry_delay: Duration::from_secs(3),
            max_retries: 3,
            resweep_interval: Duration::from_secs(30),
            probe_timeout: Some(Duration::from_secs(10)),
            event_channel_capacity: 64,
        }
    }
}

/// Events emitted as the connection lifecycle advances.
///
/// Unlike the watch-based snapshot from [`ConnectionMonitor::subscribe`],
/// the event feed is lossless and ordered, so consumers can observe every
/// transition.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// The connection status changed to a new value.
    StatusChanged(ConnectionStatus),
    /// A probe settled with the given outcome.
    ProbeCompleted { success: bool },
}

/// Snapshot of monitor counters.
#[derive(Debug, Clone, Default)]
pub struct MonitorStats {
    /// Total probes attempted.
    pub probes_attempted: u64,
    /// Total probes that failed, including errors and timeouts.
    pub probes_failed: u64,
    /// Retries consumed in the current tight-retry cycle.
    pub retry_count: u32,
    /// When the current connection was established.
    pub connected_at: Option<DateTime<Utc>>,
    /// When the most recent probe failure was observed.
    pub last_failure_at: Option<DateTime<Utc>>,
}

struct ProbeRequest {
    reply: oneshot::Sender<bool>,
}

/// Handle to a managed connection monitor.
///
/// Construction starts nothing. `start()` spawns the background task (it is
/// idempotent and must be called within a Tokio runtime), `stop()` cancels
/// every pending timer and renders the instance inert, and `Drop` stops the
/// monitor as well. The status value is owned exclusively by the monitor;
/// external code reads it through [`status`](Self::status) or
/// [`subscribe`](Self::subscribe) and can force a probe with
/// [`probe_now`](Self::probe_now), but never writes it directly.
pub struct ConnectionMonitor {
    config: MonitorConfig,
    status_rx: watch::Receiver<ConnectionStatus>,
    event_tx: broadcast::Sender<MonitorEvent>,
    command_tx: mpsc::Sender<ProbeRequest>,
    stats: Arc<Mutex<MonitorStats>>,
    cancel_token: CancellationToken,
    started: AtomicBool,
    task_parts: Mutex<Option<TaskParts>>,
}

struct TaskParts {
    probe: Arc<dyn Probe>,
    status_tx: watch::Sender<ConnectionStatus>,
    command_rx: mpsc::Receiver<ProbeRequest>,
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("config", &self.config)
            .field("status", &*self.status_rx.borrow())
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl ConnectionMonitor {
    /// Create a new monitor for the given probe.
    ///
    /// Nothing runs until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(config: MonitorConfig, probe: impl Probe + 'static) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        Self {
            config,
            status_rx,
            event_tx,
            command_tx,
            stats: Arc::new(Mutex::new(MonitorStats::default())),
            cancel_token: CancellationToken::new(),
            started: AtomicBool::new(false),
            task_parts: Mutex::new(Some(TaskParts {
                probe: Arc::new(probe),
                status_tx,
                command_rx,
            })),
        }
    }

    /// Begin the monitoring lifecycle.
    ///
    /// Schedules the first probe after the configured startup delay. Calling
    /// `start()` while already running has no effect, and a stopped monitor
    /// cannot be restarted.
    pub fn start(&self) {
        if self.cancel_token.is_cancelled() {
            warn!("start() called on a stopped monitor, ignoring");
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("monitor already started");
            return;
        }

        let parts = match self.task_parts.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let parts = match parts {
            Some(parts) => parts,
            None => return,
        };

        info!(
            "starting connection monitor, first probe in {:?}",
            self.config.startup_delay
        );

        let task = MonitorTask {
            config: self.config.clone(),
            probe: parts.probe,
            status_tx: parts.status_tx,
            event_tx: self.event_tx.clone(),
            stats: Arc::clone(&self.stats),
            command_rx: parts.command_rx,
            cancel_token: self.cancel_token.clone(),
            retry_count: 0,
            phase: Phase::Startup,
        };
        tokio::spawn(task.run());
    }

    /// Perform one probe immediately, bypassing any pending schedule.
    ///
    /// The status is `Connecting` for the probe's duration and the pending
    /// retry or resweep timer is replaced by whatever the outcome dictates,
    /// so timers never stack up. Returns the probe outcome, or `false`
    /// without probing when the monitor is not running.
    pub async fn probe_now(&self) -> bool {
        if !self.is_running() {
            debug!("probe_now() called while monitor is not running");
            return false;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .command_tx
            .send(ProbeRequest { reply: reply_tx })
            .await
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Get the current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes.
    ///
    /// The receiver always holds the latest value; use [`events`](Self::events)
    /// for a lossless transition feed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to monitor events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.event_tx.subscribe()
    }

    /// Get a snapshot of the monitor counters.
    #[must_use]
    pub fn stats(&self) -> MonitorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The configuration this monitor was built with.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Whether the background task has been started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel_token.is_cancelled()
    }

    /// Stop the monitor.
    ///
    /// Cancels every outstanding timer and any in-flight probe; safe to call
    /// repeatedly. After `stop()` returns no further status mutation is
    /// observable.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the startup delay before the first probe.
    Startup,
    /// Last probe succeeded; nothing is scheduled.
    Idle,
    /// Inside the bounded fixed-delay retry loop.
    Retrying,
    /// Retries exhausted; probing on the slow resweep cadence.
    Resweeping,
}

enum Wake {
    Timer,
    Command(Option<ProbeRequest>),
    Cancelled,
}

struct MonitorTask {
    config: MonitorConfig,
    probe: Arc<dyn Probe>,
    status_tx: watch::Sender<ConnectionStatus>,
    event_tx: broadcast::Sender<MonitorEvent>,
    stats: Arc<Mutex<MonitorStats>>,
    command_rx: mpsc::Receiver<ProbeRequest>,
    cancel_token: CancellationToken,
    retry_count: u32,
    phase: Phase,
}

impl MonitorTask {
    async fn run(mut self) {
        let cancel_token = self.cancel_token.clone();
        // At most one deadline exists at any instant; every probe outcome
        // replaces it rather than stacking a new timer next to it.
        let mut deadline = Some(Instant::now() + self.config.startup_delay);

        loop {
            let wake = {
                let timer = async {
                    match deadline {
                        Some(at) => time::sleep_until(at).await,
                        None => future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    () = cancel_token.cancelled() => Wake::Cancelled,
                    () = timer => Wake::Timer,
                    request = self.command_rx.recv() => Wake::Command(request),
                }
            };

            match wake {
                Wake::Cancelled => {
                    info!("connection monitor stopped");
                    return;
                }
                Wake::Timer => {
                    if self.phase == Phase::Resweeping {
                        // Each resweep tick starts from a clean retry budget,
                        // so a success here re-arms the tight-retry path for
                        // whatever failure comes next.
                        self.set_retry_count(0);
                    }
                    match self.run_probe().await {
                        Some(success) => deadline = self.next_deadline(success),
                        None => return,
                    }
                }
                Wake::Command(Some(request)) => match self.run_probe().await {
                    Some(success) => {
                        deadline = self.next_deadline(success);
                        let _ = request.reply.send(success);
                    }
                    None => return,
                },
                Wake::Command(None) => {
                    // Handle dropped; its Drop impl has cancelled the token.
                    return;
                }
            }
        }
    }

    /// Run a single probe to completion, racing it against cancellation.
    ///
    /// Returns `None` when the monitor was stopped while the probe was in
    /// flight; the outcome of the abandoned probe is discarded.
    async fn run_probe(&mut self) -> Option<bool> {
        self.set_status(ConnectionStatus::Connecting);
        if let Ok(mut stats) = self.stats.lock() {
            stats.probes_attempted += 1;
        }

        let probe = Arc::clone(&self.probe);
        let probe_timeout = self.config.probe_timeout;
        let outcome = async move {
            let result = match probe_timeout {
                Some(limit) => match time::timeout(limit, probe.check()).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("probe timed out after {:?}", limit);
                        return false;
                    }
                },
                None => probe.check().await,
            };
            match result {
                Ok(healthy) => healthy,
                Err(e) => {
                    warn!("probe error: {}", e);
                    false
                }
            }
        };

        tokio::select! {
            success = outcome => Some(success),
            () = self.cancel_token.cancelled() => None,
        }
    }

    /// Fold a probe outcome into the state machine and choose the next
    /// deadline, if any.
    fn next_deadline(&mut self, success: bool) -> Option<Instant> {
        let deadline = if success {
            self.set_retry_count(0);
            self.phase = Phase::Idle;
            self.set_status(ConnectionStatus::Connected);
            // Nothing left to schedule; the next probe is either manual or
            // follows a later failure.
            None
        } else {
            if let Ok(mut stats) = self.stats.lock() {
                stats.probes_failed += 1;
                stats.last_failure_at = Some(Utc::now());
            }
            self.set_status(ConnectionStatus::Disconnected);

            if self.phase == Phase::Resweeping {
                debug!(
                    "probe failed during resweep, next attempt in {:?}",
                    self.config.resweep_interval
                );
                Some(Instant::now() + self.config.resweep_interval)
            } else if self.retry_count < self.config.max_retries {
                self.set_retry_count(self.retry_count + 1);
                self.phase = Phase::Retrying;
                warn!(
                    "probe failed, retry {}/{} in {:?}",
                    self.retry_count, self.config.max_retries, self.config.retry_delay
                );
                Some(Instant::now() + self.config.retry_delay)
            } else {
                self.phase = Phase::Resweeping;
                warn!(
                    "retries exhausted, resweeping every {:?}",
                    self.config.resweep_interval
                );
                Some(Instant::now() + self.config.resweep_interval)
            }
        };

        let _ = self.event_tx.send(MonitorEvent::ProbeCompleted { success });
        deadline
    }

    fn set_retry_count(&mut self, count: u32) {
        self.retry_count = count;
        if let Ok(mut stats) = self.stats.lock() {
            stats.retry_count = count;
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if !changed {
            return;
        }

        match status {
            ConnectionStatus::Connecting => debug!("probing automation backend..."),
            ConnectionStatus::Connected => info!("automation backend connected"),
            ConnectionStatus::Disconnected => warn!("automation backend unreachable"),
        }

        if let Ok(mut stats) = self.stats.lock() {
            stats.connected_at = match status {
                ConnectionStatus::Connected => Some(Utc::now()),
                _ => None,
            };
        }

        let _ = self.event_tx.send(MonitorEvent::StatusChanged(status));
    }
}
