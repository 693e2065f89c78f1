//! Wait-and-act loop that walks a page through its "check" and "advance"
//! controls until stopped.
//!
//! One [`AutoAdvance`] owns at most one run session. `start` spawns the loop
//! on the current Tokio runtime and returns a [`RunHandle`]; `stop` requests
//! cooperative cancellation. The stop flag is read at iteration boundaries,
//! and the waits inside an iteration (element polling, cooldown, recovery
//! delay) end early when it fires. An activation is never interrupted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::document::Document;
use crate::find::{
    ElementFinder, FindError, WatchRequest, WatchRequestError, DEFAULT_FIND_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
use crate::types::{EngineEvent, EventSink, ExitReason, LoopEvent, RunReport, SessionId};

pub const CHECK_SELECTOR: &str =
    "div.bottom-button.card-button.check-button.flex.items-center.relative.right-button.round-button";
pub const CHECK_TEXT: &str = "Check my answer";
pub const ADVANCE_SELECTOR: &str =
    "div.next-button.ph3.pv2.card-button.round-button.bottom-button.left-button.flex.items-center.mr2";
pub const ADVANCE_TEXT: &str = "Complete question";

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(3000);
pub const DEFAULT_RECOVERY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    pub name: String,
    pub selector: String,
    pub match_text: String,
    pub timeout: Duration,
}

impl StepConfig {
    pub fn new(name: &str, selector: &str, match_text: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            match_text: match_text.to_string(),
            timeout: DEFAULT_FIND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Steps run in order within one iteration.
    pub steps: Vec<StepConfig>,
    pub poll_interval: Duration,
    /// Pause after a fully successful iteration.
    pub cooldown: Duration,
    /// Pause after a failed iteration, before retrying from the first step.
    pub recovery_delay: Duration,
    /// `None` retries forever; otherwise the session ends after this many
    /// failed iterations in a row.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                StepConfig::new("check", CHECK_SELECTOR, CHECK_TEXT),
                StepConfig::new("advance", ADVANCE_SELECTOR, ADVANCE_TEXT),
            ],
            poll_interval: DEFAULT_POLL_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
            recovery_delay: DEFAULT_RECOVERY_DELAY,
            max_consecutive_failures: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopConfigError {
    #[error("loop needs at least one step")]
    NoSteps,
    #[error("step {name:?}: {source}")]
    Step {
        name: String,
        #[source]
        source: WatchRequestError,
    },
    #[error("failure limit must be greater than zero")]
    ZeroFailureLimit,
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

#[derive(Debug)]
struct Step {
    name: String,
    request: WatchRequest,
}

#[derive(Debug, Clone)]
pub struct RunHandle {
    session: SessionId,
    done: watch::Receiver<Option<RunReport>>,
}

impl RunHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_finished(&self) -> bool {
        self.done.borrow().is_some()
    }

    /// Resolves with the terminal report. `None` means the session task was
    /// torn down with its runtime before it could finish.
    pub async fn wait(mut self) -> Option<RunReport> {
        wait_for_report(&mut self.done).await
    }
}

async fn wait_for_report(done: &mut watch::Receiver<Option<RunReport>>) -> Option<RunReport> {
    match done.wait_for(Option::is_some).await {
        Ok(report) => (*report).clone(),
        Err(_) => None,
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(RunHandle),
    AlreadyRunning { session: SessionId },
}

struct RunSession {
    id: SessionId,
    running: Arc<AtomicBool>,
    stop: CancellationToken,
    done: watch::Receiver<Option<RunReport>>,
}

pub struct AutoAdvance {
    steps: Arc<[Step]>,
    poll_interval: Duration,
    cooldown: Duration,
    recovery_delay: Duration,
    max_consecutive_failures: Option<u32>,
    sink: Arc<dyn EventSink>,
    next_session: AtomicU64,
    session: Mutex<Option<RunSession>>,
}

impl AutoAdvance {
    pub fn new(config: LoopConfig, sink: Arc<dyn EventSink>) -> Result<Self, LoopConfigError> {
        if config.steps.is_empty() {
            return Err(LoopConfigError::NoSteps);
        }
        if config.max_consecutive_failures == Some(0) {
            return Err(LoopConfigError::ZeroFailureLimit);
        }
        if config.poll_interval.is_zero() {
            return Err(LoopConfigError::ZeroPollInterval);
        }
        let steps = config
            .steps
            .into_iter()
            .map(|step| {
                WatchRequest::new(&step.selector, step.match_text, step.timeout)
                    .map(|request| Step {
                        name: step.name.clone(),
                        request,
                    })
                    .map_err(|source| LoopConfigError::Step {
                        name: step.name,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            steps: steps.into(),
            poll_interval: config.poll_interval,
            cooldown: config.cooldown,
            recovery_delay: config.recovery_delay,
            max_consecutive_failures: config.max_consecutive_failures,
            sink,
            next_session: AtomicU64::new(0),
            session: Mutex::new(None),
        })
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<RunSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session unless one is running.
    ///
    /// Must be called from within a Tokio runtime. A session that was asked
    /// to stop but is still draining does not block a new start; the new
    /// loop body only begins once the old one has exited.
    pub fn start(&self, document: Arc<dyn Document>) -> StartOutcome {
        let mut slot = self.lock_session();
        if let Some(current) = slot.as_ref() {
            if current.running.load(Ordering::SeqCst) {
                engine_info!("Auto-advance session {} is already running", current.id);
                return StartOutcome::AlreadyRunning {
                    session: current.id,
                };
            }
        }

        let previous = slot.take().map(|session| session.done);
        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let running = Arc::new(AtomicBool::new(true));
        let stop = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);

        let runner = LoopRunner {
            session: id,
            document,
            steps: self.steps.clone(),
            finder: ElementFinder::new(self.poll_interval).with_cancel(stop.clone()),
            cooldown: self.cooldown,
            recovery_delay: self.recovery_delay,
            max_consecutive_failures: self.max_consecutive_failures,
            stop: stop.clone(),
            sink: self.sink.clone(),
        };
        let task_running = running.clone();
        tokio::spawn(async move {
            if let Some(mut previous) = previous {
                wait_for_report(&mut previous).await;
            }
            let report = runner.run().await;
            task_running.store(false, Ordering::SeqCst);
            done_tx.send_replace(Some(report));
        });

        *slot = Some(RunSession {
            id,
            running,
            stop,
            done: done_rx.clone(),
        });
        StartOutcome::Started(RunHandle {
            session: id,
            done: done_rx,
        })
    }

    /// Requests the running session to stop. Returns false when there was
    /// nothing to stop.
    pub fn stop(&self) -> bool {
        let slot = self.lock_session();
        match slot.as_ref() {
            Some(session) if !session.stop.is_cancelled() && session.done.borrow().is_none() => {
                session.stop.cancel();
                session.running.store(false, Ordering::SeqCst);
                engine_info!("Stop requested for auto-advance session {}", session.id);
                true
            }
            _ => {
                engine_debug!("Stop requested with no active auto-advance session");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_session()
            .as_ref()
            .is_some_and(|session| session.running.load(Ordering::SeqCst))
    }

    /// Handle of the most recent session, finished or not.
    pub fn current(&self) -> Option<RunHandle> {
        self.lock_session().as_ref().map(|session| RunHandle {
            session: session.id,
            done: session.done.clone(),
        })
    }
}

enum StepFailure {
    NotFound { step: String, text: String },
    TargetLost { step: String },
    Cancelled,
}

struct LoopRunner {
    session: SessionId,
    document: Arc<dyn Document>,
    steps: Arc<[Step]>,
    finder: ElementFinder,
    cooldown: Duration,
    recovery_delay: Duration,
    max_consecutive_failures: Option<u32>,
    stop: CancellationToken,
    sink: Arc<dyn EventSink>,
}

impl LoopRunner {
    async fn run(self) -> RunReport {
        let started = Instant::now();
        engine_info!("Auto-advance session {} started", self.session);
        self.emit(LoopEvent::Started {
            session: self.session,
        });

        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut consecutive_failures = 0u32;

        let reason = loop {
            if self.stop.is_cancelled() {
                break ExitReason::Stopped;
            }
            match self.run_iteration(completed + 1).await {
                Ok(()) => {
                    completed += 1;
                    consecutive_failures = 0;
                    self.emit(LoopEvent::IterationCompleted {
                        session: self.session,
                        iteration: completed,
                    });
                    if !self.pause(self.cooldown).await {
                        break ExitReason::Stopped;
                    }
                }
                Err(StepFailure::Cancelled) => break ExitReason::Stopped,
                Err(failure) => {
                    failed += 1;
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    self.report_failure(completed + 1, failure);
                    if let Some(limit) = self.max_consecutive_failures {
                        if consecutive_failures >= limit {
                            engine_warn!(
                                "Session {} giving up after {} consecutive failures",
                                self.session,
                                consecutive_failures
                            );
                            break ExitReason::FailureLimit {
                                consecutive_failures,
                            };
                        }
                    }
                    if !self.pause(self.recovery_delay).await {
                        break ExitReason::Stopped;
                    }
                }
            }
        };

        let report = RunReport {
            session: self.session,
            completed_iterations: completed,
            failed_iterations: failed,
            reason,
            elapsed: started.elapsed(),
        };
        engine_info!(
            "Auto-advance session {} {} after {} iterations",
            self.session,
            report.reason,
            report.completed_iterations
        );
        self.emit(LoopEvent::Stopped(report.clone()));
        report
    }

    /// Runs every step once, stopping at the first step that fails.
    async fn run_iteration(&self, iteration: u64) -> Result<(), StepFailure> {
        for step in self.steps.iter() {
            let element = match self.finder.find(self.document.as_ref(), &step.request).await {
                Ok(element) => element,
                Err(FindError::Cancelled { .. }) => return Err(StepFailure::Cancelled),
                Err(FindError::Timeout { text }) => {
                    return Err(StepFailure::NotFound {
                        step: step.name.clone(),
                        text,
                    })
                }
            };
            if !self.document.activate(element) {
                return Err(StepFailure::TargetLost {
                    step: step.name.clone(),
                });
            }
            self.emit(LoopEvent::StepActivated {
                session: self.session,
                iteration,
                step: step.name.clone(),
            });
        }
        Ok(())
    }

    fn report_failure(&self, iteration: u64, failure: StepFailure) {
        match failure {
            StepFailure::NotFound { step, text } => {
                engine_debug!(
                    "Session {}: step {} found no {:?}, retrying",
                    self.session,
                    step,
                    text
                );
                self.emit(LoopEvent::StepTimedOut {
                    session: self.session,
                    step,
                    text,
                });
            }
            StepFailure::TargetLost { step } => {
                engine_debug!(
                    "Session {}: step {} target left the page before activation, retrying",
                    self.session,
                    step
                );
                self.emit(LoopEvent::StepTargetLost {
                    session: self.session,
                    iteration,
                    step,
                });
            }
            StepFailure::Cancelled => {}
        }
    }

    /// Sleeps for `duration`; returns false if stop was requested meanwhile.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn emit(&self, event: LoopEvent) {
        self.sink.emit(EngineEvent::AutoAdvance(event));
    }
}
