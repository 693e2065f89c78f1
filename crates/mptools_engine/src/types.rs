use std::fmt;
use std::time::Duration;

pub type SessionId = u64;

/// Why an auto-advance session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `stop()` was observed.
    Stopped,
    /// The configured cap of consecutive failed iterations was reached.
    FailureLimit { consecutive_failures: u32 },
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stopped => write!(f, "stopped"),
            ExitReason::FailureLimit {
                consecutive_failures,
            } => write!(f, "gave up after {consecutive_failures} failed attempts"),
        }
    }
}

/// Terminal summary of a session, delivered through its run handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub session: SessionId,
    pub completed_iterations: u64,
    pub failed_iterations: u64,
    pub reason: ExitReason,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Started {
        session: SessionId,
    },
    StepActivated {
        session: SessionId,
        iteration: u64,
        step: String,
    },
    StepTimedOut {
        session: SessionId,
        step: String,
        text: String,
    },
    /// The step's element left the page between being found and clicked.
    StepTargetLost {
        session: SessionId,
        iteration: u64,
        step: String,
    },
    IterationCompleted {
        session: SessionId,
        iteration: u64,
    },
    Stopped(RunReport),
}

/// Which page tool an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    AutoAdvance,
    Sanitizer,
    SelectionUnlock,
    Calculator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    AutoAdvance(LoopEvent),
    ToolChanged {
        tool: Tool,
        active: bool,
    },
    PageLoaded {
        origin: String,
        encoding: Option<String>,
    },
    PageLoadFailed {
        origin: String,
        message: String,
    },
}

/// Receiver of engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: EngineEvent) {}
}
