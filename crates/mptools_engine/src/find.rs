use std::time::Duration;

use engine_logging::engine_trace;
use scraper::Selector;
use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::document::Document;
use crate::dom::{parse_selector, ElementId, SelectorError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchRequestError {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    /// Nothing matched within the request's budget.
    #[error("timed out waiting for {text:?}")]
    Timeout { text: String },
    #[error("cancelled while waiting for {text:?}")]
    Cancelled { text: String },
}

/// What to wait for: an element matching `selector` whose trimmed text equals
/// `match_text`, within `timeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    selector: Selector,
    match_text: String,
    timeout: Duration,
}

impl WatchRequest {
    pub fn new(
        selector: &str,
        match_text: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WatchRequestError> {
        if timeout.is_zero() {
            return Err(WatchRequestError::ZeroTimeout);
        }
        Ok(Self {
            selector: parse_selector(selector)?,
            match_text: match_text.into(),
            timeout,
        })
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn match_text(&self) -> &str {
        &self.match_text
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Polls a document until a [`WatchRequest`] is satisfied.
///
/// The first scan happens immediately, then once per poll interval. Waiting
/// is a timer, never a blocking sleep, and ends early when the cancellation
/// token fires.
#[derive(Debug, Clone)]
pub struct ElementFinder {
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Default for ElementFinder {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ElementFinder {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn find(
        &self,
        document: &dyn Document,
        request: &WatchRequest,
    ) -> Result<ElementId, FindError> {
        let started = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(FindError::Cancelled {
                        text: request.match_text.clone(),
                    });
                }
                _ = ticker.tick() => {}
            }

            if let Some(element) = document.first_with_text(&request.selector, &request.match_text)
            {
                engine_trace!(
                    "Matched {:?} after {:?}",
                    request.match_text,
                    started.elapsed()
                );
                return Ok(element);
            }
            if started.elapsed() >= request.timeout {
                return Err(FindError::Timeout {
                    text: request.match_text.clone(),
                });
            }
        }
    }
}

/// One-shot wait with the default poll interval.
pub async fn find(
    document: &dyn Document,
    selector: &str,
    match_text: &str,
    timeout: Duration,
) -> Result<ElementId, FindFailure> {
    let request = WatchRequest::new(selector, match_text, timeout)?;
    Ok(ElementFinder::default().find(document, &request).await?)
}

/// Error of the one-shot [`find`]: a bad request or a failed wait.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindFailure {
    #[error(transparent)]
    Request(#[from] WatchRequestError),
    #[error(transparent)]
    Find(#[from] FindError),
}
