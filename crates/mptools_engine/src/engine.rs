use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::auto_advance::{AutoAdvance, LoopConfig, LoopConfigError, StartOutcome};
use crate::decode::decode_page;
use crate::document::Document;
use crate::dom::DomTree;
use crate::fetch::{FetchSettings, HttpPageFetcher, PageFetcher};
use crate::live::LiveDocument;
use crate::overlay::{close_calculator, open_calculator, show_status, StatusTone};
use crate::sanitizer::{RuleError, SanitizeRules, Sanitizer};
use crate::selection::SelectionUnlock;
use crate::types::{ChannelEventSink, EngineEvent, EventSink, Tool};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub auto_advance: LoopConfig,
    pub sanitizer: SanitizeRules,
    pub fetch: FetchSettings,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Loop(#[from] LoopConfigError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Url(String),
    Html { origin: String, html: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    LoadPage(PageSource),
    StartAutoAdvance,
    StopAutoAdvance,
    SetSanitizer(bool),
    SetSelectionUnlock(bool),
    SetCalculator(bool),
    ShowStatus { message: String, tone: StatusTone },
    Shutdown,
}

/// Front end of the engine thread.
///
/// The engine owns the live page and every page tool. It runs them on a
/// single-threaded Tokio runtime on its own thread; commands go in through
/// [`EngineHandle::send`] and events come back through
/// [`EngineHandle::try_recv`].
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: UnboundedSender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
    thread: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
    document: LiveDocument,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(config.fetch.clone()));
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(
        config: EngineConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
        let document = LiveDocument::default();

        let workbench = Workbench {
            document: document.clone(),
            auto_advance: AutoAdvance::new(config.auto_advance, sink.clone())?,
            sanitizer: Sanitizer::new(&config.sanitizer)?,
            selection: SelectionUnlock::new(),
            fetcher,
            sink,
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = thread::Builder::new()
            .name("mptools-engine".to_string())
            .spawn(move || runtime.block_on(workbench.run(cmd_rx)))?;

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            thread: Arc::new(Mutex::new(Some(thread))),
            document,
        })
    }

    /// Stops the engine and waits until its thread has torn the page tools
    /// down. Later calls, from any clone, return at once.
    pub fn shutdown(&self) {
        let Some(thread) = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        // The thread may already have exited; joining is all that is left.
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if thread.join().is_err() {
            engine_warn!("Engine thread panicked during shutdown");
        }
    }

    /// False once [`EngineHandle::shutdown`] has completed.
    pub fn is_alive(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            engine_warn!("Engine thread is gone; command dropped");
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    /// Blocks for the next event; `None` once the engine thread is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .ok()
    }

    /// The page the engine works on.
    pub fn document(&self) -> &LiveDocument {
        &self.document
    }
}

struct Workbench {
    document: LiveDocument,
    auto_advance: AutoAdvance,
    sanitizer: Sanitizer,
    selection: SelectionUnlock,
    fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn EventSink>,
}

impl Workbench {
    async fn run(mut self, mut cmd_rx: UnboundedReceiver<EngineCommand>) {
        while let Some(command) = cmd_rx.recv().await {
            if command == EngineCommand::Shutdown {
                break;
            }
            self.handle(command).await;
        }
        self.auto_advance.stop();
        if let Some(session) = self.auto_advance.current() {
            // Let the loop report its exit before the runtime goes away.
            session.wait().await;
        }
        self.sanitizer.disable();
        self.selection.disable(&self.document);
        engine_info!("Engine stopped");
    }

    async fn handle(&mut self, command: EngineCommand) {
        engine_debug!("Engine command {:?}", command);
        match command {
            EngineCommand::LoadPage(source) => self.load_page(source).await,
            EngineCommand::StartAutoAdvance => {
                let document: Arc<dyn Document> = Arc::new(self.document.clone());
                if let StartOutcome::Started(_) = self.auto_advance.start(document) {
                    self.tool_changed(Tool::AutoAdvance, true);
                }
            }
            EngineCommand::StopAutoAdvance => {
                if self.auto_advance.stop() {
                    self.tool_changed(Tool::AutoAdvance, false);
                }
            }
            EngineCommand::SetSanitizer(enabled) => {
                let changed = if enabled {
                    self.sanitizer.enable(&self.document)
                } else {
                    self.sanitizer.disable()
                };
                if changed {
                    self.tool_changed(Tool::Sanitizer, enabled);
                }
            }
            EngineCommand::SetSelectionUnlock(enabled) => {
                let changed = if enabled {
                    self.selection.enable(&self.document)
                } else {
                    self.selection.disable(&self.document)
                };
                if changed {
                    self.tool_changed(Tool::SelectionUnlock, enabled);
                }
            }
            EngineCommand::SetCalculator(open) => {
                let changed = if open {
                    open_calculator(&self.document).is_some()
                } else {
                    close_calculator(&self.document)
                };
                if changed {
                    self.tool_changed(Tool::Calculator, open);
                }
            }
            EngineCommand::ShowStatus { message, tone } => {
                if show_status(&self.document, &message, tone).is_none() {
                    engine_debug!("No page body to show status {:?}", message);
                }
            }
            EngineCommand::Shutdown => {}
        }
    }

    async fn load_page(&mut self, source: PageSource) {
        let (origin, html, encoding) = match source {
            PageSource::Html { origin, html } => (origin, html, None),
            PageSource::Url(url) => match self.fetch_html(&url).await {
                Ok((final_url, html, encoding)) => (final_url, html, Some(encoding)),
                Err(message) => {
                    engine_warn!("Failed to load {}: {}", url, message);
                    self.sink.emit(EngineEvent::PageLoadFailed {
                        origin: url,
                        message,
                    });
                    return;
                }
            },
        };

        self.document.replace(DomTree::parse_document(&html));
        if self.selection.is_enabled() {
            // The override style lived in the old page.
            self.selection.disable(&self.document);
            self.selection.enable(&self.document);
        }
        engine_info!("Loaded page {} ({} bytes)", origin, html.len());
        self.sink.emit(EngineEvent::PageLoaded { origin, encoding });
    }

    async fn fetch_html(&self, url: &str) -> Result<(String, String, String), String> {
        let page = self.fetcher.fetch(url).await.map_err(|err| err.to_string())?;
        let decoded = decode_page(&page.bytes, page.content_type.as_deref())
            .map_err(|err| err.to_string())?;
        Ok((page.final_url, decoded.html, decoded.encoding.to_string()))
    }

    fn tool_changed(&self, tool: Tool, active: bool) {
        self.sink.emit(EngineEvent::ToolChanged { tool, active });
    }
}
