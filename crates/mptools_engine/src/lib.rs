//! MP-Tools engine: live page model and the page tools that act on it.
mod auto_advance;
mod decode;
mod document;
mod dom;
mod engine;
mod fetch;
mod find;
mod live;
mod overlay;
mod persist;
mod sanitizer;
mod selection;
mod types;
mod url_store;

pub use auto_advance::{
    AutoAdvance, LoopConfig, LoopConfigError, RunHandle, StartOutcome, StepConfig, ADVANCE_SELECTOR,
    ADVANCE_TEXT, CHECK_SELECTOR, CHECK_TEXT, DEFAULT_COOLDOWN, DEFAULT_RECOVERY_DELAY,
};
pub use decode::{decode_page, DecodeError, DecodedPage};
pub use document::Document;
pub use dom::{parse_selector, DomTree, ElementData, ElementId, ElementView, SelectorError};
pub use engine::{EngineCommand, EngineConfig, EngineError, EngineHandle, PageSource};
pub use fetch::{FailureKind, FetchError, FetchSettings, FetchedPage, HttpPageFetcher, PageFetcher};
pub use find::{
    find, ElementFinder, FindError, FindFailure, WatchRequest, WatchRequestError,
    DEFAULT_FIND_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
pub use live::{LiveDocument, Mutation, Mutator, PageEvent};
pub use overlay::{
    close_calculator, is_calculator_open, open_calculator, show_status, PanelState, StatusTone,
    CALCULATOR_BODY_ID, CALCULATOR_MOUNT_ID, CALCULATOR_PANEL_ID, STATUS_ELEMENT_ID,
    STATUS_LIFETIME,
};
pub use persist::{ensure_state_dir, read_optional, AtomicFileWriter, PersistError};
pub use sanitizer::{
    ClassRule, RuleError, SanitizeRules, Sanitizer, SweepStats, DEFAULT_FALLBACK_INTERVAL,
};
pub use selection::{unlock_inline_style, SelectionUnlock, SELECTION_STYLE_ID};
pub use scraper::Selector;
pub use types::{
    ChannelEventSink, EngineEvent, EventSink, ExitReason, LoopEvent, NullEventSink, RunReport,
    SessionId, Tool,
};
pub use url_store::{UrlStore, UrlStoreError, URL_STORE_FILENAME};
