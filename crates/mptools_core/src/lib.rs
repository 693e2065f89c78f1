//! MP-Tools core: pure toggle state machine and view-model helpers.
mod effect;
mod keys;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Tone};
pub use keys::{KeyCombo, KeyParseError};
pub use msg::Msg;
pub use state::{
    AppState, Feature, FeatureFlags, Millis, PageStatus, KEY_GUARD_MS, TOGGLE_DEBOUNCE_MS,
};
pub use update::{update, ACTIVATED_MESSAGE};
pub use view_model::AppViewModel;
