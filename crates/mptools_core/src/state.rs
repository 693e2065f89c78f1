use crate::view_model::AppViewModel;

/// Key events closer than this to the last handled key are dropped.
pub const KEY_GUARD_MS: u64 = 150;
/// Toggles closer than this to the previous toggle are dropped.
pub const TOGGLE_DEBOUNCE_MS: u64 = 300;

/// Milliseconds on a monotonic clock supplied by the shell.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AutoAdvance,
    Sanitizer,
    SelectionUnlock,
    Calculator,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::AutoAdvance,
        Feature::Sanitizer,
        Feature::SelectionUnlock,
        Feature::Calculator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Feature::AutoAdvance => "Auto-advance",
            Feature::Sanitizer => "Remove Annoying",
            Feature::SelectionUnlock => "Right Click",
            Feature::Calculator => "Calculator",
        }
    }

    /// The calculator lives in the page and is gone after a reload, so it
    /// is never persisted.
    pub fn is_persisted(self) -> bool {
        !matches!(self, Feature::Calculator)
    }
}

/// Feature switches that survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    pub auto_advance: bool,
    pub sanitizer: bool,
    pub selection_unlock: bool,
}

impl FeatureFlags {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::AutoAdvance => self.auto_advance,
            Feature::Sanitizer => self.sanitizer,
            Feature::SelectionUnlock => self.selection_unlock,
            Feature::Calculator => false,
        }
    }

    fn set(&mut self, feature: Feature, active: bool) {
        match feature {
            Feature::AutoAdvance => self.auto_advance = active,
            Feature::Sanitizer => self.sanitizer = active,
            Feature::SelectionUnlock => self.selection_unlock = active,
            Feature::Calculator => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageStatus {
    #[default]
    NotLoaded,
    Loaded {
        origin: String,
    },
    Failed {
        origin: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    features: FeatureFlags,
    calculator_open: bool,
    initialized: bool,
    page: PageStatus,
    last_key_at: Option<Millis>,
    last_toggle_at: Option<Millis>,
    last_status: Option<String>,
    quitting: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            features: self.features,
            calculator_open: self.calculator_open,
            page: self.page.clone(),
            last_status: self.last_status.clone(),
            quitting: self.quitting,
            dirty: self.dirty,
        }
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    pub fn is_active(&self, feature: Feature) -> bool {
        match feature {
            Feature::Calculator => self.calculator_open,
            other => self.features.get(other),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        was_dirty
    }

    pub(crate) fn set_active(&mut self, feature: Feature, active: bool) {
        match feature {
            Feature::Calculator => self.calculator_open = active,
            other => self.features.set(other, active),
        }
        self.dirty = true;
    }

    pub(crate) fn restore_features(&mut self, features: FeatureFlags) {
        self.features = features;
        self.dirty = true;
    }

    /// Marks the shell initialized. Returns false if it already was.
    pub(crate) fn initialize(&mut self) -> bool {
        let first = !self.initialized;
        self.initialized = true;
        first
    }

    pub(crate) fn set_page(&mut self, page: PageStatus) {
        if matches!(page, PageStatus::Loaded { .. }) {
            // The panel belonged to the previous page.
            self.calculator_open = false;
        }
        self.page = page;
        self.dirty = true;
    }

    /// Applies the key guard; records `at` when the key is accepted.
    pub(crate) fn accept_key(&mut self, at: Millis) -> bool {
        if self
            .last_key_at
            .is_some_and(|last| at.saturating_sub(last) < KEY_GUARD_MS)
        {
            return false;
        }
        self.last_key_at = Some(at);
        true
    }

    /// Applies the toggle debounce; records `at` when the toggle is accepted.
    pub(crate) fn accept_toggle(&mut self, at: Millis) -> bool {
        if self
            .last_toggle_at
            .is_some_and(|last| at.saturating_sub(last) < TOGGLE_DEBOUNCE_MS)
        {
            return false;
        }
        self.last_toggle_at = Some(at);
        true
    }

    pub(crate) fn set_status(&mut self, message: &str) {
        self.last_status = Some(message.to_string());
        self.dirty = true;
    }

    pub(crate) fn set_quitting(&mut self) -> bool {
        let first = !self.quitting;
        self.quitting = true;
        self.dirty = true;
        first
    }
}
