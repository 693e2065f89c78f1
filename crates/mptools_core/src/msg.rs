#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Restore feature flags saved by a previous run.
    RestoreFeatures(crate::FeatureFlags),
    /// A key combo arrived at `at` (shell clock, milliseconds).
    KeyPressed {
        combo: crate::KeyCombo,
        at: crate::Millis,
    },
    /// The engine finished loading a page.
    PageLoaded { origin: String },
    /// The engine could not load a page.
    PageLoadFailed { origin: String, message: String },
    /// The auto-advance loop ended without being asked to.
    AutoAdvanceGaveUp { consecutive_failures: u32 },
    /// User asked to leave.
    QuitRequested,
    NoOp,
}
