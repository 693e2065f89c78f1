use crate::FeatureFlags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartAutoAdvance,
    StopAutoAdvance,
    SetSanitizer(bool),
    SetSelectionUnlock(bool),
    SetCalculator(bool),
    ShowStatus { message: String, tone: Tone },
    PersistFeatures(FeatureFlags),
    Quit,
}

/// Colour family of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    On,
    Off,
}
