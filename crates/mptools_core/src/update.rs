use crate::{AppState, Effect, Feature, Msg, PageStatus, Tone};

pub const ACTIVATED_MESSAGE: &str = "MP-Tools activated";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::RestoreFeatures(features) => {
            // Applied once the first page is up.
            state.restore_features(features);
            Vec::new()
        }
        Msg::KeyPressed { combo, at } => {
            let Some(feature) = combo.feature() else {
                return (state, Vec::new());
            };
            if !state.accept_key(at) || !state.accept_toggle(at) {
                return (state, Vec::new());
            }
            toggle(&mut state, feature)
        }
        Msg::PageLoaded { origin } => {
            state.set_page(PageStatus::Loaded { origin });
            let mut effects = vec![status(&mut state, ACTIVATED_MESSAGE, Tone::Info)];
            if state.initialize() {
                let features = state.features();
                for feature in Feature::ALL {
                    if features.get(feature) {
                        effects.push(activation_effect(feature, true));
                    }
                }
            }
            effects
        }
        Msg::PageLoadFailed { origin, message } => {
            state.set_page(PageStatus::Failed { origin, message });
            Vec::new()
        }
        Msg::AutoAdvanceGaveUp {
            consecutive_failures,
        } => {
            if !state.is_active(Feature::AutoAdvance) {
                return (state, Vec::new());
            }
            state.set_active(Feature::AutoAdvance, false);
            let message = format!(
                "{} - OFF ({} failed attempts)",
                Feature::AutoAdvance.label(),
                consecutive_failures
            );
            vec![
                Effect::PersistFeatures(state.features()),
                status(&mut state, &message, Tone::Off),
            ]
        }
        Msg::QuitRequested => {
            if state.set_quitting() {
                vec![Effect::Quit]
            } else {
                Vec::new()
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn toggle(state: &mut AppState, feature: Feature) -> Vec<Effect> {
    let active = !state.is_active(feature);
    state.set_active(feature, active);

    let mut effects = Vec::with_capacity(3);
    if feature.is_persisted() {
        effects.push(Effect::PersistFeatures(state.features()));
    }
    effects.push(activation_effect(feature, active));
    let (word, tone) = if active {
        ("ON", Tone::On)
    } else {
        ("OFF", Tone::Off)
    };
    effects.push(status(
        state,
        &format!("{} - {}", feature.label(), word),
        tone,
    ));
    effects
}

fn activation_effect(feature: Feature, active: bool) -> Effect {
    match (feature, active) {
        (Feature::AutoAdvance, true) => Effect::StartAutoAdvance,
        (Feature::AutoAdvance, false) => Effect::StopAutoAdvance,
        (Feature::Sanitizer, active) => Effect::SetSanitizer(active),
        (Feature::SelectionUnlock, active) => Effect::SetSelectionUnlock(active),
        (Feature::Calculator, active) => Effect::SetCalculator(active),
    }
}

fn status(state: &mut AppState, message: &str, tone: Tone) -> Effect {
    state.set_status(message);
    Effect::ShowStatus {
        message: message.to_string(),
        tone,
    }
}
