use mptools_core::{
    update, AppState, Effect, Feature, FeatureFlags, KeyCombo, Msg, PageStatus, Tone,
    ACTIVATED_MESSAGE,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn loaded(origin: &str) -> Msg {
    Msg::PageLoaded {
        origin: origin.to_string(),
    }
}

fn activated() -> Effect {
    Effect::ShowStatus {
        message: ACTIVATED_MESSAGE.to_string(),
        tone: Tone::Info,
    }
}

#[test]
fn first_page_load_reapplies_persisted_features() {
    init_logging();
    let restored = FeatureFlags {
        auto_advance: true,
        sanitizer: false,
        selection_unlock: true,
    };
    let (state, effects) = update(AppState::new(), Msg::RestoreFeatures(restored));
    assert!(effects.is_empty());
    assert!(!state.is_initialized());

    let (state, effects) = update(state, loaded("https://quiz.example/timeline"));
    assert_eq!(
        effects,
        vec![
            activated(),
            Effect::StartAutoAdvance,
            Effect::SetSelectionUnlock(true),
        ]
    );
    assert!(state.is_initialized());
    assert_eq!(
        state.view().page,
        PageStatus::Loaded {
            origin: "https://quiz.example/timeline".to_string()
        }
    );

    // Later loads only announce themselves.
    let (_state, effects) = update(state, loaded("https://quiz.example/next"));
    assert_eq!(effects, vec![activated()]);
}

#[test]
fn page_load_closes_the_calculator() {
    init_logging();
    let (state, _) = update(AppState::new(), loaded("a.html"));
    let (state, _) = update(
        state,
        Msg::KeyPressed {
            combo: KeyCombo::alt('4'),
            at: 500,
        },
    );
    assert!(state.is_active(Feature::Calculator));

    let (state, _) = update(state, loaded("b.html"));
    assert!(!state.is_active(Feature::Calculator));
}

#[test]
fn failed_load_is_kept_for_the_view() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::PageLoadFailed {
            origin: "https://quiz.example".to_string(),
            message: "http status 404".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.is_initialized());
    assert!(matches!(state.view().page, PageStatus::Failed { .. }));
}

#[test]
fn loop_giving_up_clears_the_flag() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::KeyPressed {
            combo: KeyCombo::alt('1'),
            at: 0,
        },
    );
    let (state, effects) = update(
        state,
        Msg::AutoAdvanceGaveUp {
            consecutive_failures: 5,
        },
    );
    assert!(!state.is_active(Feature::AutoAdvance));
    assert_eq!(
        effects,
        vec![
            Effect::PersistFeatures(FeatureFlags::default()),
            Effect::ShowStatus {
                message: "Auto-advance - OFF (5 failed attempts)".to_string(),
                tone: Tone::Off,
            },
        ]
    );

    let (_state, effects) = update(
        state,
        Msg::AutoAdvanceGaveUp {
            consecutive_failures: 5,
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn quit_is_requested_once() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::QuitRequested);
    assert_eq!(effects, vec![Effect::Quit]);
    assert!(state.view().quitting);
    let (_state, effects) = update(state, Msg::QuitRequested);
    assert!(effects.is_empty());
}

#[test]
fn view_summary_lists_every_binding() {
    init_logging();
    let (mut state, _) = update(
        AppState::new(),
        Msg::KeyPressed {
            combo: KeyCombo::alt('2'),
            at: 0,
        },
    );
    let view = state.view();
    assert_eq!(view.summary(), "[1:off 2:on 3:off 4:off]");
    assert_eq!(view.last_status.as_deref(), Some("Remove Annoying - ON"));
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}
