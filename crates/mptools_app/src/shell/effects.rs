use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use engine_logging::{engine_debug, engine_info, engine_warn};
use mptools_core::{Effect, Msg, Tone};
use mptools_engine::{
    EngineCommand, EngineEvent, EngineHandle, ExitReason, LoopEvent, PageSource, StatusTone,
};

use super::persistence;

pub struct EffectRunner {
    engine: EngineHandle,
    state_dir: PathBuf,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, state_dir: PathBuf, msg_tx: mpsc::Sender<Msg>) -> Self {
        let runner = Self { engine, state_dir };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    pub fn load(&self, source: PageSource) {
        self.engine.send(EngineCommand::LoadPage(source));
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            let command = match effect {
                Effect::StartAutoAdvance => EngineCommand::StartAutoAdvance,
                Effect::StopAutoAdvance => EngineCommand::StopAutoAdvance,
                Effect::SetSanitizer(enabled) => EngineCommand::SetSanitizer(enabled),
                Effect::SetSelectionUnlock(enabled) => EngineCommand::SetSelectionUnlock(enabled),
                Effect::SetCalculator(open) => EngineCommand::SetCalculator(open),
                Effect::ShowStatus { message, tone } => EngineCommand::ShowStatus {
                    message,
                    tone: map_tone(tone),
                },
                Effect::PersistFeatures(features) => {
                    persistence::save_features(&self.state_dir, features);
                    continue;
                }
                Effect::Quit => {
                    self.engine.shutdown();
                    continue;
                }
            };
            self.engine.send(command);
        }
    }

    /// Stops the engine and waits for its teardown.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        thread::spawn(move || {
            while let Some(event) = engine.recv() {
                let Some(msg) = map_event(event) else {
                    continue;
                };
                if msg_tx.send(msg).is_err() {
                    break;
                }
            }
            engine_debug!("Engine event stream closed");
        });
    }
}

fn map_event(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::PageLoaded { origin, encoding } => {
            engine_info!("Page {} ready (encoding {:?})", origin, encoding);
            Some(Msg::PageLoaded { origin })
        }
        EngineEvent::PageLoadFailed { origin, message } => {
            engine_warn!("Page {} failed to load: {}", origin, message);
            Some(Msg::PageLoadFailed { origin, message })
        }
        EngineEvent::AutoAdvance(LoopEvent::Stopped(report)) => {
            engine_info!(
                "Auto-advance session {} ended: {} ({} completed, {} failed, {:?})",
                report.session,
                report.reason,
                report.completed_iterations,
                report.failed_iterations,
                report.elapsed
            );
            match report.reason {
                ExitReason::FailureLimit {
                    consecutive_failures,
                } => Some(Msg::AutoAdvanceGaveUp {
                    consecutive_failures,
                }),
                ExitReason::Stopped => None,
            }
        }
        EngineEvent::AutoAdvance(event) => {
            engine_debug!("Auto-advance: {:?}", event);
            None
        }
        EngineEvent::ToolChanged { tool, active } => {
            engine_debug!("{:?} active={}", tool, active);
            None
        }
    }
}

fn map_tone(tone: Tone) -> StatusTone {
    match tone {
        Tone::Info => StatusTone::Info,
        Tone::On => StatusTone::On,
        Tone::Off => StatusTone::Off,
    }
}
