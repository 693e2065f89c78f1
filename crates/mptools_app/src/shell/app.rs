use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use mptools_core::{update, AppState, AppViewModel, KeyCombo, Msg, PageStatus};
use mptools_engine::{decode_page, EngineConfig, EngineHandle, PageSource, UrlStore};

use super::args::Cli;
use super::effects::EffectRunner;
use super::{logging, persistence};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    logging::initialize(cli.log);

    let store = UrlStore::new(cli.state_dir.clone());
    if let Some(url) = cli.save_url.as_deref() {
        store
            .save(url)
            .with_context(|| format!("saving start page {url}"))?;
        println!("Start page saved to {}", store.dir().display());
        return Ok(());
    }

    let source = resolve_source(&cli, &store)?;

    let mut config = EngineConfig::default();
    config.auto_advance.max_consecutive_failures = cli.max_failures;
    let engine = EngineHandle::new(config).context("starting engine")?;

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(engine, cli.state_dir.clone(), msg_tx.clone());

    let mut state = AppState::new();
    dispatch(
        &mut state,
        &runner,
        Msg::RestoreFeatures(persistence::load_features(&cli.state_dir)),
    );
    runner.load(source);
    spawn_key_reader(msg_tx);
    println!("Alt+1 auto-advance, Alt+2 remove annoying, Alt+3 right click, Alt+4 calculator; type e.g. `alt+1`, or `quit`.");

    while let Ok(msg) = msg_rx.recv() {
        dispatch(&mut state, &runner, msg);
        if state.view().quitting {
            break;
        }
    }
    // No-op when Effect::Quit already stopped the engine.
    runner.shutdown();
    engine_info!("Shell exiting");
    Ok(())
}

fn dispatch(state: &mut AppState, runner: &EffectRunner, msg: Msg) {
    let (next, effects) = update(std::mem::take(state), msg);
    *state = next;
    runner.enqueue(effects);
    if state.consume_dirty() {
        render(&state.view());
    }
}

fn render(view: &AppViewModel) {
    let page = match &view.page {
        PageStatus::NotLoaded => "loading".to_string(),
        PageStatus::Loaded { origin } => origin.clone(),
        PageStatus::Failed { origin, message } => format!("{origin} (failed: {message})"),
    };
    match &view.last_status {
        Some(status) => println!("{} {} | {}", view.summary(), page, status),
        None => println!("{} {}", view.summary(), page),
    }
}

/// `--url`, then `--page`, then the saved start page.
fn resolve_source(cli: &Cli, store: &UrlStore) -> anyhow::Result<PageSource> {
    if let Some(url) = &cli.url {
        return Ok(PageSource::Url(url.trim().to_string()));
    }
    if let Some(path) = &cli.page {
        return read_page_file(path);
    }
    match store.load().context("reading saved start page")? {
        Some(url) => Ok(PageSource::Url(url)),
        None => bail!("no page to open: pass --url or --page, or save one with --save-url"),
    }
}

fn read_page_file(path: &Path) -> anyhow::Result<PageSource> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded =
        decode_page(&bytes, None).with_context(|| format!("decoding {}", path.display()))?;
    Ok(PageSource::Html {
        origin: path.display().to_string(),
        html: decoded.html,
    })
}

fn spawn_key_reader(msg_tx: mpsc::Sender<Msg>) {
    let started = Instant::now();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(msg) = parse_input(&line, started.elapsed().as_millis() as u64) else {
                continue;
            };
            if msg_tx.send(msg).is_err() {
                return;
            }
        }
        let _ = msg_tx.send(Msg::QuitRequested);
    });
}

fn parse_input(line: &str, at: u64) -> Option<Msg> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if matches!(line.to_ascii_lowercase().as_str(), "quit" | "exit" | "q") {
        return Some(Msg::QuitRequested);
    }
    match line.parse::<KeyCombo>() {
        Ok(combo) => Some(Msg::KeyPressed { combo, at }),
        Err(err) => {
            engine_warn!("Ignoring input {:?}: {}", line, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use mptools_core::{KeyCombo, Msg};
    use mptools_engine::{PageSource, UrlStore};
    use tempfile::TempDir;

    use super::{parse_input, resolve_source};
    use crate::shell::args::Cli;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mptools").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn explicit_url_beats_saved_start_page() {
        let temp = TempDir::new().unwrap();
        let store = UrlStore::new(temp.path().to_path_buf());
        store.save("https://saved.example/").unwrap();

        let source = resolve_source(&cli(&["--url", "https://given.example/"]), &store).unwrap();
        assert_eq!(source, PageSource::Url("https://given.example/".to_string()));

        let source = resolve_source(&cli(&[]), &store).unwrap();
        assert_eq!(source, PageSource::Url("https://saved.example/".to_string()));
    }

    #[test]
    fn local_page_file_is_decoded() {
        let temp = TempDir::new().unwrap();
        let page = temp.path().join("quiz.html");
        std::fs::write(&page, "<p>Check my answer</p>").unwrap();
        let store = UrlStore::new(temp.path().join("state"));

        let source =
            resolve_source(&cli(&["--page", page.to_str().unwrap()]), &store).unwrap();
        let PageSource::Html { origin, html } = source else {
            panic!("expected inline html");
        };
        assert_eq!(PathBuf::from(origin), page);
        assert!(html.contains("Check my answer"));
    }

    #[test]
    fn nothing_to_open_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = UrlStore::new(temp.path().to_path_buf());
        assert!(resolve_source(&cli(&[]), &store).is_err());
    }

    #[test]
    fn stdin_lines_become_messages() {
        assert_eq!(parse_input("  quit ", 5), Some(Msg::QuitRequested));
        assert_eq!(
            parse_input("alt+2", 40),
            Some(Msg::KeyPressed {
                combo: KeyCombo::alt('2'),
                at: 40
            })
        );
        assert_eq!(parse_input("", 0), None);
        assert_eq!(parse_input("hyper+1", 0), None);
    }
}
