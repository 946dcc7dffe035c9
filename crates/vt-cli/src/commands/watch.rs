//! Watch command: drives the watchdog in real time against a host state file.
//!
//! The state file is a serialized [`MemoryHost`]. It is re-read on every
//! tick so another process (or a person with an editor) can switch
//! dashboards and views; redirects are written back to its `location`.
//! Activity arrives as `click` / `move` lines on stdin, `quit` stops.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};

use vt_core::memory::{ListenerTable, MemoryHost};
use vt_core::timer::DeadlineTimer;
use vt_core::{ActivityKind, Watchdog};

use crate::Config;

type LiveWatchdog = Watchdog<MemoryHost, DeadlineTimer, ListenerTable>;

/// A line read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Activity(ActivityKind),
    Quit,
}

/// Runs the watch loop until `quit` is read from stdin.
pub fn run(state_path: &Path, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(watch(state_path, config))
}

async fn watch(state_path: &Path, config: &Config) -> Result<()> {
    let mut host = load_state(state_path).await?;
    host.suppress_markers.clone_from(&config.suppress_markers);

    let options = config.watchdog_options();
    let mut ticker = tokio::time::interval(options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut watchdog = Watchdog::new(host, DeadlineTimer::default(), ListenerTable::default(), options);
    let started = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    tracing::info!(state = %state_path.display(), "watching");
    loop {
        let deadline = watchdog
            .timer()
            .next_deadline()
            .map(|(_, at)| started + at);
        let issued = watchdog.host().navigations.len();

        tokio::select! {
            _ = ticker.tick() => {
                match load_state(state_path).await {
                    Ok(state) => watchdog.host_mut().sync_from(state),
                    Err(err) => tracing::warn!(error = %err, "failed to reload host state"),
                }
                watchdog.timer_mut().set_now(started.elapsed());
                watchdog.poll();
            }
            () = sleep_until(deadline) => {
                watchdog.timer_mut().set_now(started.elapsed());
                while let Some(handle) = watchdog.timer_mut().pop_due() {
                    watchdog.on_timer(handle);
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read stdin")? {
                    Some(line) => match parse_input(&line) {
                        Some(Input::Activity(kind)) => {
                            watchdog.timer_mut().set_now(started.elapsed());
                            watchdog.on_activity(kind);
                        }
                        Some(Input::Quit) => break,
                        None => tracing::warn!(input = %line.trim(), "unknown input"),
                    },
                    None => stdin_open = false,
                }
            }
        }

        if watchdog.host().navigations.len() > issued {
            persist(&watchdog, state_path, issued).await?;
        }
    }

    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Prints new redirects and writes the host's location back to the state file.
async fn persist(watchdog: &LiveWatchdog, state_path: &Path, issued: usize) -> Result<()> {
    for path in &watchdog.host().navigations[issued..] {
        println!("{path}");
    }
    let json = serde_json::to_string_pretty(watchdog.host()).context("failed to serialize host state")?;
    tokio::fs::write(state_path, json)
        .await
        .with_context(|| format!("failed to write {}", state_path.display()))
}

async fn load_state(path: &Path) -> Result<MemoryHost> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim() {
        "click" => Some(Input::Activity(ActivityKind::Click)),
        "move" => Some(Input::Activity(ActivityKind::Move)),
        "quit" => Some(Input::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_activity_lines() {
        assert_eq!(parse_input("click"), Some(Input::Activity(ActivityKind::Click)));
        assert_eq!(parse_input(" move \n"), Some(Input::Activity(ActivityKind::Move)));
        assert_eq!(parse_input("quit"), Some(Input::Quit));
        assert_eq!(parse_input("scroll"), None);
    }

    #[test]
    fn load_state_reads_host_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(
            &path,
            r#"{"dashboard": "mydash", "location": "/mydash/settings", "dashboards": {"mydash": null}}"#,
        )
        .unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let host = runtime.block_on(load_state(&path)).unwrap();

        assert_eq!(host.dashboard, "mydash");
        assert_eq!(host.location, "/mydash/settings");
    }

    #[test]
    fn load_state_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = runtime.block_on(load_state(&path)).unwrap_err();

        assert!(err.to_string().starts_with("failed to read"));
    }
}
