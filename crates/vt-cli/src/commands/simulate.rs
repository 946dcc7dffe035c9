//! Simulate command for replaying a scripted scenario in virtual time.
//!
//! A scenario is an initial host state plus timed steps:
//!
//! ```json
//! {
//!   "host": {"dashboard": "mydash", "location": "/mydash/settings", "user": "Alice",
//!            "dashboards": {"mydash": {"view_timeout": {"timeout": true}}}},
//!   "steps": [{"at_ms": 3000, "action": "click"}],
//!   "until_ms": 60000
//! }
//! ```

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vt_core::ActivityKind;
use vt_core::memory::MemoryHost;
use vt_core::sim::Simulation;

use crate::Config;

/// A scripted scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Host state at time zero.
    #[serde(default)]
    pub host: MemoryHost,

    /// Steps to apply, by virtual time.
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Virtual time at which the simulation ends.
    pub until_ms: u64,
}

/// A change applied to the host at a point in virtual time.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// The user clicks.
    Click,
    /// The user moves the pointer.
    Move,
    /// The user opens a location on the current dashboard.
    Open { location: String },
    /// The host switches to another dashboard.
    Dashboard {
        id: String,
        #[serde(default)]
        location: Option<String>,
    },
    /// A dashboard's configuration finishes loading.
    Load { id: String, config: Value },
    /// A different user logs in.
    User {
        #[serde(default)]
        name: Option<String>,
    },
}

/// One redirect in the simulation output.
#[derive(Debug, Serialize)]
struct Redirect<'a> {
    at_ms: u64,
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct Outcome<'a> {
    redirects: Vec<Redirect<'a>>,
    final_location: &'a str,
}

/// Loads a scenario file and writes the redirects it produces.
pub fn run<W: Write>(writer: &mut W, path: &Path, config: &Config, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse scenario {}", path.display()))?;
    replay(writer, scenario, config, json)
}

/// Replays a scenario and writes the redirects it produces.
pub fn replay<W: Write>(writer: &mut W, scenario: Scenario, config: &Config, json: bool) -> Result<()> {
    let Scenario {
        mut host,
        mut steps,
        until_ms,
    } = scenario;
    host.suppress_markers.clone_from(&config.suppress_markers);
    let start_location = host.location.clone();

    let mut sim = Simulation::new(host, config.watchdog_options());
    steps.sort_by_key(|step| step.at_ms);
    for step in steps.into_iter().filter(|step| step.at_ms <= until_ms) {
        sim.advance_to(Duration::from_millis(step.at_ms));
        tracing::debug!(at_ms = step.at_ms, action = ?step.action, "applying step");
        apply(&mut sim, step.action);
    }
    sim.advance_to(Duration::from_millis(until_ms));

    let redirects: Vec<Redirect<'_>> = sim
        .navigations()
        .iter()
        .map(|nav| Redirect {
            at_ms: millis(nav.at),
            path: &nav.path,
        })
        .collect();
    let final_location = sim.host().location.as_str();

    if json {
        let outcome = Outcome {
            redirects,
            final_location,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&outcome)?)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Simulated {} starting at {start_location}",
        format_secs(until_ms)
    )?;
    if redirects.is_empty() {
        writeln!(writer, "No redirects.")?;
    }
    for redirect in &redirects {
        writeln!(writer, "{:>8}  {}", format_secs(redirect.at_ms), redirect.path)?;
    }
    writeln!(writer, "Final location: {final_location}")?;

    Ok(())
}

fn apply(sim: &mut Simulation, action: Action) {
    match action {
        Action::Click => sim.activity(ActivityKind::Click),
        Action::Move => sim.activity(ActivityKind::Move),
        Action::Open { location } => sim.host_mut().location = location,
        Action::Dashboard { id, location } => {
            let host = sim.host_mut();
            host.dashboard = id;
            if let Some(location) = location {
                host.location = location;
            }
        }
        Action::Load { id, config } => {
            sim.host_mut().dashboards.insert(id, Some(config));
        }
        Action::User { name } => sim.host_mut().user = name,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn format_secs(ms: u64) -> String {
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}
