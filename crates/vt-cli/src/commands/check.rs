//! Check command for validating a dashboard's timeout configuration.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use vt_core::{Activation, ConfigLookup, ViewId, ViewOverride, validate};

/// Reads a dashboard configuration file and reports its timeout settings.
pub fn run<W: Write>(writer: &mut W, path: &Path, user: Option<&str>, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    report(writer, &ConfigLookup::from_dashboard_config(&config), user, json)
}

/// Writes the validated settings of a configuration lookup.
pub fn report<W: Write>(
    writer: &mut W,
    lookup: &ConfigLookup,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let validated = match lookup {
        ConfigLookup::Section(raw) => Some(validate(raw, user)),
        ConfigLookup::NoTimeoutSection | ConfigLookup::ContainerNotLoaded => None,
    };

    if json {
        let value = match &validated {
            Some(validated) => serde_json::to_value(validated)?,
            None => json!({ "activation": "no_timeout_section" }),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    let Some(validated) = validated else {
        writeln!(writer, "Status: inactive (no view_timeout section)")?;
        return Ok(());
    };
    let settings = &validated.settings;

    writeln!(writer, "Status: {}", describe(validated.activation))?;
    writeln!(writer, "Duration: {} ms", settings.duration_ms)?;
    writeln!(
        writer,
        "Home view: {}",
        settings.home_view.as_ref().map_or("(none)", ViewId::as_str)
    )?;

    if !settings.users_restricted {
        writeln!(writer, "Users: (everyone)")?;
    } else if settings.allowed_users.is_empty() {
        writeln!(writer, "Users: (nobody)")?;
    } else {
        let users: Vec<&str> = settings.allowed_users.iter().map(String::as_str).collect();
        writeln!(writer, "Users: {}", users.join(", "))?;
    }

    let resets: Vec<&str> = [
        ("move", settings.reset_on_move),
        ("click", settings.reset_on_click),
    ]
    .into_iter()
    .filter_map(|(name, on)| on.then_some(name))
    .collect();
    if resets.is_empty() {
        writeln!(writer, "Reset on: (nothing)")?;
    } else {
        writeln!(writer, "Reset on: {}", resets.join(", "))?;
    }

    if settings.view_overrides.is_empty() {
        writeln!(writer, "Overrides: (none)")?;
        return Ok(());
    }
    writeln!(writer, "Overrides:")?;
    for (view, entry) in &settings.view_overrides {
        match entry {
            ViewOverride::Disabled => writeln!(writer, "- {view}: disabled")?,
            ViewOverride::Redirect(target) => writeln!(writer, "- {view} -> {target}")?,
        }
    }

    Ok(())
}

const fn describe(activation: Activation) -> &'static str {
    match activation {
        Activation::Enabled => "enabled",
        Activation::TimeoutOff => "off (timeout not set)",
        Activation::UserNotAllowed => "off (user not on allow-list)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn render(lookup: &ConfigLookup, user: Option<&str>, json: bool) -> String {
        let mut output = Vec::new();
        report(&mut output, lookup, user, json).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn report_full_section() {
        let lookup = ConfigLookup::Section(json!({
            "timeout": true,
            "duration": 5000,
            "default": "home",
            "users": ["Alice", "bob"],
            "reset": {"mouse_move": true},
            "views": {"settings": false, "cameras": "security"}
        }));

        let output = render(&lookup, Some("alice"), false);
        assert_snapshot!(output);
    }

    #[test]
    fn report_defaults() {
        let lookup = ConfigLookup::Section(json!({"timeout": true}));
        let output = render(&lookup, None, false);
        assert_eq!(
            output,
            "Status: enabled\n\
             Duration: 15000 ms\n\
             Home view: home\n\
             Users: (everyone)\n\
             Reset on: click\n\
             Overrides: (none)\n"
        );
    }

    #[test]
    fn report_missing_section() {
        let output = render(&ConfigLookup::NoTimeoutSection, None, false);
        assert_eq!(output, "Status: inactive (no view_timeout section)\n");
    }

    #[test]
    fn report_unauthorized_user_as_json() {
        let lookup = ConfigLookup::Section(json!({
            "timeout": true,
            "users": ["alice"],
            "views": {"settings": false}
        }));

        let output = render(&lookup, Some("mallory"), true);
        let value: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["activation"], "user_not_allowed");
        assert_eq!(value["settings"]["duration_ms"], 15000);
        assert_eq!(value["settings"]["allowed_users"], json!(["alice"]));
        assert_eq!(
            value["settings"]["view_overrides"]["settings"],
            json!({"kind": "disabled"})
        );
    }

    #[test]
    fn report_allow_list_without_names() {
        let lookup = ConfigLookup::Section(json!({"timeout": true, "users": [42]}));
        let output = render(&lookup, Some("alice"), false);
        assert!(output.starts_with("Status: off (user not on allow-list)\n"));
        assert!(output.contains("Users: (nobody)\n"));
    }

    #[test]
    fn run_reads_dashboard_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        std::fs::write(
            &path,
            r#"{"title": "Kiosk", "view_timeout": {"timeout": true, "default": null}}"#,
        )
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &path, None, false).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("Home view: (none)"));
    }

    #[test]
    fn run_reports_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        std::fs::write(&path, "view_timeout: {").unwrap();

        let err = run(&mut Vec::new(), &path, None, false).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse"));
    }
}
