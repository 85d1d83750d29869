//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{SyncError, SyncResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// How a key's value is written into TOML
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Number,
    List,
}

/// Every key `config set` accepts
const KEYS: &[(&str, ValueKind)] = &[
    ("general.log_format", ValueKind::Text),
    ("remote.server_url", ValueKind::Text),
    ("remote.user_agent", ValueKind::Text),
    ("remote.max_connections", ValueKind::Number),
    ("remote.max_connections_per_route", ValueKind::Number),
    ("remote.max_redirects", ValueKind::Number),
    ("remote.timeout_secs", ValueKind::Number),
    ("upload.workers", ValueKind::Number),
    ("upload.queue_capacity", ValueKind::Number),
    ("upload.drain_threshold", ValueKind::Number),
    ("upload.poll_interval_ms", ValueKind::Number),
    ("upload.shutdown_timeout_secs", ValueKind::Number),
    ("upload.bundles", ValueKind::List),
    ("upload.history_policy", ValueKind::Text),
    ("upload.repository_url", ValueKind::Text),
    ("layout.commit_file", ValueKind::Text),
    ("layout.caches_dir", ValueKind::Text),
    ("layout.sources_state_file", ValueKind::Text),
    ("layout.out_dir", ValueKind::Text),
    ("layout.dist_dir", ValueKind::Text),
    ("layout.build_src_dir", ValueKind::Text),
    ("layout.scratch_dir", ValueKind::Text),
    ("fingerprint.build_dir_token", ValueKind::Text),
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> SyncResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config),
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let path = if local {
                std::env::current_dir()
                    .map_err(|e| SyncError::io("getting current directory", e))?
                    .join(LOCAL_CONFIG_FILE)
            } else {
                manager.path().to_path_buf()
            };
            set_value(&path, &key, &value).await?
        }
    }

    Ok(())
}

fn show_config(config: &Config) {
    let toml =
        toml::to_string_pretty(config).unwrap_or_else(|_| "Error serializing config".to_string());
    println!("{}", toml);
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> SyncResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

/// Set one key in the TOML file at `path`, keeping every other key as written
async fn set_value(path: &Path, key: &str, value: &str) -> SyncResult<()> {
    let ctx = UiContext::detect();

    let Some(kind) = key_kind(key) else {
        ui::step_error_detail(&ctx, "Unknown config key", key);
        ui::remark(&ctx, "Valid keys:");
        for (key, _) in KEYS {
            eprintln!("  {}", key);
        }
        return Err(SyncError::User(format!("Unknown config key: {}", key)));
    };

    let mut doc: toml::Value = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::io(format!("reading {}", path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| SyncError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, to_toml(kind, value)?)?;

    // Reject values the schema cannot read back
    doc.clone()
        .try_into::<Config>()
        .map_err(|e| SyncError::User(format!("Invalid value for {}: {}", key, e)))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let content = toml::to_string_pretty(&doc)?;
    fs::write(path, content)
        .await
        .map_err(|e| SyncError::io(format!("writing {}", path.display()), e))?;

    ui::step_ok(
        &ctx,
        &format!("Set {} = {} in {}", key, value, path.display()),
    );

    Ok(())
}

fn key_kind(key: &str) -> Option<ValueKind> {
    KEYS.iter()
        .find(|(known, _)| *known == key)
        .map(|(_, kind)| *kind)
}

fn to_toml(kind: ValueKind, value: &str) -> SyncResult<toml::Value> {
    match kind {
        ValueKind::Text => Ok(toml::Value::String(value.to_string())),
        ValueKind::Number => value
            .trim()
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|_| SyncError::User(format!("Invalid number: {}", value))),
        ValueKind::List => Ok(toml::Value::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| toml::Value::String(item.to_string()))
                .collect(),
        )),
    }
}

/// Set a dot-separated key in a TOML value tree, creating intermediate tables as needed.
fn set_toml_value(doc: &mut toml::Value, key: &str, value: toml::Value) -> SyncResult<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, tables)) = parts.split_last() else {
        return Err(SyncError::User("Empty config key".to_string()));
    };

    let mut current = doc;
    for &part in tables {
        current = current
            .as_table_mut()
            .ok_or_else(|| SyncError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| SyncError::User(format!("Expected table for key: {}", key)))?
        .insert((*leaf).to_string(), value);

    Ok(())
}
