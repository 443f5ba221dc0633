//! `flotilla config get|set|list|reset`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use tabled::{settings::Style, Table, Tabled};

use flotilla_core::{workspace, ConfigKey, ConfigValue, WorkspaceConfig};

use super::{print_json, Workspace};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print one value.
    Get(KeyArgs),
    /// Set one value, coercing it to the key's type.
    Set(SetArgs),
    /// List every setting.
    List(JsonArg),
    /// Reset one key, or every setting, to its default.
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
pub struct JsonArg {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    pub key: ConfigKey,
    #[command(flatten)]
    pub output: JsonArg,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub key: ConfigKey,
    pub value: String,
    #[command(flatten)]
    pub output: JsonArg,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Key to reset; all settings when omitted.
    pub key: Option<ConfigKey>,
    #[command(flatten)]
    pub output: JsonArg,
}

#[derive(Serialize)]
struct Entry {
    value: ConfigValue,
    #[serde(rename = "type")]
    type_name: &'static str,
    description: &'static str,
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
    #[tabled(rename = "type")]
    type_name: &'static str,
    #[tabled(rename = "description")]
    description: &'static str,
}

pub fn run(command: ConfigCommand) -> Result<ExitCode> {
    let mut ws = Workspace::open()?;

    match command {
        ConfigCommand::Get(args) => {
            let value = ws.config.get(args.key);
            if args.output.json {
                print_json(&json!({ "key": args.key.as_str(), "value": value }))?;
            } else {
                println!("{} = {value}", args.key.as_str().cyan());
            }
        }
        ConfigCommand::Set(args) => {
            let value = ws.config.set(args.key, &args.value)?;
            save(&ws)?;
            tracing::info!(key = args.key.as_str(), %value, "config updated");
            if args.output.json {
                print_json(&json!({ "key": args.key.as_str(), "value": value }))?;
            } else {
                println!("{} {} = {value}", "✓".green(), args.key.as_str());
            }
        }
        ConfigCommand::List(output) => {
            if output.json {
                let entries: serde_json::Map<String, serde_json::Value> = ConfigKey::ALL
                    .into_iter()
                    .map(|key| {
                        let entry = Entry {
                            value: ws.config.get(key),
                            type_name: key.type_name(),
                            description: key.description(),
                        };
                        serde_json::to_value(entry).map(|v| (key.as_str().to_string(), v))
                    })
                    .collect::<Result<_, _>>()
                    .context("failed to serialize config")?;
                print_json(&entries)?;
            } else {
                let rows: Vec<ConfigRow> = ConfigKey::ALL
                    .into_iter()
                    .map(|key| ConfigRow {
                        key: key.as_str().to_string(),
                        value: ws.config.get(key).to_string(),
                        type_name: key.type_name(),
                        description: key.description(),
                    })
                    .collect();
                let mut table = Table::new(rows);
                table.with(Style::rounded());
                println!("{table}");
            }
        }
        ConfigCommand::Reset(args) => {
            let target = match args.key {
                Some(key) => {
                    ws.config.reset(key);
                    key.as_str().to_string()
                }
                None => {
                    let repositories = std::mem::take(&mut ws.config.repositories);
                    ws.config = WorkspaceConfig {
                        repositories,
                        ..WorkspaceConfig::default()
                    };
                    "all settings".to_string()
                }
            };
            save(&ws)?;
            if args.output.json {
                print_json(&json!({ "reset": target }))?;
            } else {
                println!("{} Reset {target} to defaults", "✓".green());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn save(ws: &Workspace) -> Result<()> {
    workspace::save_config(&ws.root, &ws.config)
        .with_context(|| format!("failed to save config in {}", ws.root.display()))
}
