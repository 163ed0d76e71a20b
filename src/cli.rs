use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

use crate::config::ConfigOverrides;

const USAGE: &str = "usage: amped [--config <path>] [--key <project-key>] [--abtest] \
[--irrelevant-context] [--template-path <path>] [--use-tokens <true|false>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    /// `--config` was given, so a missing file is an error.
    pub config_explicit: bool,
    pub overrides: ConfigOverrides,
}

pub fn cli_args_from_env() -> Result<CliArgs> {
    parse_args(env::args().skip(1))
}

pub fn parse_args<I>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut overrides = ConfigOverrides::default();

    while let Some(arg) = args.next() {
        let (flag, inline_value) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg.clone(), None),
        };
        let mut value_for = |name: &str| -> Result<String> {
            match inline_value.clone() {
                Some(value) => Ok(value),
                None => args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for {name}. {USAGE}")),
            }
        };

        match flag.as_str() {
            "--config" => config_path = Some(PathBuf::from(value_for("--config")?)),
            "--key" => overrides.project_key = Some(value_for("--key")?),
            "--template-path" => {
                overrides.template_path = Some(PathBuf::from(value_for("--template-path")?));
            }
            "--abtest" => {
                overrides.ab_test = Some(parse_flag(inline_value.as_deref(), "--abtest")?);
            }
            "--irrelevant-context" => {
                overrides.decoy_context = Some(parse_flag(
                    inline_value.as_deref(),
                    "--irrelevant-context",
                )?);
            }
            "--use-tokens" | "--use_tokens" => {
                let raw = value_for("--use-tokens")?;
                overrides.use_tokens = Some(parse_bool(&raw, "--use-tokens")?);
            }
            other => return Err(anyhow!("unknown argument: {other}. {USAGE}")),
        }
    }

    Ok(CliArgs {
        config_explicit: config_path.is_some(),
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./amped.jsonc")),
        overrides,
    })
}

/// Bare switches mean `true`; `--switch=false` turns them off.
fn parse_flag(inline_value: Option<&str>, name: &str) -> Result<bool> {
    match inline_value {
        None => Ok(true),
        Some(raw) => parse_bool(raw, name),
    }
}

fn parse_bool(raw: &str, name: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("invalid boolean for {name}: {other}")),
    }
}
