use crate::config::{Config, ConfigError, ConfigPaths};
use clap::Args;
use std::path::Path;
use std::process::Command;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Print config with the API token redacted
    #[arg(long)]
    pub print: bool,

    /// Edit config in $EDITOR
    #[arg(long)]
    pub edit: bool,

    /// Set a config value (dotted key=value)
    #[arg(long, value_name = "key=value")]
    pub set: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum ConfigAction<'a> {
    Print,
    Edit,
    Set { assignments: &'a [String], print: bool },
}

impl ConfigArgs {
    fn action(&self) -> Result<ConfigAction<'_>, ConfigError> {
        match (self.edit, self.print, self.set.is_empty()) {
            (true, false, true) => Ok(ConfigAction::Edit),
            (true, _, _) => Err(ConfigError::Validation(
                "--edit cannot be combined with --set or --print".into(),
            )),
            (false, print, false) => Ok(ConfigAction::Set {
                assignments: &self.set,
                print,
            }),
            (false, _, true) => Ok(ConfigAction::Print),
        }
    }
}

pub fn run(args: &ConfigArgs, paths: &ConfigPaths) -> Result<(), ConfigError> {
    let action = args.action()?;
    let mut config = Config::load_or_create(paths)?;

    match action {
        ConfigAction::Edit => {
            edit_config(paths)?;
            Config::load(paths)?.validate()?;
            tracing::info!(path = %paths.config_path.display(), "config edited");
        }
        ConfigAction::Set { assignments, print } => {
            for assignment in assignments {
                apply_set(&mut config, assignment)?;
            }
            config.validate()?;
            Config::write(paths, &config)?;
            tracing::info!(keys = assignments.len(), "config updated");
            if print {
                print_config(&config)?;
            }
        }
        ConfigAction::Print => print_config(&config)?,
    }
    Ok(())
}

fn print_config(config: &Config) -> Result<(), ConfigError> {
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn edit_config(paths: &ConfigPaths) -> Result<(), ConfigError> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::Validation("$EDITOR not set; use --set or set EDITOR".into()))?;
    let status = editor_command(&editor, &paths.config_path).status()?;
    if !status.success() {
        return Err(ConfigError::Validation(
            "editor exited with a non-zero status".into(),
        ));
    }
    Ok(())
}

/// Let the shell split `$EDITOR` so quoted paths and flags behave as typed.
fn editor_command(editor: &str, path: &Path) -> Command {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(format!("{editor} \"$1\""))
        .arg("sh")
        .arg(path);
    command
}

fn apply_set(config: &mut Config, assignment: &str) -> Result<(), ConfigError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Validation("expected key=value for --set".into()))?;
    let key = key.trim();
    let value = value.trim();
    match key {
        "api.base_url" => config.api.base_url = value.trim_end_matches('/').to_string(),
        "api.token" => config.api.token = value.to_string(),
        "poll.interval_ms" => {
            config.poll.interval_ms = value.parse().map_err(|_| {
                ConfigError::Validation(format!("{key} expects a number of milliseconds"))
            })?;
        }
        "ui.show_activity" => {
            config.ui.show_activity = value
                .parse()
                .map_err(|_| ConfigError::Validation(format!("{key} expects true or false")))?;
        }
        "ui.color_theme" => config.ui.color_theme = value.to_string(),
        other => {
            return Err(ConfigError::Validation(format!(
                "unknown config key: {other}"
            )));
        }
    }
    Ok(())
}
