//! Config command feature.
//!
//! This module owns and handles the "maintkit config" command behavior.

use std::path::Path;

use anyhow::Context;

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::theme::Theme;

pub(crate) fn handle_config(
    config: &Config,
    explicit_path: Option<&Path>,
    action: ConfigAction,
) -> anyhow::Result<()> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };

    match action {
        ConfigAction::Show => {
            println!("{}", Theme::header("Current Configuration"));
            println!("{}", Theme::divider_bold(60));
            let rendered = toml::to_string_pretty(config).context("Failed to serialize config")?;
            println!("{rendered}");
            println!("Config file: {}", describe(&path));
            println!("Log directory: {}", config.log_dir().display());
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save_to(&path)?;
            println!("{} Wrote default configuration to {}", Theme::success("OK"), path.display());
        }
    }
    Ok(())
}

fn describe(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not created, using defaults)", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        let config = Config::default();

        handle_config(&config, Some(&path), ConfigAction::Init { force: false }).unwrap();
        assert!(path.exists());

        let again = handle_config(&config, Some(&path), ConfigAction::Init { force: false });
        assert!(again.is_err());

        handle_config(&config, Some(&path), ConfigAction::Init { force: true }).unwrap();
        assert!(Config::load_from(&path).is_ok());
    }
}
