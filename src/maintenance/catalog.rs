//! The fixed set of operations, built once from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};

use super::operation::{Operation, OperationKind, Step, StepAction};
use crate::config::Config;
use crate::error::{MaintError, Result};
use crate::log_sink::ChannelId;
use crate::process::CommandLine;

#[derive(Debug, Clone)]
pub struct Catalog {
    operations: BTreeMap<OperationKind, Arc<Operation>>,
}

impl Catalog {
    pub fn from_config(config: &Config) -> Result<Self> {
        let operations = [
            health_check(config),
            disk_cleanup(config)?,
            defragment(config),
        ]
        .into_iter()
        .map(|op| (op.kind, Arc::new(op)))
        .collect();
        Ok(Self { operations })
    }

    pub fn get(&self, kind: OperationKind) -> Arc<Operation> {
        // Every kind is inserted in `from_config`.
        Arc::clone(&self.operations[&kind])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values().map(|op| op.as_ref())
    }
}

fn health_check(config: &Config) -> Operation {
    let section = &config.health_check;
    let timeout = Duration::from_secs(section.timeout_secs);
    let steps = section
        .commands
        .iter()
        .map(|entry| Step {
            name: step_name(entry.channel),
            channel: entry.channel,
            action: StepAction::Command {
                command: CommandLine::new(entry.command.clone()),
                timeout,
            },
        })
        .collect();

    Operation {
        kind: OperationKind::HealthCheck,
        steps,
        requires_privilege: section.requires_privilege,
    }
}

fn disk_cleanup(config: &Config) -> Result<Operation> {
    let section = &config.cleanup;
    let step = Step {
        name: "cleanup".to_string(),
        channel: ChannelId::DiskCleanup,
        action: StepAction::Cleanup {
            roots: config.cleanup_roots(),
            exclude: build_exclude(&section.exclude)?,
        },
    };

    Ok(Operation {
        kind: OperationKind::DiskCleanup,
        steps: vec![step],
        requires_privilege: section.requires_privilege,
    })
}

fn defragment(config: &Config) -> Operation {
    let section = &config.defragment;
    let timeout = (section.timeout_secs > 0).then(|| Duration::from_secs(section.timeout_secs));
    let steps = section
        .drives
        .iter()
        .map(|drive| Step {
            name: format!("defrag {drive}"),
            channel: ChannelId::Defragment,
            action: StepAction::Tracked {
                command: CommandLine::new(format!("defrag {drive} /OPTIMIZE")),
                label: format!("Defragmenting {drive}"),
                estimated_steps: section.estimated_steps,
                timeout,
            },
        })
        .collect();

    Operation {
        kind: OperationKind::Defragment,
        steps,
        requires_privilege: section.requires_privilege,
    }
}

/// `checkhealth.log` -> `checkhealth`
fn step_name(channel: ChannelId) -> String {
    channel.file_name().trim_end_matches(".log").to_string()
}

fn build_exclude(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            MaintError::InvalidConfig(format!("invalid cleanup exclude pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MaintError::InvalidConfig(format!("invalid cleanup exclude patterns: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = Catalog::from_config(&Config::default()).unwrap();

        let health = catalog.get(OperationKind::HealthCheck);
        assert_eq!(health.steps.len(), 6);
        assert_eq!(health.steps[2].name, "Restorehealth");
        assert_eq!(health.steps[3].describe(), "sfc /scannow");
        assert!(health.requires_privilege);
        assert!(matches!(
            &health.steps[0].action,
            StepAction::Command { timeout, .. } if *timeout == Duration::from_secs(3600)
        ));

        let defrag = catalog.get(OperationKind::Defragment);
        assert_eq!(defrag.steps.len(), 2);
        assert_eq!(defrag.steps[1].describe(), "defrag D: /OPTIMIZE");
        assert!(!defrag.requires_privilege);
        assert!(matches!(
            &defrag.steps[0].action,
            StepAction::Tracked { estimated_steps: 100, timeout: None, .. }
        ));

        assert_eq!(catalog.get(OperationKind::DiskCleanup).steps.len(), 1);
        assert_eq!(catalog.iter().count(), 3);
    }

    #[test]
    fn test_bad_exclude_pattern_is_config_error() {
        let mut config = Config::default();
        config.cleanup.exclude.push("[unclosed".to_string());
        assert!(matches!(
            Catalog::from_config(&config),
            Err(MaintError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_defrag_timeout_from_config() {
        let mut config = Config::default();
        config.defragment.timeout_secs = 30;
        config.defragment.drives = vec!["E:".to_string()];
        let catalog = Catalog::from_config(&config).unwrap();
        let defrag = catalog.get(OperationKind::Defragment);
        assert!(matches!(
            &defrag.steps[0].action,
            StepAction::Tracked { timeout: Some(t), label, .. }
                if *t == Duration::from_secs(30) && label == "Defragmenting E:"
        ));
    }
}
