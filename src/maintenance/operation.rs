//! Operation and step definitions.

use std::path::PathBuf;
use std::time::Duration;

use globset::GlobSet;
use serde::{Deserialize, Serialize};

use crate::log_sink::ChannelId;
use crate::process::CommandLine;

/// The maintenance categories a user can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    HealthCheck,
    DiskCleanup,
    Defragment,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::HealthCheck,
        OperationKind::DiskCleanup,
        OperationKind::Defragment,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            OperationKind::HealthCheck => "System Health Check",
            OperationKind::DiskCleanup => "Disk Cleanup",
            OperationKind::Defragment => "Defragment and Optimize Drives",
        }
    }

    /// Label of the button that starts the operation
    pub fn trigger_label(self) -> &'static str {
        match self {
            OperationKind::HealthCheck => "Start",
            OperationKind::DiskCleanup => "Clean",
            OperationKind::Defragment => "Optimize",
        }
    }

    /// Channel holding the operation-level summary
    pub fn channel(self) -> ChannelId {
        match self {
            OperationKind::HealthCheck => ChannelId::SystemHealthCheck,
            OperationKind::DiskCleanup => ChannelId::DiskCleanup,
            OperationKind::Defragment => ChannelId::Defragment,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepAction {
    /// Run to completion, killed after `timeout`.
    Command {
        command: CommandLine,
        timeout: Duration,
    },
    /// Run with synthetic progress ticks; `label` prefixes each tick message.
    Tracked {
        command: CommandLine,
        label: String,
        estimated_steps: u32,
        timeout: Option<Duration>,
    },
    /// Delete the contents of each root, keeping the roots themselves.
    Cleanup {
        roots: Vec<PathBuf>,
        exclude: GlobSet,
    },
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub channel: ChannelId,
    pub action: StepAction,
}

impl Step {
    /// What the step does, as shown in "Executing step i/n: ..."
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::Command { command, .. } | StepAction::Tracked { command, .. } => {
                command.to_string()
            }
            StepAction::Cleanup { roots, .. } => {
                let roots: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
                format!("clean {}", roots.join(", "))
            }
        }
    }
}

/// One maintenance category with its fixed step list.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub steps: Vec<Step>,
    pub requires_privilege: bool,
}

impl Operation {
    pub fn display_name(&self) -> &'static str {
        self.kind.display_name()
    }

    /// Operation channel first, then each step channel once, in step order.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels = vec![self.kind.channel()];
        for step in &self.steps {
            if !channels.contains(&step.channel) {
                channels.push(step.channel);
            }
        }
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_step(name: &str, channel: ChannelId) -> Step {
        Step {
            name: name.to_string(),
            channel,
            action: StepAction::Command {
                command: CommandLine::new(format!("echo {name}")),
                timeout: Duration::from_secs(1),
            },
        }
    }

    #[test]
    fn test_channels_are_deduplicated_in_order() {
        let operation = Operation {
            kind: OperationKind::HealthCheck,
            steps: vec![
                command_step("checkhealth", ChannelId::CheckHealth),
                command_step("scanhealth", ChannelId::ScanHealth),
                command_step("again", ChannelId::CheckHealth),
            ],
            requires_privilege: true,
        };
        assert_eq!(
            operation.channels(),
            vec![
                ChannelId::SystemHealthCheck,
                ChannelId::CheckHealth,
                ChannelId::ScanHealth
            ]
        );
    }

    #[test]
    fn test_describe_cleanup_lists_roots() {
        let step = Step {
            name: "cleanup".to_string(),
            channel: ChannelId::DiskCleanup,
            action: StepAction::Cleanup {
                roots: vec![PathBuf::from("a"), PathBuf::from("b")],
                exclude: GlobSet::empty(),
            },
        };
        assert_eq!(step.describe(), "clean a, b");
    }
}
