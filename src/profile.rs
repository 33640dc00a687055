//! Command specifications and profiles
//!
//! A profile is a named list of commands scraped together. Profiles are
//! read from a TOML file:
//!
//! ```toml
//! [[profiles]]
//! name = "linux"
//!
//! [[profiles.commands]]
//! command = "check_load"
//! metric_name = "load1,load5,load15"
//! label_name = "NONE"
//!
//! [[profiles.commands]]
//! command = "check_disk"
//! params = "/var!90!95"
//! type = "gauge"
//! help = "disk usage"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::NamingDefaults;
use crate::error::{NrpeError, Result};
use crate::metrics::MetricKind;
use crate::protocol::{Command, ARG_SEPARATOR};

/// Label name meaning "attach no label"
pub const LABEL_NONE: &str = "NONE";

/// One command to run, and how to turn its perfdata into metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    /// Command name known to the agent
    pub command: String,

    /// Arguments joined with `!`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub params: String,

    /// Metric type of perfdata metrics
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MetricKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// Comma-separated metric names, one per perfdata value slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_prefix: Option<String>,

    /// Label key carrying the perfdata field name (`NONE` for no label)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_name: Option<String>,

    /// Whether perfdata is turned into metrics at all
    #[serde(default = "default_perfdata")]
    pub perfdata: bool,
}

fn default_perfdata() -> bool {
    true
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: String::new(),
            kind: None,
            help: None,
            metric_name: None,
            metric_prefix: None,
            label_name: None,
            perfdata: true,
        }
    }

    pub fn params(mut self, params: impl Into<String>) -> Self {
        self.params = params.into();
        self
    }

    pub fn kind(mut self, kind: MetricKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn metric_name(mut self, names: impl Into<String>) -> Self {
        self.metric_name = Some(names.into());
        self
    }

    pub fn metric_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = Some(prefix.into());
        self
    }

    pub fn label_name(mut self, label: impl Into<String>) -> Self {
        self.label_name = Some(label.into());
        self
    }

    pub fn perfdata(mut self, enabled: bool) -> Self {
        self.perfdata = enabled;
        self
    }

    /// Arguments split out of `params`
    pub fn args(&self) -> Vec<String> {
        if self.params.is_empty() {
            return Vec::new();
        }
        self.params.split(ARG_SEPARATOR).map(str::to_string).collect()
    }

    /// The command sent to the agent
    pub fn to_command(&self) -> Command {
        Command::with_args(self.command.clone(), self.args())
    }

    /// Configured metric names in slot order, if any
    pub fn metric_names(&self) -> Option<Vec<&str>> {
        self.metric_name
            .as_deref()
            .filter(|names| !names.is_empty())
            .map(|names| names.split(',').map(str::trim).collect())
    }

    /// Non-empty metric prefix
    pub fn prefix(&self) -> Option<&str> {
        self.metric_prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// Non-empty label name (may be the `NONE` sentinel)
    pub fn label(&self) -> Option<&str> {
        self.label_name.as_deref().filter(|l| !l.is_empty())
    }

    pub fn is_label_none(&self) -> bool {
        self.label() == Some(LABEL_NONE)
    }

    pub fn help_or<'a>(&'a self, defaults: &'a NamingDefaults) -> &'a str {
        self.help
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&defaults.help)
    }

    pub fn kind_or(&self, defaults: &NamingDefaults) -> MetricKind {
        self.kind.unwrap_or(defaults.kind)
    }

    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(NrpeError::Config("missing command name".to_string()));
        }
        Ok(())
    }
}

/// A named list of commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub name: String,

    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

/// All profiles of a profiles file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profiles {
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

impl Profiles {
    /// Load and validate profiles from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NrpeError::Config(format!("Failed to read profiles file {}: {}", path.display(), e))
        })?;
        let profiles = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded {} profile(s) from {}",
            profiles.profiles.len(),
            path.display()
        );
        Ok(profiles)
    }

    /// Parse and validate profiles from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let profiles: Profiles = toml::from_str(content)?;
        profiles.validate()?;
        Ok(profiles)
    }

    fn validate(&self) -> Result<()> {
        if self.profiles.is_empty() {
            return Err(NrpeError::Config(
                "at least one profile must be defined".to_string(),
            ));
        }
        for profile in &self.profiles {
            if profile.name.is_empty() {
                return Err(NrpeError::Config("profile without a name".to_string()));
            }
            if profile.commands.is_empty() {
                return Err(NrpeError::Config(format!(
                    "no commands defined for profile {:?}",
                    profile.name
                )));
            }
            for command in &profile.commands {
                command.validate().map_err(|e| {
                    NrpeError::Config(format!("profile {:?}: {}", profile.name, e))
                })?;
            }
        }
        Ok(())
    }

    /// Look up a profile by name
    pub fn find(&self, name: &str) -> Result<&ProfileConfig> {
        if name.is_empty() {
            return Err(NrpeError::Config("undefined name specified".to_string()));
        }
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| NrpeError::Config(format!("profile not found '{}'", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// Render the profiles back to TOML
    pub fn dump(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NrpeError::Config(e.to_string()))
    }
}
