use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cost::DEFAULT_PRICE_PER_TERABYTE;
use crate::gate::{
    BATCH_CEILING, GateMode, INTERACTIVE_SAFETY_CEILING, NonInteractivePolicy, ThresholdGate,
};
use crate::warehouse::BqCli;
use crate::{AppError, Result};

pub const SETTINGS_FILE: &str = "bq-utils.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub warehouse: WarehouseSettings,
    #[serde(default)]
    pub interactive: InteractiveSettings,
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(default)]
    pub view: ViewSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSettings {
    /// Program and leading arguments used to invoke the warehouse tool
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    #[serde(default = "default_price", rename = "price-per-terabyte")]
    pub price_per_terabyte: f64,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            price_per_terabyte: default_price(),
        }
    }
}

fn default_command() -> Vec<String> {
    vec!["bq".to_string()]
}

fn default_price() -> f64 {
    DEFAULT_PRICE_PER_TERABYTE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveSettings {
    #[serde(default = "default_interactive_ceiling")]
    pub ceiling: u64,
}

impl Default for InteractiveSettings {
    fn default() -> Self {
        Self {
            ceiling: default_interactive_ceiling(),
        }
    }
}

fn default_interactive_ceiling() -> u64 {
    INTERACTIVE_SAFETY_CEILING
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_batch_ceiling")]
    pub ceiling: u64,
    #[serde(default)]
    pub policy: NonInteractivePolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            ceiling: default_batch_ceiling(),
            policy: NonInteractivePolicy::default(),
        }
    }
}

fn default_batch_ceiling() -> u64 {
    BATCH_CEILING
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default)]
    pub project: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            project: String::new(),
            dataset: default_dataset(),
        }
    }
}

fn default_dataset() -> String {
    "mcp".to_string()
}

impl Settings {
    /// Load `bq-utils.toml` from the working directory, defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    pub fn client(&self) -> Result<BqCli> {
        BqCli::from_command(&self.warehouse.command)
    }

    pub fn interactive_gate(&self) -> ThresholdGate {
        ThresholdGate::interactive_safety().with_ceiling(self.interactive.ceiling)
    }

    pub fn batch_gate(&self) -> ThresholdGate {
        ThresholdGate::batch()
            .with_ceiling(self.batch.ceiling)
            .with_mode(GateMode::NonInteractive(self.batch.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_settings_file_constant() {
        assert_eq!(SETTINGS_FILE, "bq-utils.toml");
    }

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();

        assert_eq!(settings.warehouse.command, vec!["bq".to_string()]);
        assert_eq!(settings.warehouse.price_per_terabyte, 5.0);
        assert_eq!(settings.interactive.ceiling, 104_857_600);
        assert_eq!(settings.batch.ceiling, 15_000_000_000);
        assert_eq!(settings.batch.policy, NonInteractivePolicy::AutoAllow);
        assert!(settings.view.project.is_empty());
        assert_eq!(settings.view.dataset, "mcp");
    }

    #[test]
    fn test_settings_deserialization() {
        let toml_content = r#"
[warehouse]
command = ["bq", "--project_id=demo"]
price-per-terabyte = 6.25

[interactive]
ceiling = 10485760

[batch]
ceiling = 20000000000
policy = "auto-deny"

[view]
project = "demo"
dataset = "analytics"
"#;

        let settings: Settings = toml::from_str(toml_content).unwrap();

        assert_eq!(settings.warehouse.command, vec!["bq", "--project_id=demo"]);
        assert_eq!(settings.warehouse.price_per_terabyte, 6.25);
        assert_eq!(settings.interactive.ceiling, 10_485_760);
        assert_eq!(settings.batch.ceiling, 20_000_000_000);
        assert_eq!(settings.batch.policy, NonInteractivePolicy::AutoDeny);
        assert_eq!(settings.view.project, "demo");
        assert_eq!(settings.view.dataset, "analytics");
    }

    #[test]
    fn test_settings_deserialization_empty() {
        let settings: Settings = toml::from_str("").unwrap();

        assert_eq!(settings.warehouse.command, vec!["bq".to_string()]);
        assert_eq!(settings.interactive.ceiling, INTERACTIVE_SAFETY_CEILING);
    }

    #[test]
    fn test_settings_deserialization_partial_section() {
        let toml_content = r#"
[batch]
policy = "auto-deny"
"#;

        let settings: Settings = toml::from_str(toml_content).unwrap();

        assert_eq!(settings.batch.ceiling, BATCH_CEILING);
        assert_eq!(settings.batch.policy, NonInteractivePolicy::AutoDeny);
        assert_eq!(settings.view.dataset, "mcp");
    }

    #[test]
    fn test_gates_from_settings() {
        let mut settings = Settings::default();
        settings.interactive.ceiling = 42;
        settings.batch.policy = NonInteractivePolicy::AutoDeny;

        let interactive = settings.interactive_gate();
        assert_eq!(interactive.ceiling, 42);
        assert_eq!(interactive.mode, GateMode::Interactive);

        let batch = settings.batch_gate();
        assert_eq!(batch.ceiling, BATCH_CEILING);
        assert_eq!(
            batch.mode,
            GateMode::NonInteractive(NonInteractivePolicy::AutoDeny)
        );
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let mut settings = Settings::default();
        settings.warehouse.command.clear();

        assert!(matches!(settings.client(), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(settings.interactive.ceiling, INTERACTIVE_SAFETY_CEILING);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[interactive]\nceiling = 1024").unwrap();

        let settings = Settings::load_from(file.path()).unwrap();

        assert_eq!(settings.interactive.ceiling, 1024);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[interactive\nceiling = ").unwrap();

        assert!(matches!(
            Settings::load_from(file.path()),
            Err(AppError::TomlParse(_))
        ));
    }
}
