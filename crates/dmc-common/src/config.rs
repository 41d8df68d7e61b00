//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Shared primitives and utilities for the media controller client."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Name of the display target every installation provides.
pub const DEFAULT_TARGET: &str = "default";

fn default_endpoint() -> String {
    "http://[::1]:50051".to_owned()
}

fn default_targets() -> Vec<String> {
    vec![DEFAULT_TARGET.to_owned()]
}

fn default_rpc_timeout() -> Duration {
    Duration::from_millis(5_000)
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(2_000)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

/// Primary configuration object for the media controller client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// URI of the remote media controller.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Display targets known to this installation.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
    /// Reject removal of slides the calling context never showed.
    #[serde(default)]
    pub strict_removal: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub slides: IndexMap<String, SlideDefinitionConfig>,
    #[serde(default)]
    pub widgets: IndexMap<String, WidgetDefinitionConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "DMC_CONFIG";

    /// Load configuration from disk, respecting the `DMC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Whether `target` is one of the configured display targets.
    pub fn has_target(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t == target)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(anyhow!("endpoint must not be empty"));
        }
        if !self.has_target(DEFAULT_TARGET) {
            return Err(anyhow!(
                "targets must include the '{}' target",
                DEFAULT_TARGET
            ));
        }
        self.rpc.validate()?;
        for (name, widget) in &self.widgets {
            widget.validate(name)?;
        }
        for (name, slide) in &self.slides {
            for widget in &slide.widgets {
                if !self.widgets.contains_key(widget) {
                    return Err(anyhow!(
                        "slide '{}' references undefined widget '{}'",
                        name,
                        widget
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            rpc: RpcConfig::default(),
            targets: default_targets(),
            strict_removal: false,
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            slides: IndexMap::new(),
            widgets: IndexMap::new(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Upper bound for a single request/response exchange.
    #[serde(rename = "timeout_ms", default = "default_rpc_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
    #[serde(rename = "connect_timeout_ms", default = "default_connect_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_timeout: Duration,
}

impl RpcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(anyhow!("rpc.timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: default_rpc_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Also write a rolling daily JSON log under `directory`.
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// A slide built from named widget definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlideDefinitionConfig {
    #[serde(default)]
    pub widgets: Vec<String>,
}

/// Placement plus exactly one visual kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WidgetDefinitionConfig {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: i32,
    #[serde(default)]
    pub rectangle: Option<RectangleConfig>,
    #[serde(default)]
    pub label: Option<LabelConfig>,
    #[serde(default)]
    pub image: Option<MediaConfig>,
    #[serde(default)]
    pub video: Option<MediaConfig>,
    #[serde(default)]
    pub line: Option<LineConfig>,
}

impl WidgetDefinitionConfig {
    pub fn validate(&self, name: &str) -> Result<()> {
        let kinds = [
            self.rectangle.is_some(),
            self.label.is_some(),
            self.image.is_some(),
            self.video.is_some(),
            self.line.is_some(),
        ];
        match kinds.iter().filter(|set| **set).count() {
            1 => Ok(()),
            0 => Err(anyhow!("widget '{}' does not declare a kind", name)),
            _ => Err(anyhow!("widget '{}' declares more than one kind", name)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectangleConfig {
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    /// May contain `{key}` placeholders filled from the play parameters.
    pub text: String,
    #[serde(default)]
    pub font_name: String,
    #[serde(default)]
    pub font_size: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(default)]
    pub width: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
endpoint = "http://127.0.0.1:50051"
strict_removal = true

[rpc]
timeout_ms = 250

[slides.intro]
widgets = ["title"]

[widgets.title]
x = 20.0
y = 150.0
z = 5

[widgets.title.label]
text = "Hello {player.name}"
font_size = 32.0
"#;

    #[test]
    fn parses_sample_configuration() {
        let config: AppConfig = SAMPLE.parse().expect("valid config");
        assert_eq!(config.endpoint, "http://127.0.0.1:50051");
        assert_eq!(config.rpc.timeout, Duration::from_millis(250));
        assert_eq!(config.rpc.connect_timeout, default_connect_timeout());
        assert_eq!(config.targets, vec![DEFAULT_TARGET.to_owned()]);
        assert!(config.strict_removal);
        assert_eq!(config.slides["intro"].widgets, vec!["title".to_owned()]);
        let label = config.widgets["title"].label.as_ref().expect("label kind");
        assert_eq!(label.color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn rejects_slide_with_unknown_widget() {
        let err = r#"
[slides.intro]
widgets = ["missing"]
"#
        .parse::<AppConfig>()
        .unwrap_err();
        assert!(err.to_string().contains("undefined widget 'missing'"));
    }

    #[test]
    fn rejects_widget_with_two_kinds() {
        let err = r#"
[widgets.both.image]
path = "a.png"

[widgets.both.video]
path = "a.mp4"
"#
        .parse::<AppConfig>()
        .unwrap_err();
        assert!(err.to_string().contains("more than one kind"));
    }

    #[test]
    fn requires_default_target() {
        let err = r#"targets = ["playfield"]"#.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("'default'"));
    }

    #[test]
    fn load_with_source_picks_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dmc.toml");
        fs::write(&path, "targets = [\"default\", \"backbox\"]\n").expect("write config");
        let missing = dir.path().join("missing.toml");

        let loaded = AppConfig::load_with_source(&[missing, path.clone()]).expect("loads");
        assert_eq!(loaded.source, path);
        assert!(loaded.config.has_target("backbox"));
    }
}
