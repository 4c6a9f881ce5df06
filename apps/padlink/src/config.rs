// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use padlink_core::{DotDetails, NodeSpec, PortSpec};
use padlink_engine::{EngineScript, PipelineConfig, ScriptedPort};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Media the default topology decodes.
pub const DEFAULT_URI: &str =
    "https://www.freedesktop.org/software/gstreamer-sdk/data/media/sintel_trailer-480p.webm";

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format
    #[default]
    Text,
    /// JSON format (structured, better for log aggregation)
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LogConfig {
    #[serde(default)]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    /// Format for file logging: "text" (default) or "json"
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Debug,
            file_path: "./padlink.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

/// Where graph snapshots are written.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct DiagnosticsConfig {
    /// Directory for `.dot` snapshot files. Snapshots are disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dot_dir: Option<String>,
    /// Detail level: "minimal", "media-types" or "all".
    #[serde(default)]
    pub details: DotDetails,
}

/// A static link. Both ends are either node names (first free ports are used) or
/// `node.port` addresses.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct LinkConfig {
    pub from: String,
    pub to: String,
}

/// Links ports that `source` exposes at runtime to the waiting `target` input.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct BindingConfig {
    pub source: String,
    /// Input port address, e.g. `convert.sink`.
    pub target: String,
    /// Required media type category, e.g. `video/x-raw`. A trailing `*` is allowed.
    pub accepts: String,
    /// Name of the timestamped snapshot taken after each successful link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_label: Option<String>,
}

/// Topology and scripted media behaviour.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct PipelineSection {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    /// Name of the snapshot taken right before playing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_snapshot: Option<String>,
    #[serde(default)]
    pub script: EngineScript,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            nodes: Vec::new(),
            links: Vec::new(),
            bindings: Vec::new(),
            initial_snapshot: None,
            script: EngineScript::default(),
        }
    }
}

impl PipelineSection {
    /// Decoder feeding a converter and a video sink, with the decoder's video output
    /// linked at runtime. Used when no config file exists.
    pub fn tutorial() -> Self {
        Self {
            name: "test-pipeline".to_string(),
            nodes: vec![
                NodeSpec::new("source", "uridecodebin").with_property("uri", DEFAULT_URI),
                NodeSpec::new("convert", "videoconvert")
                    .with_port(PortSpec::input("sink"))
                    .with_port(PortSpec::output("src")),
                NodeSpec::new("sink", "autovideosink").with_port(PortSpec::input("sink")),
            ],
            links: vec![LinkConfig { from: "convert".to_string(), to: "sink".to_string() }],
            bindings: vec![BindingConfig {
                source: "source".to_string(),
                target: "convert.sink".to_string(),
                accepts: "video/x-raw".to_string(),
                snapshot_label: Some("pad_linked_state".to_string()),
            }],
            initial_snapshot: Some("initial_state".to_string()),
            script: EngineScript {
                discoveries: vec![
                    ScriptedPort {
                        node: "source".to_string(),
                        port: "src_0".to_string(),
                        media_type: Some("video/x-raw, format=I420, width=854, height=480".to_string()),
                        delay_ms: 40,
                        negotiate_after_ms: None,
                    },
                    ScriptedPort {
                        node: "source".to_string(),
                        port: "src_1".to_string(),
                        media_type: Some(
                            "audio/x-raw, format=F32LE, layout=interleaved, rate=48000, channels=2".to_string(),
                        ),
                        delay_ms: 45,
                        negotiate_after_ms: None,
                    },
                ],
                ..EngineScript::default()
            },
        }
    }
}

/// Root configuration for padlink.
#[derive(Deserialize, Serialize, Default, Debug, Clone, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub engine: PipelineConfig,
}

impl Config {
    /// Defaults plus the tutorial topology.
    pub fn tutorial() -> Self {
        Self { pipeline: PipelineSection::tutorial(), ..Self::default() }
    }
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads the configuration from defaults, a TOML file, and `PADLINK_` environment
/// variables (`__` separates nested keys, e.g. `PADLINK_DIAGNOSTICS__DOT_DIR`).
///
/// The tutorial topology is only the base layer when the file is missing. A config
/// file describes its topology on its own.
///
/// # Errors
///
/// Returns an error if the file exists but is invalid, or if environment variables
/// contain values of the wrong type.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let file_exists = std::path::Path::new(config_path).exists();
    let base = if file_exists { Config::default() } else { Config::tutorial() };
    let mut figment = Figment::new().merge(figment::providers::Serialized::defaults(base));

    let mut file_missing = None;

    // A missing file is not an error; the tutorial describes a runnable pipeline.
    if file_exists {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("PADLINK_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration, tutorial topology included, as a
/// pretty-printed TOML string.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized to TOML.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::tutorial())
}
