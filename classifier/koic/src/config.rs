use std::fs;
use std::path::{Path, PathBuf};

use koi_model::artifacts::{IMPUTATION_FILE, MODEL_FILE, SCHEMA_FILE};
use koi_model::ArtifactPaths;
use koi_pipeline::{AnalysisOptions, NarrativeConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "koi.toml";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config '{}' is not valid TOML: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imputation: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplainSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materiality_threshold: Option<f64>,
    /// `0` disables the additivity check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additivity_tolerance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
}

/// Contents of `koi.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub artifacts: ArtifactsSection,
    pub explain: ExplainSection,
    pub output: OutputSection,
}

impl Config {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Explicit path if given, else `koi.toml` in the working directory when
    /// present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(CONFIG_FILE);
                if local.is_file() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.explain.materiality_threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(ConfigError::Invalid {
                    key: "explain.materiality_threshold",
                    reason: format!("expected a non-negative number, got {t}"),
                });
            }
        }
        if let Some(t) = self.explain.additivity_tolerance {
            if !t.is_finite() || t < 0.0 {
                return Err(ConfigError::Invalid {
                    key: "explain.additivity_tolerance",
                    reason: format!("expected a non-negative number, got {t}"),
                });
            }
        }
        Ok(())
    }

    /// Artifact locations; `dir_override` replaces `[artifacts] dir`.
    /// Individual file entries are resolved against the directory.
    pub fn artifact_paths(&self, dir_override: Option<&Path>) -> ArtifactPaths {
        let dir = dir_override
            .map(Path::to_path_buf)
            .or_else(|| self.artifacts.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR));
        let pick = |file: &Option<PathBuf>, default: &str| match file {
            Some(f) => dir.join(f),
            None => dir.join(default),
        };
        ArtifactPaths {
            model: pick(&self.artifacts.model, MODEL_FILE),
            schema: pick(&self.artifacts.schema, SCHEMA_FILE),
            imputation: pick(&self.artifacts.imputation, IMPUTATION_FILE),
        }
    }

    pub fn narrative(&self, threshold_override: Option<f64>) -> NarrativeConfig {
        let mut config = NarrativeConfig::default();
        if let Some(t) = threshold_override.or(self.explain.materiality_threshold) {
            config.materiality_threshold = t;
        }
        config
    }

    pub fn analysis_options(&self, skip_additivity_check: bool) -> AnalysisOptions {
        let mut options = AnalysisOptions::default();
        if skip_additivity_check {
            options.additivity_tolerance = None;
        } else if let Some(t) = self.explain.additivity_tolerance {
            options.additivity_tolerance = if t == 0.0 { None } else { Some(t) };
        }
        options
    }

    pub fn format(&self, format_override: Option<OutputFormat>) -> OutputFormat {
        format_override.or(self.output.format).unwrap_or_default()
    }
}
