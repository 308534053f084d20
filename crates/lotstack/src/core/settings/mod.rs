//! Application Settings
//!
//! On-disk configuration at {data_dir}/settings.json. Loading is lenient:
//! a missing or mangled file degrades to defaults section by section (via
//! serde defaults) and value by value (via `sanitize`) instead of refusing
//! to start.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::clustering::ClusterConfig;
use crate::core::fs::atomic_write_json_pretty;
use crate::core::ingest::IngestConfig;
use crate::core::CoreResult;

/// Written schema version; bumped when the layout changes shape
pub const SETTINGS_VERSION: u32 = 1;

/// File name inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

// =============================================================================
// Settings Sections
// =============================================================================

/// Auto-clustering knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringSettings {
    /// Largest gap between consecutive photos in one stack, in seconds
    #[serde(default = "default_max_gap_seconds")]
    pub max_gap_seconds: u64,

    /// Largest number of photos per auto-clustered stack
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            max_gap_seconds: default_max_gap_seconds(),
            max_group_size: default_max_group_size(),
        }
    }
}

impl ClusteringSettings {
    /// Converts to the clustering engine configuration
    pub fn to_cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            max_gap: Duration::from_secs(self.max_gap_seconds),
            max_group_size: self.max_group_size,
        }
    }
}

fn default_max_gap_seconds() -> u64 {
    30
}

fn default_max_group_size() -> usize {
    4
}

/// Batch ingestion knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestSettings {
    /// Per-photo upload timeout in seconds
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_seconds: u64,

    /// Vision analysis timeout in seconds
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_seconds: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            upload_timeout_seconds: default_upload_timeout(),
            analysis_timeout_seconds: default_analysis_timeout(),
        }
    }
}

impl IngestSettings {
    /// Converts to the pipeline timeout configuration
    pub fn to_ingest_config(&self) -> IngestConfig {
        IngestConfig {
            upload_timeout: Duration::from_secs(self.upload_timeout_seconds),
            analysis_timeout: Duration::from_secs(self.analysis_timeout_seconds),
        }
    }
}

fn default_upload_timeout() -> u64 {
    60
}

fn default_analysis_timeout() -> u64 {
    120
}

/// Vision analysis selection.
///
/// API keys are read from the environment, never persisted here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    /// Provider name: "none", "mock", or "openai"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override for the provider
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "none".to_string()
}

/// Asset and catalog storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    /// Asset root directory; defaults to {app_data_dir}/assets
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Catalog database path; defaults to {app_data_dir}/catalog.db
    #[serde(default)]
    pub catalog_db: Option<PathBuf>,
}

// =============================================================================
// Aggregate
// =============================================================================

/// Everything the settings file holds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version the file was written with
    #[serde(default = "current_version")]
    pub version: u32,

    #[serde(default)]
    pub clustering: ClusteringSettings,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub analysis: AnalysisSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

fn current_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            clustering: ClusteringSettings::default(),
            ingest: IngestSettings::default(),
            analysis: AnalysisSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl AppSettings {
    /// Pulls every value back into its valid range and stamps the current
    /// schema version. Bad values are corrected, not rejected, so an old or
    /// hand-edited file never blocks startup.
    pub fn sanitize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.clustering.max_gap_seconds = self.clustering.max_gap_seconds.clamp(1, 3600);
        self.clustering.max_group_size = self.clustering.max_group_size.clamp(1, 24);

        self.ingest.upload_timeout_seconds = self.ingest.upload_timeout_seconds.clamp(5, 600);
        self.ingest.analysis_timeout_seconds = self.ingest.analysis_timeout_seconds.clamp(5, 900);

        let provider = self.analysis.provider.to_ascii_lowercase();
        self.analysis.provider = match provider.as_str() {
            "none" | "mock" | "openai" => provider,
            _ => default_provider(),
        };
    }
}

/// Default application data directory ({data_dir}/lotstack)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lotstack")
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Owns the settings file: load, save, reset
pub struct SettingsManager {
    path: PathBuf,
}

impl SettingsManager {
    /// Manager for the settings file inside `app_data_dir`
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            path: app_data_dir.join(SETTINGS_FILE),
        }
    }

    /// Where the settings file lives
    pub fn settings_path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads settings from disk. Any failure, including a missing file,
    /// yields defaults; the loaded value is always sanitized.
    pub fn load(&self) -> AppSettings {
        let mut settings = match self.parse_file() {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                info!("no settings file yet, starting from defaults");
                AppSettings::default()
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "unreadable settings, using defaults");
                AppSettings::default()
            }
        };

        if settings.version < SETTINGS_VERSION {
            // The schema has never changed shape; stamping the version in
            // sanitize() is the whole upgrade.
            info!(from = settings.version, to = SETTINGS_VERSION, "upgrading settings schema");
        }
        settings.sanitize();
        settings
    }

    fn parse_file(&self) -> CoreResult<Option<AppSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Sanitizes and writes settings atomically, returning what was written
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        let mut cleaned = settings.clone();
        cleaned.sanitize();

        atomic_write_json_pretty(&self.path, &cleaned)?;

        info!(path = %self.path.display(), "settings saved");
        Ok(cleaned)
    }

    /// Deletes the settings file so the next load starts clean
    pub fn reset(&self) -> CoreResult<AppSettings> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("settings file removed");
        }
        Ok(AppSettings::default())
    }
}
