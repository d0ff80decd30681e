//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione di un batch di compressione.
//!
//! ## Responsabilità:
//! - Definisce `CompressionRequest`, costruita una volta per batch e mai mutata
//! - Definisce i preset `QualityProfile` e le modalità `OutputMode`
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `input_root`: Radice dell'albero sorgente (usata in modalità mirror)
//! - `output_root`: Radice dell'albero di output (modalità mirror)
//! - `lossless`: Compressione senza perdita (default: false)
//! - `quality`: Qualità 1-100 (default: 80)
//! - `profile`: Preset high / balanced / strong (default: high)
//! - `output_mode`: mirror o same_dir (default: mirror)
//! - `formats`: Estensioni accettate durante la discovery
//!
//! ## Esempio:
//! ```rust
//! use imgcompress::config::{CompressionRequest, QualityProfile};
//!
//! let request = CompressionRequest {
//!     quality: 70,
//!     profile: QualityProfile::Balanced,
//!     ..Default::default()
//! };
//! request.validate().unwrap();
//! ```

use crate::error::{CompressError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension tokens handled by the default engine registry.
pub const DEFAULT_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Named preset that modulates how hard quality, palette and lossy
/// parameters are pushed beyond the raw quality value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    #[default]
    High,
    Balanced,
    Strong,
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Balanced => "balanced",
            Self::Strong => "strong",
        };
        f.write_str(name)
    }
}

/// Where compressed files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Replicate the input tree under `output_root`
    #[default]
    Mirror,
    /// Write next to the source, disambiguated on collision
    SameDir,
}

/// Per-batch compression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionRequest {
    /// Root of the source tree
    pub input_root: PathBuf,
    /// Root of the output tree (mirror mode)
    pub output_root: PathBuf,
    /// Preserve pixel data exactly
    pub lossless: bool,
    /// Quality (1-100)
    pub quality: u8,
    /// Quality profile
    pub profile: QualityProfile,
    /// Output placement
    pub output_mode: OutputMode,
    /// Extension tokens (lowercase, no leading dot) accepted during discovery
    pub formats: BTreeSet<String>,
}

impl Default for CompressionRequest {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("."),
            output_root: PathBuf::from("compressed"),
            lossless: false,
            quality: 80,
            profile: QualityProfile::High,
            output_mode: OutputMode::Mirror,
            formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl CompressionRequest {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(CompressError::Validation(
                "Quality must be between 1 and 100".to_string(),
            ));
        }

        if self.formats.is_empty() {
            return Err(CompressError::Validation(
                "At least one format must be enabled".to_string(),
            ));
        }

        if let Some(bad) = self
            .formats
            .iter()
            .find(|f| f.is_empty() || f.starts_with('.') || f.chars().any(|c| c.is_ascii_uppercase()))
        {
            return Err(CompressError::Validation(format!(
                "Format tokens must be lowercase without a leading dot: {:?}",
                bad
            )));
        }

        if self.output_mode == OutputMode::Mirror && self.output_root.as_os_str().is_empty() {
            return Err(CompressError::Validation(
                "Mirror mode requires an output root".to_string(),
            ));
        }

        Ok(())
    }

    /// Replaces the format set, normalising each entry to a bare lowercase token.
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.formats = formats
            .into_iter()
            .map(|f| f.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    /// Whether discovery should pick up this file.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| self.formats.contains(&ext))
            .unwrap_or(false)
    }

    /// Load configuration from file; a missing file is an error
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Err(CompressError::Config(format!("config file not found: {}", path.display())).into());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let request: CompressionRequest = serde_json::from_str(&content)
            .map_err(|e| CompressError::Config(format!("{}: {}", path.display(), e)))?;
        request.validate()?;
        Ok(request)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
