//! Reporter configuration.
//!
//! Resolved once before a run and passed to the reporter; nothing in the
//! event path reads process-wide settings.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ReportError, Result};

/// Default directory for report files.
pub const DEFAULT_REPORT_DIR: &str = "target/pact/reports";

/// Default report file extension.
pub const DEFAULT_EXTENSION: &str = ".json";

/// Where and how reports are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReporterConfig {
    /// Directory receiving one report file per provider.
    pub report_dir: PathBuf,
    /// File extension, including the leading dot.
    pub extension: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            extension: DEFAULT_EXTENSION.to_owned(),
        }
    }
}

impl ReporterConfig {
    /// Configuration writing into `report_dir` with the default extension.
    #[must_use]
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            ..Self::default()
        }
    }

    /// Replaces the extension. A missing leading dot is added.
    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = normalize_extension(extension);
        self
    }

    /// Parses a TOML table with optional `report_dir` and `extension` keys.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] on invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;
        config.extension = normalize_extension(&config.extension);
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Report file for `provider`: `<report_dir>/<provider><extension>`.
    #[must_use]
    pub fn report_path(&self, provider: &str) -> PathBuf {
        self.report_dir.join(format!("{provider}{}", self.extension))
    }
}

fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_owned()
    } else {
        format!(".{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReporterConfig::default();
        assert_eq!(
            config.report_path("PricingService"),
            Path::new("target/pact/reports/PricingService.json")
        );
    }

    #[test]
    fn toml_overrides_and_normalizes() -> Result<()> {
        let config = ReporterConfig::from_toml_str("report_dir = \"out\"\nextension = \"txt\"\n")?;
        assert_eq!(config.report_path("P"), Path::new("out/P.txt"));
        Ok(())
    }

    #[test]
    fn empty_toml_is_default() -> Result<()> {
        assert_eq!(ReporterConfig::from_toml_str("")?, ReporterConfig::default());
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ReporterConfig::from_toml_str("broker_url = \"http://broker\"").err();
        assert!(matches!(err, Some(ReportError::Config(_))));
    }

    #[test]
    fn with_extension_adds_dot() {
        let config = ReporterConfig::new("r").with_extension("log");
        assert_eq!(config.extension, ".log");
    }
}
