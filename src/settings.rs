//! Monitoring settings.
//!
//! Settings are read-only once a context is created. They can be built in
//! code (every section implements `Default`) or loaded from TOML, in which
//! case they are validated at load time: format strings must parse and
//! assembly filters must compile.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogSeverity;
use crate::profile::number_format::NumberFormat;
use crate::reflect::attributes::UiPosition;
use crate::value::Color;

/// Root settings object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub names: NameSettings,
    pub formats: FormatSettings,
    pub palette: Palette,
    pub display: DisplaySettings,
    pub logging: LoggingSettings,
    pub scan: ScanSettings,
}

/// Label generation from member names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameSettings {
    /// Insert spaces at case transitions and underscores, capitalize words.
    pub humanize: bool,
    /// Variable-name prefixes stripped from labels, first match wins.
    pub variable_prefixes: Vec<String>,
    /// Prefix computed labels with the declaring type's short name.
    pub prefix_class_name: bool,
}

impl Default for NameSettings {
    fn default() -> Self {
        Self {
            humanize: true,
            variable_prefixes: vec!["m_".to_string(), "s_".to_string(), "k_".to_string(), "_".to_string()],
            prefix_class_name: false,
        }
    }
}

/// Process-wide number formats per value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub integer: String,
    pub float: String,
    pub double: String,
    pub vector: String,
    pub quaternion: String,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            integer: "G".to_string(),
            float: "F2".to_string(),
            double: "F2".to_string(),
            vector: "F2".to_string(),
            quaternion: "F2".to_string(),
        }
    }
}

/// Colors used by the built-in processors when rich text is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub true_color: Color,
    pub false_color: Color,
    pub null_color: Color,
    pub x_color: Color,
    pub y_color: Color,
    pub z_color: Color,
    pub w_color: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            true_color: Color::GREEN,
            false_color: Color::RED,
            null_color: Color::GRAY,
            x_color: Color::rgb(0xf2, 0x5f, 0x5c),
            y_color: Color::rgb(0x70, 0xc1, 0xb3),
            z_color: Color::rgb(0x24, 0x7b, 0xa0),
            w_color: Color::rgb(0xff, 0xe0, 0x66),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Emit `<color=#..>` markup from built-in processors.
    pub rich_text: bool,
    /// Text shown for null values.
    pub null_text: String,
    /// Elements listed under a collection header.
    pub max_collection_elements: usize,
    /// Event handles show the number of foreign subscribers.
    pub show_event_subscribers: bool,
    /// Event handles show the arguments of the last invocation.
    pub show_event_arguments: bool,
    pub default_position: UiPosition,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            rich_text: true,
            null_text: "null".to_string(),
            max_collection_elements: 16,
            show_event_subscribers: true,
            show_event_arguments: false,
            default_position: UiPosition::UpperLeft,
        }
    }
}

/// Severity per failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub processor_not_found: LogSeverity,
    pub invalid_processor_signature: LogSeverity,
    pub validator_not_found: LogSeverity,
    pub invalid_validator: LogSeverity,
    pub update_event_not_found: LogSeverity,
    pub invalid_format: LogSeverity,
    pub access_failure: LogSeverity,
    pub scan_failure: LogSeverity,
    pub cancellation: LogSeverity,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            processor_not_found: LogSeverity::Warning,
            invalid_processor_signature: LogSeverity::Warning,
            validator_not_found: LogSeverity::Warning,
            invalid_validator: LogSeverity::Warning,
            update_event_not_found: LogSeverity::Warning,
            invalid_format: LogSeverity::Warning,
            access_failure: LogSeverity::Error,
            scan_failure: LogSeverity::Error,
            cancellation: LogSeverity::Message,
        }
    }
}

impl LoggingSettings {
    /// Every kind silenced.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            processor_not_found: LogSeverity::None,
            invalid_processor_signature: LogSeverity::None,
            validator_not_found: LogSeverity::None,
            invalid_validator: LogSeverity::None,
            update_event_not_found: LogSeverity::None,
            invalid_format: LogSeverity::None,
            access_failure: LogSeverity::None,
            scan_failure: LogSeverity::None,
            cancellation: LogSeverity::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Regex patterns; assemblies whose name matches any are skipped.
    pub banned_assemblies: Vec<String>,
    /// Monitor annotated members that are not public.
    pub include_non_public: bool,
    /// Maximum number of in-parameters a monitored method may take.
    pub max_method_arity: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            banned_assemblies: vec![r"^std$".to_string(), r"^core$".to_string()],
            include_non_public: true,
            max_method_arity: 2,
        }
    }
}

impl ScanSettings {
    /// Compiles the assembly filters.
    pub fn compile_filters(&self) -> Result<Vec<Regex>, ConfigError> {
        self.banned_assemblies
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidFilter {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

impl MonitorSettings {
    /// Parses and validates settings from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks that every format string parses and every filter compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let formats = [
            ("formats.integer", &self.formats.integer),
            ("formats.float", &self.formats.float),
            ("formats.double", &self.formats.double),
            ("formats.vector", &self.formats.vector),
            ("formats.quaternion", &self.formats.quaternion),
        ];
        for (key, format) in formats {
            NumberFormat::parse(format).map_err(|source| ConfigError::InvalidFormat {
                key: key.to_string(),
                source,
            })?;
        }
        self.scan.compile_filters()?;
        Ok(())
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_settings_validate() {
        MonitorSettings::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = MonitorSettings::from_toml_str(
            r##"
            [names]
            humanize = false

            [formats]
            float = "F4"

            [palette]
            true_color = "#00FF00"

            [logging]
            access_failure = "exception"
            "##,
        )
        .unwrap();

        assert!(!settings.names.humanize);
        assert_eq!(settings.names.variable_prefixes, NameSettings::default().variable_prefixes);
        assert_eq!(settings.formats.float, "F4");
        assert_eq!(settings.formats.double, "F2");
        assert_eq!(settings.palette.true_color, Color::rgb(0, 255, 0));
        assert_eq!(settings.logging.access_failure, LogSeverity::Exception);
        assert_eq!(settings.logging.scan_failure, LogSeverity::Error);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let err = MonitorSettings::from_toml_str("[formats]\nfloat = \"Q7\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { ref key, .. } if key == "formats.float"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let err = MonitorSettings::from_toml_str("[scan]\nbanned_assemblies = [\"(\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFilter { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[display]\nrich_text = false\nnull_text = \"-\"").unwrap();

        let settings = MonitorSettings::load(file.path()).unwrap();
        assert!(!settings.display.rich_text);
        assert_eq!(settings.display.null_text, "-");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MonitorSettings::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_toml_round_trip_defaults() {
        let settings = MonitorSettings::default();
        let text = settings.to_toml_string().unwrap();
        assert_eq!(MonitorSettings::from_toml_str(&text).unwrap(), settings);
    }
}
