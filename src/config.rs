//! TOML-based platform configuration with per-section defaults.
//!
//! Three independent sections feed two components: `[dd_import_export]` and
//! `[eurostag_ech_export]` hold the Eurostag dynamic-data export options,
//! `[sampler]` holds the Monte Carlo sampler runtime settings. A section (or
//! any key within it) missing from the file silently falls back to the
//! documented default; absence is never an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level platform configuration parsed from TOML.
///
/// All sections have defaults, so an empty file (or no file at all, via
/// [`Config::default`]) yields the documented default record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Eurostag dynamic-data import/export options.
    #[serde(default)]
    pub dd_import_export: DdExportConfig,
    /// Eurostag ECH network export options.
    #[serde(default)]
    pub eurostag_ech_export: EchExportConfig,
    /// Monte Carlo sampler runtime settings.
    #[serde(default)]
    pub sampler: SamplerConfig,
}

/// Eurostag dynamic-data import/export options.
///
/// A flat property bag: values are taken as-is, no validation is performed on
/// read. Fields are public so callers (and tests) can override individual
/// options after loading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DdExportConfig {
    /// Export A11 automata.
    pub automaton_a11: bool,
    /// Export A12 automata.
    pub automaton_a12: bool,
    /// Export A14 automata.
    pub automaton_a14: bool,
    /// Import/export RST secondary voltage regulation.
    pub import_export_rst: bool,
    /// Import/export ACMC shunt regulation.
    pub import_export_acmc: bool,
    /// Enable low-voltage load modeling.
    pub lv_load_modeling: bool,
    /// Name of the RST regulation injector entity.
    pub rst_regul_injector: String,
    /// Name of the RST regulation generator entity.
    pub rst_regul_generator: String,
    /// Name of the RST generator macroblock to delete on export.
    pub rst_regul_generator_delete: String,
    /// Name of the ACMC regulation entity.
    pub acmc_regul: String,
    /// Comma-separated list of RST pilot generators.
    pub rst_pilot_generators: String,
    /// Load pattern alpha coefficient.
    pub load_pattern_alpha: f32,
    /// Load pattern beta coefficient.
    pub load_pattern_beta: f32,
    /// Filter generator P/Q values on export.
    pub gens_pq_filter: bool,
}

impl Default for DdExportConfig {
    fn default() -> Self {
        Self {
            automaton_a11: false,
            automaton_a12: false,
            automaton_a14: false,
            import_export_rst: false,
            import_export_acmc: false,
            lv_load_modeling: false,
            rst_regul_injector: "RSTN_PCA".to_string(),
            rst_regul_generator: "APRTH1".to_string(),
            rst_regul_generator_delete: "CONSIG".to_string(),
            acmc_regul: "ACMC".to_string(),
            rst_pilot_generators: String::new(),
            load_pattern_alpha: 1.0,
            load_pattern_beta: 2.0,
            gens_pq_filter: false,
        }
    }
}

/// Eurostag ECH network export options, sourced from their own section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EchExportConfig {
    /// Export only the main connected component.
    pub export_main_cc_only: bool,
    /// Suppress switches on export.
    pub no_switch: bool,
}

/// Monte Carlo sampler runtime settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Directory for the staged per-network input artifact.
    pub tmp_dir: PathBuf,
    /// Directory containing the external sampler binary.
    pub binaries_dir: PathBuf,
    /// Root of the compiled runtime the external binary links against.
    pub runtime_home_dir: PathBuf,
    /// Keep per-run working directories for inspection.
    pub debug: bool,
    /// Copy the forecast-errors dataset into the working directory instead of
    /// passing its absolute path.
    pub copy_fe_file: bool,
    /// Sign-handling option forwarded verbatim to the external binary.
    pub option_sign: i32,
    /// Centering option forwarded verbatim to the external binary.
    pub centering: i32,
    /// Full-dependence option forwarded verbatim to the external binary.
    pub full_dependence: i32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tmp_dir: std::env::temp_dir(),
            binaries_dir: PathBuf::from("."),
            runtime_home_dir: PathBuf::from("."),
            debug: false,
            copy_fe_file: true,
            option_sign: 0,
            centering: 0,
            full_dependence: 0,
        }
    }
}

/// Configuration load failure: unreadable file or invalid TOML.
///
/// Missing sections and missing keys are not errors; they default.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config \"{path}\": {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Parses the platform configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or the TOML is
    /// invalid (including unknown keys).
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses the platform configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the TOML is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}
