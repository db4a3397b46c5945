//! Forecast-errors data store: precomputed statistical datasets used by the
//! external sampler to generate plausible deviations.
//!
//! Datasets are keyed by `(analysis id, time horizon)`. Their internal format
//! belongs to the external tool; this crate only locates, copies and describes
//! them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

/// A labeled forecasting interval selecting which dataset variant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeHorizon {
    /// Day-ahead forecast.
    DayAhead,
    /// Intraday forecast.
    Intraday,
}

impl TimeHorizon {
    /// Human-readable name, used in log and error messages.
    pub fn name(self) -> &'static str {
        match self {
            TimeHorizon::DayAhead => "day-ahead",
            TimeHorizon::Intraday => "intraday",
        }
    }

    /// Short label, used in file names.
    pub fn label(self) -> &'static str {
        match self {
            TimeHorizon::DayAhead => "DACF",
            TimeHorizon::Intraday => "IDCF",
        }
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeHorizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day-ahead" | "DACF" => Ok(TimeHorizon::DayAhead),
            "intraday" | "IDCF" => Ok(TimeHorizon::Intraday),
            other => Err(format!(
                "unknown time horizon \"{other}\", expected \"day-ahead\" or \"intraday\""
            )),
        }
    }
}

/// Metadata describing one forecast-errors analysis dataset.
#[derive(Debug, Clone)]
pub struct FeaParameters {
    /// Identifier of the forecast-errors analysis that produced the dataset.
    pub analysis_id: String,
    /// Time horizon the dataset was built for.
    pub time_horizon: TimeHorizon,
    /// Number of offline samples available in the dataset.
    pub n_samples: usize,
}

/// Forecast-errors store failure.
#[derive(Debug, thiserror::Error)]
pub enum FeaStoreError {
    #[error("no forecast offline samples data available for analysis \"{analysis_id}\", {time_horizon} time horizon")]
    NotFound {
        analysis_id: String,
        time_horizon: TimeHorizon,
    },
    #[error("forecast-errors store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid dataset parameters file \"{path}\": {message}")]
    Parameters { path: PathBuf, message: String },
}

/// External collaborator holding forecast-errors datasets.
///
/// The sampler only needs availability checks, sample-count metadata and a way
/// to reach the dataset file, either by copying it into a working directory or
/// by absolute path.
pub trait ForecastErrorsStore {
    /// Whether a dataset exists for the given analysis id and time horizon.
    fn is_available(&self, analysis_id: &str, time_horizon: TimeHorizon) -> bool;

    /// Dataset metadata.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is absent or its metadata cannot be read.
    fn parameters(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
    ) -> Result<FeaParameters, FeaStoreError>;

    /// Copies the dataset file to `dest`.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is absent or the copy fails.
    fn copy_dataset(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
        dest: &Path,
    ) -> Result<(), FeaStoreError>;

    /// Absolute path of the dataset file, for callers that reference it in
    /// place instead of copying.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is absent.
    fn dataset_path(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
    ) -> Result<PathBuf, FeaStoreError>;
}

/// Sidecar metadata file layout (`parameters_<label>.toml`).
#[derive(Debug, Deserialize)]
struct ParametersFile {
    n_samples: usize,
}

/// Filesystem-backed forecast-errors store.
///
/// Layout: `<root>/<analysis_id>/offline_samples_<label>.dat` for the dataset
/// itself, with an adjacent `parameters_<label>.toml` describing it.
#[derive(Debug, Clone)]
pub struct DirForecastErrorsStore {
    root: PathBuf,
}

impl DirForecastErrorsStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dataset_file(&self, analysis_id: &str, time_horizon: TimeHorizon) -> PathBuf {
        self.root
            .join(analysis_id)
            .join(format!("offline_samples_{}.dat", time_horizon.label()))
    }

    fn parameters_file(&self, analysis_id: &str, time_horizon: TimeHorizon) -> PathBuf {
        self.root
            .join(analysis_id)
            .join(format!("parameters_{}.toml", time_horizon.label()))
    }

    fn require_available(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
    ) -> Result<(), FeaStoreError> {
        if self.is_available(analysis_id, time_horizon) {
            Ok(())
        } else {
            Err(FeaStoreError::NotFound {
                analysis_id: analysis_id.to_string(),
                time_horizon,
            })
        }
    }
}

impl ForecastErrorsStore for DirForecastErrorsStore {
    fn is_available(&self, analysis_id: &str, time_horizon: TimeHorizon) -> bool {
        self.dataset_file(analysis_id, time_horizon).is_file()
    }

    fn parameters(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
    ) -> Result<FeaParameters, FeaStoreError> {
        self.require_available(analysis_id, time_horizon)?;
        let path = self.parameters_file(analysis_id, time_horizon);
        let content = std::fs::read_to_string(&path)?;
        let parsed: ParametersFile =
            toml::from_str(&content).map_err(|e| FeaStoreError::Parameters {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(FeaParameters {
            analysis_id: analysis_id.to_string(),
            time_horizon,
            n_samples: parsed.n_samples,
        })
    }

    fn copy_dataset(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
        dest: &Path,
    ) -> Result<(), FeaStoreError> {
        self.require_available(analysis_id, time_horizon)?;
        std::fs::copy(self.dataset_file(analysis_id, time_horizon), dest)?;
        Ok(())
    }

    fn dataset_path(
        &self,
        analysis_id: &str,
        time_horizon: TimeHorizon,
    ) -> Result<PathBuf, FeaStoreError> {
        self.require_available(analysis_id, time_horizon)?;
        Ok(self.dataset_file(analysis_id, time_horizon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seeded_store(n_samples: usize) -> (tempfile::TempDir, DirForecastErrorsStore) {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let analysis_dir = dir.path().join("fea-1");
        fs::create_dir_all(&analysis_dir).expect("analysis dir should be created");
        fs::write(analysis_dir.join("offline_samples_DACF.dat"), b"dataset")
            .expect("dataset should be written");
        fs::write(
            analysis_dir.join("parameters_DACF.toml"),
            format!("n_samples = {n_samples}\n"),
        )
        .expect("parameters should be written");
        let store = DirForecastErrorsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn availability_tracks_dataset_file() {
        let (_dir, store) = seeded_store(10);
        assert!(store.is_available("fea-1", TimeHorizon::DayAhead));
        assert!(!store.is_available("fea-1", TimeHorizon::Intraday));
        assert!(!store.is_available("fea-2", TimeHorizon::DayAhead));
    }

    #[test]
    fn parameters_report_sample_count() {
        let (_dir, store) = seeded_store(250);
        let params = store
            .parameters("fea-1", TimeHorizon::DayAhead)
            .expect("parameters should load");
        assert_eq!(params.n_samples, 250);
        assert_eq!(params.analysis_id, "fea-1");
        assert_eq!(params.time_horizon, TimeHorizon::DayAhead);
    }

    #[test]
    fn missing_dataset_is_not_found() {
        let (_dir, store) = seeded_store(10);
        let err = store.parameters("absent", TimeHorizon::DayAhead);
        assert!(matches!(err, Err(FeaStoreError::NotFound { .. })));
    }

    #[test]
    fn copy_dataset_materializes_the_file() {
        let (_dir, store) = seeded_store(10);
        let dest_dir = tempfile::tempdir().expect("tempdir should be created");
        let dest = dest_dir.path().join("staged.dat");
        store
            .copy_dataset("fea-1", TimeHorizon::DayAhead, &dest)
            .expect("copy should succeed");
        assert_eq!(fs::read(&dest).expect("staged file should exist"), b"dataset");
    }

    #[test]
    fn time_horizon_parses_names_and_labels() {
        assert_eq!("day-ahead".parse::<TimeHorizon>(), Ok(TimeHorizon::DayAhead));
        assert_eq!("IDCF".parse::<TimeHorizon>(), Ok(TimeHorizon::Intraday));
        assert!("weekly".parse::<TimeHorizon>().is_err());
    }
}
