//! Monte Carlo sampler orchestrator.
//!
//! Sequential, blocking orchestration around one external computation:
//! `init` validates the request against the forecast-errors store and stages
//! the per-network input artifact; the first `sample()` call runs the
//! external tool once to obtain the whole batch; every `sample()` call then
//! draws exactly one row and writes it into the network working state.
//!
//! Ordering contract: generator and load enumeration order captured at `init`
//! must match the order used when the referenced forecast-errors dataset was
//! built. That contract is fixed outside this crate and is not verifiable
//! here.

pub mod input;
pub mod output;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::SamplerConfig;
use crate::exec::{ExecError, ProcessRunner, ToolCommand};
use crate::fea::{FeaStoreError, ForecastErrorsStore, TimeHorizon};
use crate::network::Network;
use output::{OutputParseError, SampleRow, SampledBatch};

/// Name of the external sampler executable inside the binaries directory.
const TOOL_NAME: &str = "mcla";

/// Prefix of staged input artifacts and working-directory copies.
const INPUT_FILE_PREFIX: &str = "mcsinput_";

/// Prefix of per-run working directories.
const WORKING_DIR_PREFIX: &str = "montecarlo_sampler_";

/// Reactive-power sanity threshold (Mvar). Sampled load Q above this
/// magnitude is discarded in favor of the pre-existing value so that
/// downstream power flows keep converging. The figure comes from the dataset
/// provider; it is advisory, not derived from network data.
pub const DEFAULT_Q_THRESHOLD_MVAR: f64 = 1000.0;

/// Request parameters for one sampler instance.
#[derive(Debug, Clone)]
pub struct SamplerParameters {
    /// Time horizon selecting the dataset variant.
    pub time_horizon: TimeHorizon,
    /// Forecast-errors analysis identifier.
    pub analysis_id: String,
    /// Number of samples to draw; must be in `(0, available]`.
    pub n_samples: usize,
}

/// Sampler failure. Everything here is fatal for the instance; per-value
/// sanity violations are logged advisories instead and never surface as
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("sampler for network \"{network_id}\" not initialized")]
    NotInitialized { network_id: String },
    #[error("sampler for network \"{network_id}\" already initialized")]
    AlreadyInitialized { network_id: String },
    #[error(
        "network \"{network_id}\": no forecast offline samples data available for analysis \"{analysis_id}\", {time_horizon} time horizon"
    )]
    DataNotAvailable {
        network_id: String,
        analysis_id: String,
        time_horizon: TimeHorizon,
    },
    #[error(
        "network \"{network_id}\": requested {requested} samples, available {available} (analysis \"{analysis_id}\", {time_horizon} time horizon)"
    )]
    SampleCountOutOfRange {
        network_id: String,
        analysis_id: String,
        time_horizon: TimeHorizon,
        requested: usize,
        available: usize,
    },
    #[error(
        "network \"{network_id}\": reached max number of samples {n_samples} (analysis \"{analysis_id}\")"
    )]
    Exhausted {
        network_id: String,
        analysis_id: String,
        n_samples: usize,
    },
    #[error(transparent)]
    Store(#[from] FeaStoreError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("sampler output parsing failed: {0}")]
    OutputParse(#[from] OutputParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a sampler instance. Calls outside valid transitions fail.
#[derive(Debug)]
enum Phase {
    Uninitialized,
    Initialized,
    /// `drawn` rows have been extracted from the batch so far.
    Sampling { drawn: usize },
    Exhausted,
}

/// State captured at `init` and fixed for the instance lifetime.
#[derive(Debug)]
struct InitState {
    time_horizon: TimeHorizon,
    analysis_id: String,
    n_samples: usize,
    connected_generator_ids: Vec<String>,
    connected_load_ids: Vec<String>,
    staged_input: PathBuf,
    /// Present after the single external run.
    batch: Option<SampledBatch>,
}

/// Monte Carlo sampler bound to one network working state.
///
/// The network is externally owned; the sampler only mutates named power
/// fields in place, under the caller's concurrency discipline. The `&mut
/// self` receivers serialize reentrant use; nothing is shared between
/// instances.
pub struct MontecarloSampler<'a, S, R> {
    network: &'a mut Network,
    store: &'a S,
    runner: R,
    config: SamplerConfig,
    q_threshold: f64,
    phase: Phase,
    init: Option<InitState>,
}

impl<'a, S: ForecastErrorsStore, R: ProcessRunner> MontecarloSampler<'a, S, R> {
    /// Creates an uninitialized sampler for the given network.
    pub fn new(network: &'a mut Network, store: &'a S, runner: R, config: SamplerConfig) -> Self {
        Self {
            network,
            store,
            runner,
            config,
            q_threshold: DEFAULT_Q_THRESHOLD_MVAR,
            phase: Phase::Uninitialized,
            init: None,
        }
    }

    /// Overrides the reactive-power sanity threshold (Mvar).
    pub fn with_q_threshold(mut self, q_threshold: f64) -> Self {
        self.q_threshold = q_threshold;
        self
    }

    /// Number of samples drawn so far.
    pub fn samples_drawn(&self) -> usize {
        match self.phase {
            Phase::Sampling { drawn } => drawn,
            Phase::Exhausted => self.init.as_ref().map_or(0, |i| i.n_samples),
            _ => 0,
        }
    }

    /// Validates the request, captures element ordering and stages the
    /// per-network input artifact. Must be called exactly once.
    ///
    /// # Errors
    ///
    /// Fails if already initialized, if no dataset exists for the analysis id
    /// and time horizon, or if `n_samples` is outside `(0, available]`.
    pub fn init(&mut self, parameters: &SamplerParameters) -> Result<(), SamplerError> {
        if !matches!(self.phase, Phase::Uninitialized) {
            return Err(SamplerError::AlreadyInitialized {
                network_id: self.network.id().to_string(),
            });
        }
        let analysis_id = parameters.analysis_id.clone();
        let time_horizon = parameters.time_horizon;
        if !self.store.is_available(&analysis_id, time_horizon) {
            return Err(SamplerError::DataNotAvailable {
                network_id: self.network.id().to_string(),
                analysis_id,
                time_horizon,
            });
        }
        let fea_params = self.store.parameters(&analysis_id, time_horizon)?;
        info!(
            network = self.network.id(),
            analysis = %analysis_id,
            horizon = %time_horizon,
            available = fea_params.n_samples,
            requested = parameters.n_samples,
            "forecast errors analysis located"
        );
        if parameters.n_samples == 0 || parameters.n_samples > fea_params.n_samples {
            return Err(SamplerError::SampleCountOutOfRange {
                network_id: self.network.id().to_string(),
                analysis_id,
                time_horizon,
                requested: parameters.n_samples,
                available: fea_params.n_samples,
            });
        }

        // Enumeration order fixed here must match the dataset build order.
        let connected_generator_ids = self.network.connected_generator_ids();
        let connected_load_ids = self.network.connected_load_ids();

        info!(
            network = self.network.id(),
            "preparing sampling network data"
        );
        let staged_input = self.stage_input(time_horizon)?;
        info!(
            network = self.network.id(),
            path = %staged_input.display(),
            "sampling network data staged"
        );

        self.init = Some(InitState {
            time_horizon,
            analysis_id,
            n_samples: parameters.n_samples,
            connected_generator_ids,
            connected_load_ids,
            staged_input,
            batch: None,
        });
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Draws the next sample and writes it into the network working state.
    ///
    /// The first call triggers the single external computation for the whole
    /// batch. Once `n_samples` rows have been drawn the instance is exhausted
    /// and every further call fails.
    ///
    /// # Errors
    ///
    /// Fails if the sampler is uninitialized or exhausted, if the external
    /// tool fails, or if its output cannot be parsed.
    pub fn sample(&mut self) -> Result<(), SamplerError> {
        match self.phase {
            Phase::Uninitialized => {
                return Err(SamplerError::NotInitialized {
                    network_id: self.network.id().to_string(),
                });
            }
            Phase::Exhausted => return Err(self.exhausted_error()),
            Phase::Initialized => {
                let batch = self.run_external_sampler()?;
                let init = self.init.as_mut().expect("initialized phase carries state");
                init.batch = Some(batch);
                self.phase = Phase::Sampling { drawn: 0 };
            }
            Phase::Sampling { .. } => {}
        }

        let Phase::Sampling { drawn } = self.phase else {
            unreachable!("phase is Sampling after the transitions above");
        };
        let init = self.init.as_ref().expect("sampling phase carries state");
        if drawn >= init.n_samples {
            self.phase = Phase::Exhausted;
            return Err(self.exhausted_error());
        }
        debug!(
            network = self.network.id(),
            state = self.network.working_state_id(),
            sample = drawn,
            "drawing sample"
        );
        let row = init
            .batch
            .as_ref()
            .expect("batch is present while sampling")
            .row(drawn);
        self.phase = Phase::Sampling { drawn: drawn + 1 };

        let init = self.init.as_ref().expect("sampling phase carries state");
        apply_sample(self.network, init, &row, self.q_threshold);
        Ok(())
    }

    fn exhausted_error(&self) -> SamplerError {
        let (analysis_id, n_samples) = self
            .init
            .as_ref()
            .map(|i| (i.analysis_id.clone(), i.n_samples))
            .unwrap_or_default();
        SamplerError::Exhausted {
            network_id: self.network.id().to_string(),
            analysis_id,
            n_samples,
        }
    }

    /// Writes the per-network input artifact into the configured tmp
    /// directory. Called exactly once per instance.
    fn stage_input(&self, time_horizon: TimeHorizon) -> Result<PathBuf, SamplerError> {
        std::fs::create_dir_all(&self.config.tmp_dir)?;
        let prefix = format!(
            "{INPUT_FILE_PREFIX}{}_{}_",
            sanitize_id(self.network.id()),
            time_horizon.label()
        );
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".csv")
            .tempfile_in(&self.config.tmp_dir)?;
        input::write_sampling_input(self.network, &file)?;
        let (_, path) = file.keep().map_err(|e| SamplerError::Io(e.error))?;
        Ok(path)
    }

    /// The single external computation: isolated working directory, staged
    /// inputs, one blocking tool invocation, result parsing.
    fn run_external_sampler(&self) -> Result<SampledBatch, SamplerError> {
        let init = self.init.as_ref().expect("initialized phase carries state");
        info!(
            network = self.network.id(),
            n_samples = init.n_samples,
            "running Monte Carlo sampler"
        );
        let workdir = tempfile::Builder::new()
            .prefix(WORKING_DIR_PREFIX)
            .tempdir()?;

        // Forecast-errors dataset: local copy or direct path reference.
        let fe_argument = if self.config.copy_fe_file {
            let name = format!(
                "{INPUT_FILE_PREFIX}forecast_offline_samples_{}.dat",
                init.time_horizon.label()
            );
            self.store.copy_dataset(
                &init.analysis_id,
                init.time_horizon,
                &workdir.path().join(&name),
            )?;
            name
        } else {
            self.store
                .dataset_path(&init.analysis_id, init.time_horizon)?
                .display()
                .to_string()
        };

        let input_name = format!("{INPUT_FILE_PREFIX}{}.csv", sanitize_id(self.network.id()));
        std::fs::copy(&init.staged_input, workdir.path().join(&input_name))?;

        let command = self.tool_command(workdir.path(), &input_name, &fe_argument, init.n_samples);
        self.runner.run(&command)?;

        let batch = output::read_batch_from_path(&workdir.path().join(output::OUTPUT_FILE_NAME))?;
        debug!(
            network = self.network.id(),
            rows = batch.rows(),
            "sampling results retrieved"
        );
        if self.config.debug {
            let kept = workdir.keep();
            info!(path = %kept.display(), "keeping sampler working directory");
        }
        Ok(batch)
    }

    fn tool_command(
        &self,
        working_dir: &Path,
        input_name: &str,
        fe_argument: &str,
        n_samples: usize,
    ) -> ToolCommand {
        let runtime = &self.config.runtime_home_dir;
        let ld_library_path = std::env::join_paths([
            runtime.join("runtime").join("glnxa64"),
            runtime.join("bin").join("glnxa64"),
            runtime.join("sys").join("os").join("glnxa64"),
        ])
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

        ToolCommand {
            program: self.config.binaries_dir.join(TOOL_NAME),
            args: vec![
                input_name.to_string(),
                fe_argument.to_string(),
                output::OUTPUT_FILE_NAME.to_string(),
                n_samples.to_string(),
                self.config.option_sign.to_string(),
                self.config.centering.to_string(),
                self.config.full_dependence.to_string(),
            ],
            env: vec![
                (
                    "MCRROOT".to_string(),
                    runtime.to_string_lossy().into_owned(),
                ),
                ("LD_LIBRARY_PATH".to_string(), ld_library_path),
            ],
            working_dir: working_dir.to_path_buf(),
        }
    }
}

fn sanitize_id(id: &str) -> String {
    id.replace(' ', "_")
}

/// Writes one sample row into the network working state.
///
/// Unconditional field mutations, no rollback: a failure partway through an
/// earlier stage leaves whatever was already written. Per-value sanity
/// violations are advisories only.
fn apply_sample(network: &mut Network, init: &InitState, row: &SampleRow, q_threshold: f64) {
    if let Some(gen_p) = &row.generators_p {
        for (i, generator_id) in init.connected_generator_ids.iter().enumerate() {
            let Some(&new_p) = gen_p.get(i) else {
                warn!(
                    network = network.id(),
                    generator = %generator_id,
                    "no sampled value for connected generator, skipping"
                );
                continue;
            };
            let Some(generator) = network.generator_mut(generator_id) else {
                continue;
            };
            // Sampled values use consumption convention; the setpoint is
            // generation convention, hence the negation.
            if generator.max_p < -new_p {
                warn!(
                    generator = %generator_id,
                    new_p = -new_p,
                    max_p = generator.max_p,
                    "sampled generator P above max bound"
                );
            }
            if generator.min_p > -new_p {
                warn!(
                    generator = %generator_id,
                    new_p = -new_p,
                    min_p = generator.min_p,
                    "sampled generator P below min bound"
                );
            }
            if !new_p.is_nan() {
                generator.target_p = -new_p;
                generator.terminal_p = new_p;
            } else {
                debug!(
                    generator = %generator_id,
                    "sampled generator P is NaN, skipping assignment"
                );
            }
        }
    }
    if row.loads_p.is_some() || row.loads_q.is_some() {
        for (i, load_id) in init.connected_load_ids.iter().enumerate() {
            if let Some(load_p) = &row.loads_p
                && let Some(&new_p) = load_p.get(i)
            {
                if !new_p.is_nan() {
                    if let Some(load) = network.load_mut(load_id) {
                        load.p0 = new_p;
                        load.terminal_p = new_p;
                    }
                } else {
                    debug!(load = %load_id, "sampled load P is NaN, skipping assignment");
                }
            }
            if let Some(load_q) = &row.loads_q
                && let Some(&new_q) = load_q.get(i)
            {
                if new_q.abs() <= q_threshold {
                    if !new_q.is_nan() {
                        if let Some(load) = network.load_mut(load_id) {
                            load.q0 = new_q;
                            load.terminal_q = new_q;
                        }
                    } else {
                        debug!(load = %load_id, "sampled load Q is NaN, skipping assignment");
                    }
                } else {
                    // Oversized Q would break load-flow convergence; keep the
                    // pre-existing value.
                    warn!(
                        load = %load_id,
                        new_q,
                        q_threshold,
                        "sampled load Q above threshold, keeping old value"
                    );
                }
            }
        }
    }
}
