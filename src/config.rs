//! Run hyperparameters and the validated, immutable experiment configuration.
//!
//! [`ExperimentParams`] is the raw user input (deserialized from a JSON mapping or
//! filled in from code). [`ExperimentConfig::from_params`] validates it, resolves the
//! target density, and creates the versioned output directory the run writes to.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::distributions::{ExperimentKind, TargetFn};
use crate::error::{Error, Result};
use crate::outdir::next_available_dir;
use crate::report::ReportOptions;
use crate::stats::DiagnosticOptions;

mod defaults {
    pub fn n_local_steps() -> usize {
        20
    }
    pub fn n_global_steps() -> usize {
        50
    }
    pub fn n_training_loops() -> usize {
        20
    }
    pub fn n_production_loops() -> usize {
        20
    }
    pub fn n_epochs() -> usize {
        5
    }
    pub fn n_chains() -> usize {
        20
    }
    pub fn mala_step_size() -> f64 {
        1e-1
    }
    pub fn rq_spline_hidden_units() -> usize {
        32
    }
    pub fn rq_spline_n_bins() -> usize {
        8
    }
    pub fn rq_spline_n_layers() -> usize {
        4
    }
    pub fn learning_rate() -> f64 {
        1e-3
    }
    pub fn batch_size() -> usize {
        10_000
    }
    pub fn n_max_examples() -> usize {
        10_000
    }
    pub fn seed() -> u64 {
        42
    }
    pub fn outdir_prefix() -> String {
        "results".to_string()
    }
}

/// User-facing hyperparameters of one experiment run.
///
/// Only `experiment_type`, `n_dims` and `outdir` are required when deserializing,
/// everything else falls back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentParams {
    /// Name of the target density, see [`crate::distributions::resolve`].
    pub experiment_type: String,
    pub n_dims: usize,
    /// Base directory; each run gets its own `<outdir_prefix>_<n>` subdirectory.
    pub outdir: PathBuf,
    #[serde(default = "defaults::outdir_prefix")]
    pub outdir_prefix: String,

    #[serde(default = "defaults::n_local_steps")]
    pub n_local_steps: usize,
    #[serde(default = "defaults::n_global_steps")]
    pub n_global_steps: usize,
    #[serde(default = "defaults::n_training_loops")]
    pub n_training_loops: usize,
    #[serde(default = "defaults::n_production_loops")]
    pub n_production_loops: usize,
    #[serde(default = "defaults::n_epochs")]
    pub n_epochs: usize,
    #[serde(default = "defaults::n_chains")]
    pub n_chains: usize,
    /// Step size of the MALA (local) kernel.
    #[serde(default = "defaults::mala_step_size")]
    pub mala_step_size: f64,

    #[serde(default = "defaults::rq_spline_hidden_units")]
    pub rq_spline_hidden_units: usize,
    #[serde(default = "defaults::rq_spline_n_bins")]
    pub rq_spline_n_bins: usize,
    #[serde(default = "defaults::rq_spline_n_layers")]
    pub rq_spline_n_layers: usize,
    #[serde(default = "defaults::learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
    #[serde(default = "defaults::n_max_examples")]
    pub n_max_examples: usize,

    #[serde(default = "defaults::seed")]
    pub seed: u64,
    /// Log the initial ensemble before sampling.
    #[serde(default)]
    pub show_initial_positions: bool,

    #[serde(default)]
    pub diagnostics: DiagnosticOptions,
    #[serde(default)]
    pub report: ReportOptions,
}

impl ExperimentParams {
    /// Parameters for `experiment_type` in `n_dims` dimensions with every other field at
    /// its default.
    pub fn new(experiment_type: &str, n_dims: usize, outdir: impl AsRef<Path>) -> Self {
        Self {
            experiment_type: experiment_type.to_string(),
            n_dims,
            outdir: outdir.as_ref().to_path_buf(),
            outdir_prefix: defaults::outdir_prefix(),
            n_local_steps: defaults::n_local_steps(),
            n_global_steps: defaults::n_global_steps(),
            n_training_loops: defaults::n_training_loops(),
            n_production_loops: defaults::n_production_loops(),
            n_epochs: defaults::n_epochs(),
            n_chains: defaults::n_chains(),
            mala_step_size: defaults::mala_step_size(),
            rq_spline_hidden_units: defaults::rq_spline_hidden_units(),
            rq_spline_n_bins: defaults::rq_spline_n_bins(),
            rq_spline_n_layers: defaults::rq_spline_n_layers(),
            learning_rate: defaults::learning_rate(),
            batch_size: defaults::batch_size(),
            n_max_examples: defaults::n_max_examples(),
            seed: defaults::seed(),
            show_initial_positions: false,
            diagnostics: DiagnosticOptions::default(),
            report: ReportOptions::default(),
        }
    }

    /// Reads parameters from a JSON mapping.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> Result<ExperimentKind> {
        let kind: ExperimentKind = self
            .experiment_type
            .parse()
            .map_err(|e: Error| Error::Validation(e.to_string()))?;

        if self.n_dims < kind.min_dims() {
            return Err(Error::Validation(format!(
                "experiment type `{kind}` needs at least {} dimensions, got {}",
                kind.min_dims(),
                self.n_dims
            )));
        }
        if self.n_chains == 0 {
            return Err(Error::Validation("n_chains must be positive".into()));
        }
        for (name, value) in [
            ("learning_rate", self.learning_rate),
            ("mala_step_size", self.mala_step_size),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Validation(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }
        if self.outdir_prefix.is_empty() {
            return Err(Error::Validation("outdir_prefix must not be empty".into()));
        }
        Ok(kind)
    }
}

/**
Validated configuration of one experiment run.

Built once by [`ExperimentConfig::from_params`] and never mutated afterwards. On
construction the versioned output directory is created, so [`ExperimentConfig::outdir`]
always points at an existing, absolute path.

# Examples

```rust
use flowmc_toys::config::{ExperimentConfig, ExperimentParams};

let base = std::env::temp_dir().join("flowmc_toys_config_doc");
let config = ExperimentConfig::from_params(ExperimentParams::new("gaussian", 3, &base))?;
assert!(config.outdir().is_dir());
assert_eq!(config.n_dims(), 3);
# Ok::<(), flowmc_toys::Error>(())
```
*/
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    params: ExperimentParams,
    kind: ExperimentKind,
    outdir: PathBuf,
    target: TargetFn,
}

impl ExperimentConfig {
    pub fn from_params(params: ExperimentParams) -> Result<Self> {
        let kind = params.validate()?;

        let outdir = next_available_dir(&params.outdir, &params.outdir_prefix)?;
        fs::create_dir_all(&outdir)?;
        let outdir = fs::canonicalize(&outdir)?;
        info!(outdir = %outdir.display(), "Using output directory");

        info!(
            experiment = %kind,
            n_dims = params.n_dims,
            n_chains = params.n_chains,
            n_local_steps = params.n_local_steps,
            n_global_steps = params.n_global_steps,
            n_training_loops = params.n_training_loops,
            n_production_loops = params.n_production_loops,
            n_epochs = params.n_epochs,
            mala_step_size = params.mala_step_size,
            rq_spline_hidden_units = params.rq_spline_hidden_units,
            rq_spline_n_bins = params.rq_spline_n_bins,
            rq_spline_n_layers = params.rq_spline_n_layers,
            learning_rate = params.learning_rate,
            batch_size = params.batch_size,
            n_max_examples = params.n_max_examples,
            seed = params.seed,
            "Passed parameters"
        );
        info!("Setting the target function to the {kind} distribution");

        Ok(Self {
            target: kind.target(),
            params,
            kind,
            outdir,
        })
    }

    /// The validated parameters this configuration was built from.
    pub fn params(&self) -> &ExperimentParams {
        &self.params
    }

    pub fn kind(&self) -> ExperimentKind {
        self.kind
    }

    pub fn target(&self) -> TargetFn {
        self.target
    }

    /// Absolute path of this run's versioned output directory.
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    pub fn n_dims(&self) -> usize {
        self.params.n_dims
    }

    pub fn n_chains(&self) -> usize {
        self.params.n_chains
    }

    pub fn seed(&self) -> u64 {
        self.params.seed
    }

    /// Hidden layer widths of the spline coupling network (two equal layers).
    pub fn flow_hidden_layers(&self) -> [usize; 2] {
        [self.params.rq_spline_hidden_units; 2]
    }

    pub fn diagnostics(&self) -> &DiagnosticOptions {
        &self.params.diagnostics
    }

    pub fn report(&self) -> &ReportOptions {
        &self.params.report
    }
}
