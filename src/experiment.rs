/*!
# Experiment driver

Ties the stages of one run together: build the initial ensemble, hand it to the
external sampler, diagnose the returned bundle, and render the report.

```text
ExperimentParams -> ExperimentConfig -> Experiment -> ExperimentState
                                                        |-> DiagnosticReport
                                                        `-> ReportSummary
```
*/

use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info};

use crate::bundle::ResultBundle;
use crate::config::{ExperimentConfig, ExperimentParams};
use crate::core::SamplerAdapter;
use crate::dev_tools::Timer;
use crate::distributions::AuxData;
use crate::error::{Error, Result};
use crate::report::{render_all, ReportSummary};
use crate::stats::DiagnosticReport;

/// A configured experiment that has not been run yet.
#[derive(Debug, Clone)]
pub struct Experiment {
    config: ExperimentConfig,
    aux: AuxData,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            config,
            aux: AuxData::new(),
        }
    }

    /// Auxiliary data forwarded to the target density. Empty unless set here.
    pub fn with_aux_data(mut self, aux: AuxData) -> Self {
        self.aux = aux;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Standard normal starting points, `[n_chains, n_dims]`, reproducible from the
    /// configured seed.
    pub fn initial_positions(&self) -> Array2<f64> {
        let mut rng = SmallRng::seed_from_u64(self.config.seed());
        let positions = Array2::from_shape_simple_fn(
            (self.config.n_chains(), self.config.n_dims()),
            || rng.sample(StandardNormal),
        );
        if self.config.params().show_initial_positions {
            info!("Initial positions:\n{positions:.4}");
        }
        positions
    }

    /// Runs the sampler once. Any adapter error, or a bundle whose shapes do not fit
    /// the configuration, is an [`Error::AdapterFailure`].
    pub fn run<A: SamplerAdapter + ?Sized>(self, adapter: &mut A) -> Result<ExperimentState> {
        let mut timer = Timer::new("experiment");
        let initial_positions = self.initial_positions();

        info!(
            experiment = %self.config.kind(),
            n_chains = self.config.n_chains(),
            "Running the sampler"
        );
        let bundle = adapter
            .run(
                &self.config,
                initial_positions.view(),
                &self.aux,
                self.config.seed(),
            )
            .map_err(Error::AdapterFailure)?;
        bundle.check_consistent(self.config.n_dims())?;
        timer.lap("sampling");
        info!(
            n_chains = bundle.n_chains(),
            n_draws = bundle.n_draws(),
            "Sampler finished"
        );

        Ok(ExperimentState {
            config: self.config,
            bundle,
        })
    }
}

/// A finished run: its configuration and the bundle the sampler returned.
#[derive(Debug)]
pub struct ExperimentState {
    config: ExperimentConfig,
    bundle: ResultBundle,
}

impl ExperimentState {
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn bundle(&self) -> &ResultBundle {
        &self.bundle
    }

    pub fn diagnose(&self) -> Result<DiagnosticReport> {
        DiagnosticReport::compute(&self.bundle, self.config.diagnostics())
    }

    /// Writes all artifacts into the run directory.
    pub fn report(&self, diagnostics: &DiagnosticReport) -> ReportSummary {
        info!(outdir = %self.config.outdir().display(), "Writing report");
        render_all(
            self.config.outdir(),
            self.config.report(),
            &self.bundle,
            diagnostics,
        )
    }

    /// Dumps the raw acceptance and log-probability arrays at debug level.
    pub fn log_data(&self) {
        debug!("Local acceptance:\n{:.3}", self.bundle.local_acceptance);
        debug!("Global acceptance:\n{:.3}", self.bundle.global_acceptance);
        debug!("Log probability:\n{:.3}", self.bundle.log_probability);
    }
}

/**
Configures, runs, diagnoses and reports one experiment.

Fails before anything is written if the parameters are invalid, and before any
artifact is written if the sampler fails. Individual artifact failures are collected
in the returned [`ReportSummary`].
*/
pub fn run_experiment<A: SamplerAdapter + ?Sized>(
    params: ExperimentParams,
    adapter: &mut A,
) -> Result<(ExperimentState, DiagnosticReport, ReportSummary)> {
    let mut timer = Timer::new("run_experiment");
    let config = ExperimentConfig::from_params(params)?;
    let state = Experiment::new(config).run(adapter)?;
    state.log_data();
    timer.lap("sampling");

    let diagnostics = state.diagnose()?;
    timer.lap("diagnostics");
    if let Some(max) = diagnostics.max_rhat() {
        info!("Largest R-hat: {max:.4}");
    }

    let summary = state.report(&diagnostics);
    timer.lap("report");
    info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        "Report finished"
    );
    Ok((state, diagnostics, summary))
}
