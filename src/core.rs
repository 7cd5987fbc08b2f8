//! Boundary to the external sampler.
//!
//! The Markov kernels, the normalizing flow and its training loop live outside this
//! crate. They plug in through [`SamplerAdapter`], and the trained flow is handed back
//! as a [`DensityModel`] inside the [`ResultBundle`].

use ndarray::{Array2, ArrayView2};

use crate::bundle::ResultBundle;
use crate::config::ExperimentConfig;
use crate::distributions::AuxData;
use crate::error::AdapterError;

/// Runs the external sampler for one experiment.
pub trait SamplerAdapter {
    /// Samples from `config.target()` starting at `initial_positions`
    /// (shape `[n_chains, n_dims]`).
    ///
    /// Implementations must be deterministic for a fixed `seed` and configuration.
    /// The returned `positions` are shaped `[n_chains, n_draws, n_dims]`, and the
    /// acceptance arrays hold one column per local/global step.
    fn run(
        &mut self,
        config: &ExperimentConfig,
        initial_positions: ArrayView2<f64>,
        aux: &AuxData,
        seed: u64,
    ) -> Result<ResultBundle, AdapterError>;
}

/// A trained density-transport model (e.g. a normalizing flow) that can produce
/// synthetic samples approximating the target.
pub trait DensityModel {
    /// Draws `count` samples, shape `[count, n_dims]`.
    fn sample(&self, seed: u64, count: usize) -> Result<Array2<f64>, AdapterError>;
}
