//! The named result arrays one sampler run produces.

use std::fmt;
use std::str::FromStr;

use ndarray::prelude::*;

use crate::core::DensityModel;
use crate::error::{Error, Result};

/// Names of the entries of a [`ResultBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKey {
    Positions,
    LocalAcceptance,
    GlobalAcceptance,
    LogProbability,
    TrainingLoss,
    DensityModel,
}

impl ResultKey {
    pub const ALL: [ResultKey; 6] = [
        ResultKey::Positions,
        ResultKey::LocalAcceptance,
        ResultKey::GlobalAcceptance,
        ResultKey::LogProbability,
        ResultKey::TrainingLoss,
        ResultKey::DensityModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKey::Positions => "positions",
            ResultKey::LocalAcceptance => "local_acceptance",
            ResultKey::GlobalAcceptance => "global_acceptance",
            ResultKey::LogProbability => "log_probability",
            ResultKey::TrainingLoss => "training_loss",
            ResultKey::DensityModel => "density_model",
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResultKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown result key `{s}`")))
    }
}

/// Output of one sampler run. Produced once and only read afterwards.
///
/// Chains are always the first axis.
pub struct ResultBundle {
    /// `[n_chains, n_draws, n_dims]`
    pub positions: Array3<f64>,
    /// `[n_chains, n_local_steps]`
    pub local_acceptance: Array2<f64>,
    /// `[n_chains, n_global_steps]`
    pub global_acceptance: Array2<f64>,
    /// `[n_chains, n_draws]`
    pub log_probability: Array2<f64>,
    /// `[n_epochs, n_steps]`
    pub training_loss: Array2<f64>,
    pub density_model: Box<dyn DensityModel>,
}

impl ResultBundle {
    pub fn n_chains(&self) -> usize {
        self.positions.shape()[0]
    }

    pub fn n_draws(&self) -> usize {
        self.positions.shape()[1]
    }

    pub fn n_dims(&self) -> usize {
        self.positions.shape()[2]
    }

    /// Looks up a numeric entry by name. `density_model` is not an array and yields `None`.
    pub fn array(&self, key: ResultKey) -> Option<ArrayViewD<'_, f64>> {
        match key {
            ResultKey::Positions => Some(self.positions.view().into_dyn()),
            ResultKey::LocalAcceptance => Some(self.local_acceptance.view().into_dyn()),
            ResultKey::GlobalAcceptance => Some(self.global_acceptance.view().into_dyn()),
            ResultKey::LogProbability => Some(self.log_probability.view().into_dyn()),
            ResultKey::TrainingLoss => Some(self.training_loss.view().into_dyn()),
            ResultKey::DensityModel => None,
        }
    }

    /// Checks that the chain axes agree and that positions have `n_dims` columns.
    pub fn check_consistent(&self, n_dims: usize) -> Result<()> {
        if self.n_dims() != n_dims {
            return Err(Error::adapter(format!(
                "positions have {} dimensions, expected {n_dims}",
                self.n_dims()
            )));
        }
        let n_chains = self.n_chains();
        if n_chains == 0 {
            return Err(Error::adapter("the sampler returned no chains"));
        }
        for key in [
            ResultKey::LocalAcceptance,
            ResultKey::GlobalAcceptance,
            ResultKey::LogProbability,
        ] {
            let found = self.array(key).map(|a| a.shape()[0]).unwrap_or(0);
            if found != n_chains {
                return Err(Error::adapter(format!(
                    "`{key}` has {found} chains but `positions` has {n_chains}"
                )));
            }
        }
        if self.log_probability.shape()[1] != self.n_draws() {
            return Err(Error::adapter(format!(
                "`log_probability` has {} draws but `positions` has {}",
                self.log_probability.shape()[1],
                self.n_draws()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ResultBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBundle")
            .field("positions", &self.positions.shape())
            .field("local_acceptance", &self.local_acceptance.shape())
            .field("global_acceptance", &self.global_acceptance.shape())
            .field("log_probability", &self.log_probability.shape())
            .field("training_loss", &self.training_loss.shape())
            .finish_non_exhaustive()
    }
}
