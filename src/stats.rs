//! Convergence diagnostics computed from a [`ResultBundle`].
//!
//! R-hat follows the rank-normalized split-chain construction of
//! [Vehtari et al. (2021)][1]: chains are split in half, draws are replaced by the
//! normal scores of their pooled ranks, and the potential scale reduction factor
//! compares between-chain to within-chain variance. The `rank` method reports the
//! larger of the bulk (rank-normalized) and tail (rank-normalized folded) values.
//!
//! [1]: https://doi.org/10.1214/20-BA1221

use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc_inv;
use tracing::{info, warn};

use crate::bundle::ResultBundle;
use crate::error::{Error, Result};

/// R-hat is undefined for fewer chains than this.
pub const MIN_CHAINS: usize = 2;

/// Fewer draws per chain than this yield `NaN`.
pub const MIN_DRAWS: usize = 4;

/// Variant of the R-hat statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhatMethod {
    /// max(bulk, tail) rank-normalized split R-hat.
    #[default]
    Rank,
    /// Split R-hat on the raw draws.
    Split,
    /// Rank-normalized split R-hat of `|x - median(x)|`.
    Folded,
    /// Rank-normalized split R-hat.
    ZScale,
    /// Classic R-hat, no splitting or normalization.
    Identity,
}

impl RhatMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RhatMethod::Rank => "rank",
            RhatMethod::Split => "split",
            RhatMethod::Folded => "folded",
            RhatMethod::ZScale => "z_scale",
            RhatMethod::Identity => "identity",
        }
    }
}

impl fmt::Display for RhatMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RhatMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rank" => Ok(RhatMethod::Rank),
            "split" => Ok(RhatMethod::Split),
            "folded" => Ok(RhatMethod::Folded),
            "z_scale" => Ok(RhatMethod::ZScale),
            "identity" => Ok(RhatMethod::Identity),
            other => Err(Error::Validation(format!(
                "unknown R-hat method `{other}`; expected one of rank, split, folded, z_scale, identity"
            ))),
        }
    }
}

/// Diagnostics settings of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticOptions {
    /// Method of the per-dimension R-hat table.
    pub rhat_method: RhatMethod,
    /// Method of the R-hat trace, independent of `rhat_method`.
    pub trace_method: RhatMethod,
    /// Number of growing windows in the R-hat trace.
    pub n_windows: usize,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            rhat_method: RhatMethod::Rank,
            trace_method: RhatMethod::Rank,
            n_windows: 7,
        }
    }
}

/// R-hat of every dimension over a sequence of growing windows of draws.
#[derive(Debug, Clone, PartialEq)]
pub struct RhatTrace {
    /// Number of leading draws used by each window.
    pub draws: Vec<usize>,
    /// `[n_dims, n_windows]`
    pub values: Array2<f64>,
}

/// Everything the reporting stage needs, derived fresh from a bundle.
#[derive(Debug)]
pub struct DiagnosticReport {
    /// R-hat per dimension, or why it could not be computed.
    pub rhat: Result<Array1<f64>>,
    pub rhat_trace: Result<RhatTrace>,
    /// Mean local acceptance rate per step.
    pub mean_local_acceptance: Array1<f64>,
    /// Mean global acceptance rate per step.
    pub mean_global_acceptance: Array1<f64>,
    /// Training loss, epochs concatenated.
    pub loss_curve: Array1<f64>,
}

impl DiagnosticReport {
    /// Computes all diagnostics. An R-hat failure (e.g. a single chain) is stored in the
    /// report instead of aborting.
    pub fn compute(bundle: &ResultBundle, options: &DiagnosticOptions) -> Result<Self> {
        let (mean_local_acceptance, mean_global_acceptance) = acceptance_summary(bundle)?;

        info!(method = %options.rhat_method, "Computing R-hat diagnostic");
        let rhat = rhat(bundle, options.rhat_method);
        match &rhat {
            Ok(values) => {
                for (label, value) in dimension_labels(values.len()).iter().zip(values) {
                    info!("R-hat {label}: {value:.4}");
                }
            }
            Err(e) => warn!(error = %e, "Skipping R-hat"),
        }

        let rhat_trace = rhat_trace(bundle, options.n_windows, options.trace_method);
        if let Err(e) = &rhat_trace {
            warn!(error = %e, "Skipping R-hat trace");
        }

        Ok(Self {
            rhat,
            rhat_trace,
            mean_local_acceptance,
            mean_global_acceptance,
            loss_curve: loss_curve(bundle),
        })
    }

    /// Largest finite R-hat over all dimensions.
    pub fn max_rhat(&self) -> Option<f64> {
        let values = self.rhat.as_ref().ok()?;
        let max = *values.max_skipnan();
        max.is_finite().then_some(max)
    }
}

/// Axis labels `x0 .. x{n-1}`.
pub fn dimension_labels(n_dims: usize) -> Vec<String> {
    (0..n_dims).map(|i| format!("x{i}")).collect()
}

/// Mean local and global acceptance rate per step, averaged over chains.
pub fn acceptance_summary(bundle: &ResultBundle) -> Result<(Array1<f64>, Array1<f64>)> {
    let chain_mean = |rates: &Array2<f64>| {
        rates
            .mean_axis(Axis(0))
            .ok_or(Error::InsufficientData {
                what: "acceptance summary",
                required: 1,
                found: 0,
            })
    };
    Ok((
        chain_mean(&bundle.local_acceptance)?,
        chain_mean(&bundle.global_acceptance)?,
    ))
}

/// Training loss flattened across epochs.
pub fn loss_curve(bundle: &ResultBundle) -> Array1<f64> {
    bundle.training_loss.iter().copied().collect()
}

/// R-hat per dimension over all draws of the bundle.
pub fn rhat(bundle: &ResultBundle, method: RhatMethod) -> Result<Array1<f64>> {
    rhat_positions(bundle.positions.view(), method)
}

/// R-hat per dimension of `positions` (`[n_chains, n_draws, n_dims]`).
pub fn rhat_positions(positions: ArrayView3<f64>, method: RhatMethod) -> Result<Array1<f64>> {
    let n_chains = positions.len_of(Axis(0));
    if n_chains < MIN_CHAINS {
        return Err(Error::InsufficientData {
            what: "R-hat",
            required: MIN_CHAINS,
            found: n_chains,
        });
    }
    Ok(positions
        .axis_iter(Axis(2))
        .map(|draws| rhat_chains(draws, method))
        .collect())
}

/// R-hat trace of the bundle's positions, see [`rhat_trace_positions`].
pub fn rhat_trace(bundle: &ResultBundle, n_windows: usize, method: RhatMethod) -> Result<RhatTrace> {
    rhat_trace_positions(bundle.positions.view(), n_windows, method)
}

/// R-hat of each dimension using the first `w * floor(n_draws / n_windows)` draws for
/// window `w = 1..=n_windows`. See [`window_sizes`] for how windows are clamped.
pub fn rhat_trace_positions(
    positions: ArrayView3<f64>,
    n_windows: usize,
    method: RhatMethod,
) -> Result<RhatTrace> {
    let (n_chains, n_draws, n_dims) = positions.dim();
    if n_chains < MIN_CHAINS {
        return Err(Error::InsufficientData {
            what: "R-hat trace",
            required: MIN_CHAINS,
            found: n_chains,
        });
    }

    let draws = window_sizes(n_draws, n_windows);
    let mut values = Array2::from_elem((n_dims, draws.len()), f64::NAN);
    for (w, &n) in draws.iter().enumerate() {
        let window = rhat_positions(positions.slice(s![.., ..n, ..]), method)?;
        values.column_mut(w).assign(&window);
    }
    Ok(RhatTrace { draws, values })
}

/// Number of leading draws used by each of `n_windows` growing windows.
///
/// The last window always covers all `n_draws`. Earlier windows are clamped to at
/// least `min(MIN_DRAWS, n_draws)` draws, so with fewer draws than windows they
/// repeat the smallest usable window instead of being empty.
pub fn window_sizes(n_draws: usize, n_windows: usize) -> Vec<usize> {
    if n_windows == 0 {
        return Vec::new();
    }
    let step = n_draws / n_windows;
    let floor = MIN_DRAWS.min(n_draws);
    (1..=n_windows)
        .map(|w| {
            if w == n_windows {
                n_draws
            } else {
                (w * step).clamp(floor, n_draws)
            }
        })
        .collect()
}

/// R-hat of a single quantity, `draws` shaped `[n_chains, n_draws]`.
///
/// Returns `NaN` for fewer than [`MIN_CHAINS`] chains or [`MIN_DRAWS`] draws,
/// non-finite draws, or zero within-chain variance.
pub fn rhat_chains(draws: ArrayView2<f64>, method: RhatMethod) -> f64 {
    if draws.nrows() < MIN_CHAINS
        || draws.ncols() < MIN_DRAWS
        || draws.iter().any(|x| !x.is_finite())
    {
        return f64::NAN;
    }

    match method {
        RhatMethod::Identity => psrf(draws),
        RhatMethod::Split => psrf(split_chains(draws).view()),
        // Ranks and the fold median are taken over all draws, middle draw included.
        RhatMethod::ZScale => psrf(split_chains(z_scale(draws).view()).view()),
        RhatMethod::Folded => psrf(split_chains(z_scale(fold(draws).view()).view()).view()),
        RhatMethod::Rank => {
            let bulk = psrf(z_scale(split_chains(draws).view()).view());
            let tail = psrf(z_scale(split_chains(fold(draws).view()).view()).view());
            if bulk.is_nan() || tail.is_nan() {
                f64::NAN
            } else {
                bulk.max(tail)
            }
        }
    }
}

/// Potential scale reduction factor: `sqrt((B / W + n - 1) / n)` with `B` the
/// between-chain and `W` the mean within-chain variance.
fn psrf(draws: ArrayView2<f64>) -> f64 {
    let n = draws.ncols() as f64;
    let Some(chain_mean) = draws.mean_axis(Axis(1)) else {
        return f64::NAN;
    };
    let between = n * chain_mean.var(1.0);
    let within = draws.var_axis(Axis(1), 1.0).mean().unwrap_or(f64::NAN);
    if !within.is_finite() || within <= f64::MIN_POSITIVE {
        return f64::NAN;
    }
    ((between / within + n - 1.0) / n).sqrt()
}

/// Splits every chain into its first and last `n / 2` draws (the middle draw of an
/// odd-length chain is dropped), doubling the number of chains.
fn split_chains(draws: ArrayView2<f64>) -> Array2<f64> {
    let (n_chains, n_draws) = draws.dim();
    let half = n_draws / 2;
    let offset = n_draws - half;
    Array2::from_shape_fn((2 * n_chains, half), |(c, t)| {
        if c < n_chains {
            draws[[c, t]]
        } else {
            draws[[c - n_chains, offset + t]]
        }
    })
}

/// `|x - median|` with the median pooled over all chains.
fn fold(draws: ArrayView2<f64>) -> Array2<f64> {
    let median = median(draws.iter().copied().collect());
    draws.mapv(|x| (x - median).abs())
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Replaces each draw by the normal score of its rank among all draws:
/// `Phi^-1((r - 3/8) / (S + 1/4))`, ties getting their average rank.
fn z_scale(draws: ArrayView2<f64>) -> Array2<f64> {
    let n_draws = draws.ncols();
    let ranks = average_ranks(draws.iter().copied().collect());
    let size = ranks.len() as f64;

    let mut out = Array2::zeros(draws.raw_dim());
    for (i, rank) in ranks.into_iter().enumerate() {
        let p = (rank - 0.375) / (size + 0.25);
        out[[i / n_draws, i % n_draws]] = normal_quantile(p);
    }
    out
}

/// 1-based ranks, ties averaged.
fn average_ranks(values: Vec<f64>) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_unstable_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == values[order[i]] {
            j += 1;
        }
        let rank = 0.5 * ((i + 1) as f64 + j as f64);
        for &k in &order[i..j] {
            ranks[k] = rank;
        }
        i = j;
    }
    ranks
}

fn normal_quantile(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}
