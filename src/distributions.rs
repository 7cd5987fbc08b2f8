/*!
Registry of the synthetic target densities the experiments sample from.

Every experiment kind maps to a pure, unnormalized log-density. The densities are
written once, generic over the floating-point precision via [`num_traits::Float`],
and the registry hands out plain `f64` function pointers with the signature the
sampler expects: `(position, auxiliary data) -> log density`.

# Examples

```rust
use flowmc_toys::distributions::{resolve, AuxData, ExperimentKind};

let target = resolve("rosenbrock")?;
let aux = AuxData::new();
assert_eq!(target(&[1.0, 1.0, 1.0], &aux), 0.0);

let kind: ExperimentKind = "gaussian".parse()?;
assert_eq!(kind.log_density(&[0.0_f32; 4]), 0.0);
# Ok::<(), flowmc_toys::Error>(())
```
*/

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use num_traits::Float;

use crate::error::{Error, Result};

/// Conditioning data passed alongside each position. None of the built-in targets
/// read it, so it is always empty.
pub type AuxData = HashMap<String, Vec<f64>>;

/// A resolved target: unnormalized log-density of a position.
pub type TargetFn = fn(&[f64], &AuxData) -> f64;

/// The closed set of supported experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperimentKind {
    /// Isotropic standard normal.
    Gaussian,
    /// Ring of radius 2 modulated by two bimodal factors on the first two axes.
    DualMoon,
    /// Generalized Rosenbrock banana.
    Rosenbrock,
}

impl ExperimentKind {
    pub const ALL: [ExperimentKind; 3] = [
        ExperimentKind::Gaussian,
        ExperimentKind::DualMoon,
        ExperimentKind::Rosenbrock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExperimentKind::Gaussian => "gaussian",
            ExperimentKind::DualMoon => "dual-moon",
            ExperimentKind::Rosenbrock => "rosenbrock",
        }
    }

    /// Smallest dimensionality the density is defined for.
    pub fn min_dims(&self) -> usize {
        match self {
            ExperimentKind::DualMoon => 2,
            _ => 1,
        }
    }

    /// Evaluates the unnormalized log-density at `x`.
    pub fn log_density<T: Float>(&self, x: &[T]) -> T {
        match self {
            ExperimentKind::Gaussian => gaussian(x),
            ExperimentKind::DualMoon => dual_moon(x),
            ExperimentKind::Rosenbrock => rosenbrock(x),
        }
    }

    /// The `f64` target function handed to the sampler.
    pub fn target(&self) -> TargetFn {
        match self {
            ExperimentKind::Gaussian => |x: &[f64], _: &AuxData| gaussian(x),
            ExperimentKind::DualMoon => |x: &[f64], _: &AuxData| dual_moon(x),
            ExperimentKind::Rosenbrock => |x: &[f64], _: &AuxData| rosenbrock(x),
        }
    }

    fn supported() -> String {
        Self::ALL
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExperimentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gaussian" => Ok(ExperimentKind::Gaussian),
            "dual-moon" | "dualmoon" => Ok(ExperimentKind::DualMoon),
            "rosenbrock" => Ok(ExperimentKind::Rosenbrock),
            other => Err(Error::UnsupportedExperiment {
                name: other.to_string(),
                supported: ExperimentKind::supported(),
            }),
        }
    }
}

/// Looks up the target function for an experiment name.
pub fn resolve(name: &str) -> Result<TargetFn> {
    Ok(name.parse::<ExperimentKind>()?.target())
}

/// `-0.5 * sum(x_i^2)`
pub fn gaussian<T: Float>(x: &[T]) -> T {
    let half = T::from(0.5).unwrap();
    -half * x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi)
}

/**
Dual-moon log-density:

```text
-( 0.5 * ((|x| - 2) / 0.1)^2
   - logsumexp(-0.5 * ((x0 - 3) / 0.8)^2, -0.5 * ((x0 + 3) / 0.8)^2)
   - logsumexp(-0.5 * ((x1 - 3) / 0.6)^2, -0.5 * ((x1 + 3) / 0.6)^2) )
```

Only `x0` and `x1` shape the modes; further coordinates enter through the norm.
A missing `x1` is treated as zero.
*/
pub fn dual_moon<T: Float>(x: &[T]) -> T {
    let c = |v: f64| T::from(v).unwrap();
    let norm = x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi).sqrt();
    let x0 = x.first().copied().unwrap_or_else(T::zero);
    let x1 = x.get(1).copied().unwrap_or_else(T::zero);

    let ring = c(0.5) * ((norm - c(2.0)) / c(0.1)).powi(2);
    let bump = |xi: T, center: T, scale: T| -c(0.5) * ((xi + center) / scale).powi(2);
    let modes_0 = log_sum_exp(bump(x0, c(-3.0), c(0.8)), bump(x0, c(3.0), c(0.8)));
    let modes_1 = log_sum_exp(bump(x1, c(-3.0), c(0.6)), bump(x1, c(3.0), c(0.6)));

    -(ring - modes_0 - modes_1)
}

/// `-sum(100 * (x_{i+1} - x_i^2)^2 + (1 - x_i)^2)` over consecutive pairs.
pub fn rosenbrock<T: Float>(x: &[T]) -> T {
    let hundred = T::from(100.0).unwrap();
    -x.windows(2).fold(T::zero(), |acc, pair| {
        let (lo, hi) = (pair[0], pair[1]);
        acc + hundred * (hi - lo * lo).powi(2) + (T::one() - lo).powi(2)
    })
}

fn log_sum_exp<T: Float>(a: T, b: T) -> T {
    let m = a.max(b);
    if m == T::neg_infinity() {
        return m;
    }
    m + ((a - m).exp() + (b - m).exp()).ln()
}
