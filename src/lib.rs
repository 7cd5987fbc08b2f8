//! # flowmc-toys
//!
//! Experiment runner for flow-assisted MCMC on toy targets.
//!
//! A run is configured from a parameter mapping, sampled by an external
//! [`SamplerAdapter`](core::SamplerAdapter), checked with rank-normalized split R-hat,
//! and reported as CSV and SVG files in a fresh versioned directory.
//!
//! ## Example
//!
//! ```rust
//! use flowmc_toys::distributions::{resolve, AuxData};
//! use flowmc_toys::stats::{rhat_positions, RhatMethod};
//! use ndarray::Array3;
//!
//! let target = resolve("gaussian")?;
//! assert_eq!(target(&[0.0, 0.0], &AuxData::new()), 0.0);
//!
//! let positions = Array3::from_shape_fn((4, 100, 2), |(c, t, d)| ((c * 31 + t * 7 + d) % 11) as f64);
//! let rhat = rhat_positions(positions.view(), RhatMethod::Rank)?;
//! assert_eq!(rhat.len(), 2);
//! # Ok::<(), flowmc_toys::Error>(())
//! ```

pub mod bundle;
pub mod config;
pub mod core;
mod dev_tools;
pub mod distributions;
pub mod error;
pub mod experiment;
pub mod io;
pub mod outdir;
pub mod plot;
pub mod report;
pub mod stats;

pub use error::{Error, Result};
