//! Turns a run and its diagnostics into files under the run directory.
//!
//! Artifacts are rendered one after another. A failing artifact is logged and
//! recorded in the [`ReportSummary`]; the remaining ones are still attempted.

use std::fmt;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::bundle::ResultBundle;
use crate::error::Error;
use crate::io::csv::{save_positions, save_rhat_table};
use crate::plot;
use crate::stats::DiagnosticReport;

type RenderResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Knobs of the reporting stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Samples drawn from the trained density model for its corner plot.
    pub n_flow_samples: usize,
    pub flow_sample_seed: u64,
    /// Every n-th chain is shown in the log-probability panel.
    pub logprob_chain_stride: usize,
    /// Every n-th draw is shown in the log-probability panel.
    pub logprob_draw_stride: usize,
    /// Upper bound on points per scatter panel of a corner plot.
    pub max_scatter_points: usize,
    /// Also write every draw to `chains.csv`.
    pub export_chains_csv: bool,
    pub show_progress: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            n_flow_samples: 10_000,
            flow_sample_seed: 2046,
            logprob_chain_stride: 5,
            logprob_draw_stride: 20,
            max_scatter_points: 2_000,
            export_chains_csv: false,
            show_progress: true,
        }
    }
}

/// One output file of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    RhatTable,
    AcceptanceAndLogProb,
    ChainsCorner,
    FlowSamplesCorner,
    TrainingLoss,
    RhatTrace,
    ChainsCsv,
}

impl Artifact {
    /// Rendering order.
    pub const ALL: [Artifact; 7] = [
        Artifact::RhatTable,
        Artifact::AcceptanceAndLogProb,
        Artifact::ChainsCorner,
        Artifact::FlowSamplesCorner,
        Artifact::TrainingLoss,
        Artifact::RhatTrace,
        Artifact::ChainsCsv,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::RhatTable => "rhat_table.csv",
            Artifact::AcceptanceAndLogProb => "acceptance_and_logprob.svg",
            Artifact::ChainsCorner => "chains_corner_plot.svg",
            Artifact::FlowSamplesCorner => "flow_samples_corner_plot.svg",
            Artifact::TrainingLoss => "training_loss_curve.svg",
            Artifact::RhatTrace => "rhat_diagnostics.svg",
            Artifact::ChainsCsv => "chains.csv",
        }
    }

    /// Artifacts produced under `options`, in rendering order.
    pub fn selected(options: &ReportOptions) -> Vec<Artifact> {
        Artifact::ALL
            .into_iter()
            .filter(|a| *a != Artifact::ChainsCsv || options.export_chains_csv)
            .collect()
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Outcome of [`render_all`].
#[derive(Debug, Default)]
pub struct ReportSummary {
    /// Paths of the artifacts that were written, in rendering order.
    pub written: Vec<PathBuf>,
    /// Artifacts that failed, each with an [`Error::ArtifactWrite`].
    pub failed: Vec<(Artifact, Error)>,
}

impl ReportSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_artifacts(&self) -> Vec<Artifact> {
        self.failed.iter().map(|(a, _)| *a).collect()
    }
}

/// Renders every selected artifact into `outdir`.
pub fn render_all(
    outdir: &Path,
    options: &ReportOptions,
    bundle: &ResultBundle,
    report: &DiagnosticReport,
) -> ReportSummary {
    let artifacts = Artifact::selected(options);
    let pb = progress_bar(options, artifacts.len());
    let mut summary = ReportSummary::default();

    for artifact in artifacts {
        pb.set_message(artifact.file_name());
        let path = outdir.join(artifact.file_name());
        match render(artifact, &path, options, bundle, report) {
            Ok(()) => {
                info!(path = %path.display(), "Saved {artifact}");
                summary.written.push(path);
            }
            Err(e) => {
                error!(error = %e, "Could not write {artifact}");
                summary.failed.push((
                    artifact,
                    Error::ArtifactWrite {
                        artifact: artifact.file_name(),
                        reason: e.to_string(),
                    },
                ));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Done!");
    summary
}

fn render(
    artifact: Artifact,
    path: &Path,
    options: &ReportOptions,
    bundle: &ResultBundle,
    report: &DiagnosticReport,
) -> RenderResult {
    match artifact {
        Artifact::RhatTable => {
            let rhat = report.rhat.as_ref().map_err(|e| e.to_string())?;
            save_rhat_table(rhat.view(), path)?;
        }
        Artifact::AcceptanceAndLogProb => plot::plot_acceptance_and_logprob(
            path,
            report.mean_local_acceptance.view(),
            report.mean_global_acceptance.view(),
            bundle.log_probability.view(),
            options.logprob_chain_stride,
            options.logprob_draw_stride,
        )?,
        Artifact::ChainsCorner => plot::plot_corner(
            path,
            "Chains",
            flatten_chains(bundle.positions.view()).view(),
            options.max_scatter_points,
        )?,
        Artifact::FlowSamplesCorner => {
            let samples = bundle
                .density_model
                .sample(options.flow_sample_seed, options.n_flow_samples)
                .map_err(|e| format!("density model could not sample: {e}"))?;
            plot::plot_corner(path, "Flow Samples", samples.view(), options.max_scatter_points)?
        }
        Artifact::TrainingLoss => plot::plot_curve(
            path,
            "Training Loss",
            "Step",
            "Loss",
            report.loss_curve.view(),
        )?,
        Artifact::RhatTrace => {
            let trace = report.rhat_trace.as_ref().map_err(|e| e.to_string())?;
            plot::plot_rhat_trace(path, trace)?
        }
        Artifact::ChainsCsv => save_positions(bundle.positions.view(), path)?,
    }
    Ok(())
}

/// `[n_chains, n_draws, n_dims]` to `[n_chains * n_draws, n_dims]`, chain-major.
fn flatten_chains(positions: ArrayView3<f64>) -> Array2<f64> {
    let (n_chains, n_draws, n_dims) = positions.dim();
    Array2::from_shape_fn((n_chains * n_draws, n_dims), |(row, k)| {
        positions[[row / n_draws, row % n_draws, k]]
    })
}

fn progress_bar(options: &ReportOptions, len: usize) -> ProgressBar {
    if !options.show_progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_prefix("Report");
    match ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => warn!(error = %e, "Falling back to the default progress style"),
    }
    pb
}
