//! End-to-end runs of the experiment pipeline against a stub sampler.
//!
//! The stub returns iid standard normal draws for a 2D Gaussian target, so R-hat
//! should be close to one and every artifact should be written.

use flowmc_toys::bundle::ResultBundle;
use flowmc_toys::config::{ExperimentConfig, ExperimentParams};
use flowmc_toys::core::{DensityModel, SamplerAdapter};
use flowmc_toys::distributions::AuxData;
use flowmc_toys::error::AdapterError;
use flowmc_toys::experiment::{run_experiment, Experiment};
use flowmc_toys::report::Artifact;
use flowmc_toys::stats::{rhat_positions, RhatMethod};
use flowmc_toys::Error;
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::path::Path;
    use tempfile::tempdir;
    use tracing_subscriber::EnvFilter;

    const N_DRAWS: usize = 100;
    const N_DIMS: usize = 2;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    struct NormalModel {
        fail: bool,
    }

    impl DensityModel for NormalModel {
        fn sample(&self, seed: u64, count: usize) -> Result<Array2<f64>, AdapterError> {
            if self.fail {
                return Err("flow weights are missing".into());
            }
            let mut rng = SmallRng::seed_from_u64(seed);
            Ok(Array2::from_shape_simple_fn((count, N_DIMS), || {
                rng.sample(StandardNormal)
            }))
        }
    }

    /// Returns `n_chains` copies of the same iid normal chain.
    struct StubSampler {
        n_chains: usize,
        failing_model: bool,
        calls: usize,
        seen_aux: Option<AuxData>,
    }

    impl StubSampler {
        fn new(n_chains: usize) -> Self {
            Self {
                n_chains,
                failing_model: false,
                calls: 0,
                seen_aux: None,
            }
        }
    }

    fn local_rates() -> Array1<f64> {
        Array1::linspace(0.5, 0.9, 20)
    }

    fn global_rates() -> Array1<f64> {
        Array1::linspace(0.1, 0.3, 50)
    }

    impl SamplerAdapter for StubSampler {
        fn run(
            &mut self,
            config: &ExperimentConfig,
            initial_positions: ArrayView2<f64>,
            aux: &AuxData,
            seed: u64,
        ) -> Result<ResultBundle, AdapterError> {
            self.calls += 1;
            self.seen_aux = Some(aux.clone());
            assert_eq!(initial_positions.dim(), (config.n_chains(), config.n_dims()));

            let mut rng = SmallRng::seed_from_u64(seed);
            let chain = Array2::<f64>::from_shape_simple_fn((N_DRAWS, N_DIMS), || {
                rng.sample(StandardNormal)
            });
            let positions =
                Array3::from_shape_fn((self.n_chains, N_DRAWS, N_DIMS), |(_, t, d)| chain[[t, d]]);

            let target = config.target();
            let log_probability = Array2::from_shape_fn((self.n_chains, N_DRAWS), |(_, t)| {
                target(chain.row(t).as_slice().unwrap(), aux)
            });

            Ok(ResultBundle {
                positions,
                local_acceptance: repeat_rows(local_rates(), self.n_chains),
                global_acceptance: repeat_rows(global_rates(), self.n_chains),
                log_probability,
                training_loss: Array2::from_shape_fn((5, 10), |(e, s)| 1.0 / (1 + e * 10 + s) as f64),
                density_model: Box::new(NormalModel {
                    fail: self.failing_model,
                }),
            })
        }
    }

    fn repeat_rows(row: Array1<f64>, n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, row.len()), |(_, j)| row[j])
    }

    struct FailingSampler;

    impl SamplerAdapter for FailingSampler {
        fn run(
            &mut self,
            _config: &ExperimentConfig,
            _initial_positions: ArrayView2<f64>,
            _aux: &AuxData,
            _seed: u64,
        ) -> Result<ResultBundle, AdapterError> {
            Err("sampler diverged".into())
        }
    }

    fn params(outdir: &Path) -> ExperimentParams {
        let mut params = ExperimentParams::new("gaussian", N_DIMS, outdir);
        params.n_chains = 10;
        params.report.n_flow_samples = 500;
        params.report.show_progress = false;
        params
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_gaussian_pipeline_writes_every_artifact() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let mut sampler = StubSampler::new(2);

        let (state, diagnostics, summary) = run_experiment(params(tmp.path()), &mut sampler).unwrap();
        assert_eq!(sampler.calls, 1);
        assert_eq!(state.config().outdir().file_name().unwrap(), "results_1");

        for (mean, expected) in [
            (&diagnostics.mean_local_acceptance, local_rates()),
            (&diagnostics.mean_global_acceptance, global_rates()),
        ] {
            assert_eq!(mean.len(), expected.len());
            for (a, b) in mean.iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
        }
        assert_eq!(diagnostics.loss_curve.len(), 50);

        let rhat = diagnostics.rhat.as_ref().unwrap();
        assert_eq!(rhat.len(), N_DIMS);
        for &value in rhat {
            assert!(value > 0.9 && value < 1.1, "R-hat {value} is not close to one");
        }

        assert!(summary.is_complete(), "failed: {:?}", summary.failed);
        assert_eq!(summary.written.len(), 6);
        let files = files_in(state.config().outdir());
        for artifact in Artifact::selected(state.config().report()) {
            assert!(
                files.contains(&artifact.file_name().to_string()),
                "{artifact} is missing"
            );
        }

        let table = std::fs::read_to_string(state.config().outdir().join("rhat_table.csv")).unwrap();
        assert!(table.starts_with("dimension,rhat"));
        assert_eq!(table.lines().count(), N_DIMS + 1);
    }

    #[test]
    fn test_repeated_runs_get_fresh_directories() {
        init_tracing();
        let tmp = tempdir().unwrap();

        let (first, _, _) = run_experiment(params(tmp.path()), &mut StubSampler::new(2)).unwrap();
        let (second, _, _) = run_experiment(params(tmp.path()), &mut StubSampler::new(2)).unwrap();

        assert_eq!(first.config().outdir().file_name().unwrap(), "results_1");
        assert_eq!(second.config().outdir().file_name().unwrap(), "results_2");
        assert!(first.config().outdir().join("rhat_table.csv").is_file());
    }

    #[test]
    fn test_failing_sampler_writes_nothing() {
        init_tracing();
        let tmp = tempdir().unwrap();

        let err = run_experiment(params(tmp.path()), &mut FailingSampler).unwrap_err();
        assert!(matches!(err, Error::AdapterFailure(_)));

        let outdir = tmp.path().join("results_1");
        assert!(outdir.is_dir());
        assert!(files_in(&outdir).is_empty());
    }

    #[test]
    fn test_failing_density_model_only_loses_flow_plot() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let mut sampler = StubSampler::new(2);
        sampler.failing_model = true;

        let (state, _, summary) = run_experiment(params(tmp.path()), &mut sampler).unwrap();
        assert_eq!(summary.failed_artifacts(), vec![Artifact::FlowSamplesCorner]);
        assert!(matches!(
            summary.failed[0].1,
            Error::ArtifactWrite {
                artifact: "flow_samples_corner_plot.svg",
                ..
            }
        ));
        assert_eq!(summary.written.len(), 5);
        assert!(!state
            .config()
            .outdir()
            .join("flow_samples_corner_plot.svg")
            .exists());
    }

    #[test]
    fn test_single_chain_only_loses_rhat_artifacts() {
        init_tracing();
        let tmp = tempdir().unwrap();

        let (state, diagnostics, summary) =
            run_experiment(params(tmp.path()), &mut StubSampler::new(1)).unwrap();
        assert!(matches!(
            diagnostics.rhat,
            Err(Error::InsufficientData { required: 2, found: 1, .. })
        ));
        assert_eq!(
            summary.failed_artifacts(),
            vec![Artifact::RhatTable, Artifact::RhatTrace]
        );

        let files = files_in(state.config().outdir());
        assert!(files.contains(&"chains_corner_plot.svg".to_string()));
        assert!(!files.contains(&"rhat_table.csv".to_string()));
    }

    #[test]
    fn test_chain_export_is_opt_in() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let mut params = params(tmp.path());
        params.report.export_chains_csv = true;

        let (state, _, summary) = run_experiment(params, &mut StubSampler::new(2)).unwrap();
        assert!(summary.is_complete());
        let csv = std::fs::read_to_string(state.config().outdir().join("chains.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + 2 * N_DRAWS);
        assert!(csv.starts_with("chain,draw,x0,x1"));
    }

    #[test]
    fn test_trace_uses_its_own_method() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let mut params = params(tmp.path());
        params.diagnostics.rhat_method = RhatMethod::Identity;

        let (state, diagnostics, _) = run_experiment(params, &mut StubSampler::new(2)).unwrap();
        let positions = state.bundle().positions.view();

        let table = diagnostics.rhat.as_ref().unwrap();
        let identity = rhat_positions(positions, RhatMethod::Identity).unwrap();
        let rank = rhat_positions(positions, RhatMethod::Rank).unwrap();
        let trace = diagnostics.rhat_trace.as_ref().unwrap();
        let last = trace.values.column(trace.draws.len() - 1);
        for d in 0..N_DIMS {
            assert_abs_diff_eq!(table[d], identity[d], epsilon = 1e-12);
            assert_abs_diff_eq!(last[d], rank[d], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_aux_data_reaches_the_sampler() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let config = ExperimentConfig::from_params(params(tmp.path())).unwrap();
        let aux = AuxData::from([("data".to_string(), vec![1.0, 2.5])]);
        let mut sampler = StubSampler::new(2);

        Experiment::new(config)
            .with_aux_data(aux.clone())
            .run(&mut sampler)
            .unwrap();
        assert_eq!(sampler.seen_aux, Some(aux));
    }
}
