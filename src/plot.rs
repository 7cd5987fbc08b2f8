//! SVG figures of a run, drawn with `plotters`.
//!
//! Every function writes one file and returns once the backend has flushed it.

use std::error::Error;
use std::ops::Range;
use std::path::Path;

use ndarray::prelude::*;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::stats::{dimension_labels, RhatTrace};

type Panel<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

const N_BINS: usize = 20;

/// Three panels: mean local acceptance, mean global acceptance, and the log-probability
/// of every `chain_stride`-th chain at every `draw_stride`-th draw.
pub fn plot_acceptance_and_logprob(
    path: &Path,
    mean_local: ArrayView1<f64>,
    mean_global: ArrayView1<f64>,
    log_prob: ArrayView2<f64>,
    chain_stride: usize,
    draw_stride: usize,
) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, (1800, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 3));

    draw_curve(&panels[0], "Local Acceptance Rate", "Step", "", mean_local)?;
    draw_curve(&panels[1], "Global Acceptance Rate", "Step", "", mean_global)?;

    let traces: Vec<Vec<(f64, f64)>> = log_prob
        .axis_iter(Axis(0))
        .step_by(chain_stride.max(1))
        .map(|chain| {
            chain
                .iter()
                .enumerate()
                .step_by(draw_stride.max(1))
                .filter(|(_, v)| v.is_finite())
                .map(|(t, &v)| (t as f64, v))
                .collect()
        })
        .collect();
    let x_max = log_prob.ncols().max(1) as f64;
    let y_range = padded_range(traces.iter().flatten().map(|&(_, v)| v));

    let mut chart = ChartBuilder::on(&panels[2])
        .caption("Log Probability", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_range)?;
    chart.configure_mesh().x_desc("Draw").draw()?;
    for (i, trace) in traces.into_iter().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()].mix(0.5);
        chart.draw_series(LineSeries::new(trace, color.stroke_width(1)))?;
    }

    root.present()?;
    Ok(())
}

/// A single line plot of `values` against their index.
pub fn plot_curve(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    values: ArrayView1<f64>,
) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_curve(&root, title, x_desc, y_desc, values)?;
    root.present()?;
    Ok(())
}

/// One line per dimension of R-hat against the number of draws used, with a reference
/// line at 1.
pub fn plot_rhat_trace(path: &Path, trace: &RhatTrace) -> Result<(), Box<dyn Error>> {
    let xs: Vec<f64> = trace.draws.iter().map(|&n| n as f64).collect();
    let x_range = padded_range(xs.iter().copied());
    let y_range = padded_range(trace.values.iter().copied().chain(std::iter::once(1.0)));
    let labels = dimension_labels(trace.values.nrows());

    let root = SVGBackend::new(path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("R-hat Diagnostic", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range)?;
    chart
        .configure_mesh()
        .x_desc("Iteration")
        .y_desc("R-hat")
        .draw()?;

    for (d, (row, label)) in trace.values.axis_iter(Axis(0)).zip(labels).enumerate() {
        let color = SERIES_COLORS[d % SERIES_COLORS.len()];
        let points: Vec<(f64, f64)> = xs
            .iter()
            .zip(row.iter())
            .filter(|(_, v)| v.is_finite())
            .map(|(&x, &v)| (x, v))
            .collect();
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
    }
    chart.draw_series(LineSeries::new(
        vec![(x_range.start, 1.0), (x_range.end, 1.0)],
        BLACK.stroke_width(1),
    ))?;

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Corner plot of `samples` (`[n_samples, n_dims]`): histograms on the diagonal,
/// pairwise scatter below it. At most about `max_scatter_points` points are drawn per
/// scatter panel.
pub fn plot_corner(
    path: &Path,
    title: &str,
    samples: ArrayView2<f64>,
    max_scatter_points: usize,
) -> Result<(), Box<dyn Error>> {
    let (n_samples, n_dims) = samples.dim();
    if n_dims == 0 {
        return Err("corner plot needs at least one dimension".into());
    }
    let labels = dimension_labels(n_dims);
    let ranges: Vec<Range<f64>> = samples
        .axis_iter(Axis(1))
        .map(|column| padded_range(column.iter().copied()))
        .collect();
    let stride = n_samples.div_ceil(max_scatter_points.max(1)).max(1);

    let side = 220 * n_dims as u32 + 60;
    let root = SVGBackend::new(path, (side, side)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let panels = root.split_evenly((n_dims, n_dims));

    for i in 0..n_dims {
        for j in 0..=i {
            let axes = Axes {
                x: ranges[j].clone(),
                y: ranges[i].clone(),
                x_desc: (i == n_dims - 1).then_some(labels[j].as_str()),
                y_desc: (j == 0 && i > 0).then_some(labels[i].as_str()),
            };
            let panel = &panels[i * n_dims + j];
            if i == j {
                draw_histogram(panel, samples.column(i), axes)?;
            } else {
                draw_scatter(panel, samples.column(j), samples.column(i), axes, stride)?;
            }
        }
    }

    root.present()?;
    Ok(())
}

struct Axes<'a> {
    x: Range<f64>,
    y: Range<f64>,
    x_desc: Option<&'a str>,
    y_desc: Option<&'a str>,
}

fn draw_curve(
    area: &Panel,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    values: ArrayView1<f64>,
) -> Result<(), Box<dyn Error>> {
    let x_max = values.len().saturating_sub(1).max(1) as f64;
    let y_range = padded_range(values.iter().copied());

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_range)?;
    chart.configure_mesh().x_desc(x_desc).y_desc(y_desc).draw()?;
    chart.draw_series(LineSeries::new(
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| (i as f64, v)),
        SERIES_COLORS[0].stroke_width(2),
    ))?;
    Ok(())
}

fn draw_histogram(area: &Panel, values: ArrayView1<f64>, axes: Axes) -> Result<(), Box<dyn Error>> {
    let range = axes.x;
    let width = (range.end - range.start) / N_BINS as f64;
    let mut counts = [0usize; N_BINS];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let bin = ((v - range.start) / width) as usize;
        counts[bin.min(N_BINS - 1)] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.05;

    let mut chart = ChartBuilder::on(area)
        .margin(5)
        .x_label_area_size(if axes.x_desc.is_some() { 40 } else { 15 })
        .y_label_area_size(15)
        .build_cartesian_2d(range.clone(), 0.0..y_max)?;
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh().x_labels(3).y_labels(0);
    if let Some(desc) = axes.x_desc {
        mesh.x_desc(desc);
    }
    mesh.draw()?;

    let fill = SERIES_COLORS[0].mix(0.6).filled();
    chart.draw_series(counts.iter().enumerate().map(|(b, &count)| {
        let x0 = range.start + b as f64 * width;
        Rectangle::new([(x0, 0.0), (x0 + width, count as f64)], fill)
    }))?;
    Ok(())
}

fn draw_scatter(
    area: &Panel,
    xs: ArrayView1<f64>,
    ys: ArrayView1<f64>,
    axes: Axes,
    stride: usize,
) -> Result<(), Box<dyn Error>> {
    let mut chart = ChartBuilder::on(area)
        .margin(5)
        .x_label_area_size(if axes.x_desc.is_some() { 40 } else { 15 })
        .y_label_area_size(if axes.y_desc.is_some() { 50 } else { 15 })
        .build_cartesian_2d(axes.x, axes.y)?;
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh().x_labels(3).y_labels(3);
    if let Some(desc) = axes.x_desc {
        mesh.x_desc(desc);
    }
    if let Some(desc) = axes.y_desc {
        mesh.y_desc(desc);
    }
    mesh.draw()?;

    let dot = RGBColor(0, 0, 0).mix(0.3).filled();
    chart.draw_series(
        xs.iter()
            .zip(ys.iter())
            .step_by(stride)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| Circle::new((x, y), 1, dot)),
    )?;
    Ok(())
}

/// Range spanning the finite `values` with 5% padding; `-1..1` when there are none.
fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return -1.0..1.0;
    }
    let pad = if hi > lo { 0.05 * (hi - lo) } else { 0.5 };
    (lo - pad)..(hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range([0.0, 10.0]), -0.5..10.5);
        assert_eq!(padded_range([2.0, 2.0]), 1.5..2.5);
        assert_eq!(padded_range([f64::NAN, f64::INFINITY]), -1.0..1.0);
        assert_eq!(padded_range(std::iter::empty::<f64>()), -1.0..1.0);
    }

    #[test]
    fn test_curve_and_trace_are_written() {
        let dir = tempdir().unwrap();
        let curve = dir.path().join("curve.svg");
        plot_curve(&curve, "Loss", "Step", "Loss", arr1(&[3.0, 2.0, 1.5, f64::NAN]).view())
            .unwrap();
        assert!(fs::read_to_string(&curve).unwrap().contains("<svg"));

        let trace = RhatTrace {
            draws: vec![10, 20, 30],
            values: Array2::from_shape_vec((2, 3), vec![1.3, 1.1, 1.01, 1.2, f64::NAN, 1.0])
                .unwrap(),
        };
        let path = dir.path().join("rhat.svg");
        plot_rhat_trace(&path, &trace).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_corner_plot() {
        let dir = tempdir().unwrap();
        let samples = Array2::from_shape_fn((500, 3), |(i, j)| ((i * (j + 1)) % 17) as f64);
        let path = dir.path().join("corner.svg");
        plot_corner(&path, "Chains", samples.view(), 100).unwrap();
        assert!(path.is_file());

        let empty = Array2::<f64>::zeros((10, 0));
        assert!(plot_corner(&dir.path().join("none.svg"), "Chains", empty.view(), 100).is_err());
    }

    #[test]
    fn test_unwritable_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("curve.svg");
        assert!(plot_curve(&path, "Loss", "", "", arr1(&[1.0, 2.0]).view()).is_err());
    }
}
