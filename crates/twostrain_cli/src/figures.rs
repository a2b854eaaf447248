//! SVG figure rendering for trajectories and sweep output.
//!
//! Uses the SVG backend to avoid system font dependencies.

use anyhow::Result;
use plotters::prelude::*;
use plotters_svg::SVGBackend;
use std::path::Path;
use twostrain_core::model::{I_A, I_B, R_A, R_B, R_AB};
use twostrain_core::sweep::FrequencyGrid;
use twostrain_core::Trajectory;

const SIZE: (u32, u32) = (800, 500);

fn padded_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Infected fractions of both strains over time, with optional labelled
/// horizontal reference levels.
pub fn prevalence_chart(
    path: &Path,
    trajectory: &Trajectory,
    references: &[(f64, &str)],
) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let times = trajectory.times();
    let ia = trajectory.component(I_A);
    let ib = trajectory.component(I_B);
    let y_max = padded_max(
        ia.iter()
            .chain(ib.iter())
            .copied()
            .chain(references.iter().map(|(v, _)| *v)),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption("Strain prevalence", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(times[0]..times[times.len() - 1], 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc("time")
        .y_desc("infected fraction")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            times.iter().copied().zip(ia.iter().copied()),
            &RED,
        ))?
        .label("Ia")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .draw_series(LineSeries::new(
            times.iter().copied().zip(ib.iter().copied()),
            &BLUE,
        ))?
        .label("Ib")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    for &(level, label) in references {
        chart
            .draw_series(LineSeries::new(
                [(times[0], level), (times[times.len() - 1], level)],
                BLACK.mix(0.5),
            ))?
            .label(label)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.5)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Immunity pools over time: fraction protected against each strain and
/// against both, plus the `1 - delta/alpha` herd-immunity level.
pub fn immunity_chart(path: &Path, trajectory: &Trajectory, herd_level: f64) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let times = trajectory.times();
    let ra = trajectory.component(R_A);
    let rb = trajectory.component(R_B);
    let rab = trajectory.component(R_AB);

    let against_a: Vec<f64> = ra.iter().zip(&rab).map(|(a, ab)| a + ab).collect();
    let against_b: Vec<f64> = rb.iter().zip(&rab).map(|(b, ab)| b + ab).collect();
    let y_max = padded_max(
        against_a
            .iter()
            .chain(against_b.iter())
            .copied()
            .chain([herd_level]),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption("Immunity pools", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(times[0]..times[times.len() - 1], 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc("time")
        .y_desc("immune fraction")
        .draw()?;

    let series: [(&[f64], &RGBColor, &str); 3] = [
        (&against_a, &RED, "immune to A"),
        (&against_b, &BLUE, "immune to B"),
        (&rab, &GREEN, "immune to both"),
    ];
    for (values, color, label) in series {
        chart
            .draw_series(LineSeries::new(
                times.iter().copied().zip(values.iter().copied()),
                color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], *color));
    }

    chart.draw_series(LineSeries::new(
        [(times[0], herd_level), (times[times.len() - 1], herd_level)],
        BLACK.mix(0.5),
    ))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Strain-B share of infections over time against its theoretical asymptote.
pub fn frequency_chart(path: &Path, trajectory: &Trajectory, asymptote: f64) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let times = trajectory.times();
    let ia = trajectory.component(I_A);
    let ib = trajectory.component(I_B);
    let freq: Vec<(f64, f64)> = times
        .iter()
        .zip(ia.iter().zip(&ib))
        .map(|(&t, (&a, &b))| (t, b / (a + b)))
        .filter(|(_, f)| f.is_finite())
        .collect();

    let mut chart = ChartBuilder::on(&root)
        .caption("Strain B frequency", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(times[0]..times[times.len() - 1], 0.0..1.0)?;
    chart
        .configure_mesh()
        .x_desc("time")
        .y_desc("Ib / (Ia + Ib)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(freq, &BLUE))?
        .label("simulated")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(
            [(times[0], asymptote), (times[times.len() - 1], asymptote)],
            BLACK.mix(0.5),
        ))?
        .label("theory")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.5)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Sweep overlay: for each `kab` row, simulated long-run frequencies
/// (points) and the closed-form prediction (line) against the shared
/// abscissa `1 / (1 + (1 - kba) / (1 - kab))`. Non-finite cells (the
/// `kab = kba = 1` corner) are dropped.
pub fn sweep_chart(path: &Path, grid: &FrequencyGrid) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Long-run strain B frequency across the sweep", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;
    chart
        .configure_mesh()
        .x_desc("1 / (1 + (1 - kba) / (1 - kab))")
        .y_desc("frequency")
        .draw()?;

    let n = grid.resolution();
    for (i, &kab) in grid.leakage.iter().enumerate() {
        let color = Palette99::pick(i).mix(0.9);
        let abscissa =
            |kba: f64| -> f64 { 1.0 / (1.0 + (1.0 - kba) / (1.0 - kab)) };

        let simulated: Vec<(f64, f64)> = (0..n)
            .map(|j| (abscissa(grid.leakage[j]), grid.simulated_at(i, j)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        let predicted: Vec<(f64, f64)> = (0..n)
            .map(|j| (abscissa(grid.leakage[j]), grid.predicted_at(i, j)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();

        chart.draw_series(
            simulated
                .into_iter()
                .map(|(x, y)| Circle::new((x, y), 3, color.filled())),
        )?;
        chart.draw_series(LineSeries::new(predicted, color.stroke_width(1)))?;
    }

    root.present()?;
    Ok(())
}
