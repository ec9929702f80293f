use std::path::Path;

use plotters::prelude::PathElement;
use plotters::prelude::*;

use crate::utils::DynError;

const PLOT_FONT_SCALE: f64 = 1.2;
const PROFILE_SIZE: (u32, u32) = (1000, 500);

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

/// Corner points of a steps-mid trace: each sample is held for half a bin on either side.
pub fn steps_mid(x_vals: &[f64], data: &[f64]) -> Vec<(f64, f64)> {
    let n = x_vals.len().min(data.len());
    let mut points = Vec::with_capacity(2 * n);
    for i in 0..n {
        let left = if i == 0 {
            x_vals[0]
        } else {
            0.5 * (x_vals[i - 1] + x_vals[i])
        };
        let right = if i + 1 == n {
            x_vals[i]
        } else {
            0.5 * (x_vals[i] + x_vals[i + 1])
        };
        points.push((left, data[i]));
        points.push((right, data[i]));
    }
    points
}

/// Error-bar profile over phase 0-2, drawn as a steps-mid line.
pub fn plot_pulse_profile(
    phase: &[f64],
    profile: &[f64],
    error: &[f64],
    title: &str,
    label: &str,
    filename: &Path,
) -> Result<(), DynError> {
    if phase.len() != profile.len() || phase.len() != error.len() {
        return Err("Phase, profile and error lengths must match".into());
    }
    if phase.is_empty() {
        return Err("No data points to plot".into());
    }

    let root = BitMapBackend::new(filename, PROFILE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let visible = phase.iter().zip(profile.iter().zip(error.iter()));
    let mut min_val = f64::INFINITY;
    let mut max_val = f64::NEG_INFINITY;
    for (_, (&value, &err)) in visible.filter(|(&x, _)| x <= 2.0) {
        min_val = min_val.min(value - err);
        max_val = max_val.max(value + err);
    }
    if !min_val.is_finite() || !max_val.is_finite() {
        return Err("Profile has no finite values in phase 0-2".into());
    }
    let pad = ((max_val - min_val) * 0.05).max(1e-3);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(16)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(60))
        .build_cartesian_2d(0.0f64..2.0f64, (min_val - pad)..(max_val + pad))?;

    chart
        .configure_mesh()
        .x_desc("Phase")
        .y_desc("Normalized Count Rate (cts/s)")
        .y_label_formatter(&|v| format!("{v:.2}"))
        .label_style(("sans-serif", scaled_font_size(16)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(16)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    chart
        .draw_series(LineSeries::new(steps_mid(phase, profile), &BLUE))?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE));

    chart.draw_series(
        phase
            .iter()
            .zip(profile.iter().zip(error.iter()))
            .filter(|(&x, _)| x <= 2.0)
            .map(|(&x, (&y, &err))| ErrorBar::new_vertical(x, y - err, y, y + err, BLUE, 4)),
    )?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(16)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}
