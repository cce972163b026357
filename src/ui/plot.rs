use std::ops::RangeInclusive;

use eframe::egui::{Color32, Ui};
use egui_plot::{GridMark, Legend, Line, Plot, PlotPoints, Points};
use rusty_gamma::pipeline::MaterialReduction;
use rusty_gamma::Scale;

use crate::color::thickness_ramp;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Axis scaling
// ---------------------------------------------------------------------------

/// Map a count onto the plotted y coordinate. Log plots use log10 with
/// counts below one clamped to one.
fn scale_count(scale: Scale, y: f64) -> f64 {
    match scale {
        Scale::Linear => y,
        Scale::Log => y.max(1.0).log10(),
    }
}

fn log_axis_label(mark: GridMark, _range: &RangeInclusive<f64>) -> String {
    let value = 10f64.powf(mark.value);
    if value >= 1e4 {
        format!("{value:.0e}")
    } else {
        format!("{value:.0}")
    }
}

fn count_plot(id: &str, x_label: String, scale: Scale) -> Plot {
    let plot = Plot::new(id)
        .legend(Legend::default())
        .x_axis_label(x_label)
        .y_axis_label("Counts")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    match scale {
        Scale::Linear => plot,
        Scale::Log => plot.y_axis_formatter(log_axis_label),
    }
}

fn selected<'a>(ui: &mut Ui, state: &'a AppState) -> Option<&'a MaterialReduction> {
    let found = state.report.as_ref().and_then(|report| {
        let material = state.selected_material.as_deref()?;
        report.reduction(material)
    });
    if found.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a run manifest to view spectra  (File → Open manifest…)");
        });
    }
    found
}

// ---------------------------------------------------------------------------
// Spectra overlay: windowed counts on the energy axis, one line per thickness
// ---------------------------------------------------------------------------

pub fn spectra_plot(ui: &mut Ui, state: &AppState) {
    let Some(reduction) = selected(ui, state) else {
        return;
    };
    let base = state.color_map.color_for(reduction.material());
    let colors = thickness_ramp(base, reduction.traces.len());

    count_plot("spectra_plot", "Energy [keV]".to_string(), state.scale).show(ui, |plot_ui| {
        for (trace, color) in reduction.traces.iter().zip(colors) {
            let points: PlotPoints = trace
                .window
                .energies
                .iter()
                .zip(&trace.window.counts)
                .map(|(&e, &c)| [e, scale_count(state.scale, c as f64)])
                .collect();

            plot_ui.line(
                Line::new(points)
                    .name(format!("{} mm", trace.thickness))
                    .color(color)
                    .width(1.5),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Peak count vs absorber depth, with the fitted curve
// ---------------------------------------------------------------------------

pub fn peaks_plot(ui: &mut Ui, state: &AppState) {
    let Some(reduction) = selected(ui, state) else {
        return;
    };
    let color = state.color_map.color_for(reduction.material());
    let scale = state.scale;

    count_plot("peaks_plot", "Depth [mm]".to_string(), scale).show(ui, |plot_ui| {
        let measured: PlotPoints = reduction
            .table
            .sorted_by_thickness()
            .iter()
            .map(|r| [r.thickness, scale_count(scale, r.peak_count as f64)])
            .collect();
        plot_ui.points(
            Points::new(measured)
                .name(format!("{} peaks", reduction.material()))
                .color(color)
                .radius(4.0),
        );

        if let Some(fit) = &reduction.fit {
            let curve: PlotPoints = fit
                .curve
                .iter()
                .map(|&[x, y]| [x, scale_count(scale, y)])
                .collect();
            plot_ui.line(
                Line::new(curve)
                    .name(format!("{:?} fit", fit.params.model()))
                    .color(Color32::WHITE)
                    .width(1.5),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Normalized comparison: exp(-b·x) for every fitted material
// ---------------------------------------------------------------------------

pub fn comparison_plot(ui: &mut Ui, state: &AppState) {
    let Some(report) = &state.report else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a run manifest to compare materials  (File → Open manifest…)");
        });
        return;
    };

    let x_max = report
        .reductions
        .iter()
        .filter_map(|r| r.table.max_thickness())
        .fold(0.0, f64::max)
        .max(1.0);

    Plot::new("comparison_plot")
        .legend(Legend::default())
        .x_axis_label("Depth [mm]")
        .y_axis_label("Proportion remaining")
        .include_y(0.0)
        .include_y(1.0)
        .show(ui, |plot_ui| {
            for (material, b) in report.model.materials() {
                if !state.is_visible(material) {
                    continue;
                }
                let Ok(curve) = report.model.curve(material, x_max, x_max / 200.0) else {
                    continue;
                };
                plot_ui.line(
                    Line::new(PlotPoints::from(curve))
                        .name(format!("{material} (b = {b:.3}/mm)"))
                        .color(state.color_map.color_for(material))
                        .width(2.0),
                );
            }
        });
}
