use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use rusty_gamma::{FitParams, Scale};

use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – materials, fit parameters, failures
// ---------------------------------------------------------------------------

/// Render the left material panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Materials");
    ui.separator();

    let Some(report) = &state.report else {
        ui.label("No manifest loaded.");
        return;
    };

    // Collect what we need so we can mutate state inside the loop.
    let rows: Vec<(String, Option<FitParams>, usize)> = report
        .reductions
        .iter()
        .map(|r| {
            (
                r.material().to_string(),
                r.fit.as_ref().map(|f| f.params),
                r.table.len(),
            )
        })
        .collect();
    let failures: Vec<String> = report.failures.iter().map(|e| e.to_string()).collect();
    let half_values: Vec<(String, f64)> = report
        .model
        .materials()
        .filter_map(|(name, _)| Some((name.to_string(), report.model.half_value_layer(name).ok()?)))
        .collect();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (material, params, points) in &rows {
                let color = state.color_map.color_for(material);
                let selected = state.selected_material.as_deref() == Some(material.as_str());

                ui.horizontal(|ui: &mut Ui| {
                    let mut visible = state.is_visible(material);
                    if ui.checkbox(&mut visible, "").changed() {
                        state.toggle_visible(material);
                    }
                    let label = RichText::new(format!("{material}  ({points} pts)")).color(color);
                    if ui.selectable_label(selected, label).clicked() {
                        state.select_material(material);
                    }
                });

                egui::CollapsingHeader::new("Fit")
                    .id_salt(material)
                    .default_open(selected)
                    .show(ui, |ui: &mut Ui| match params {
                        Some(FitParams::Exponential {
                            amplitude,
                            decay,
                            offset,
                        }) => {
                            ui.monospace(format!("a = {amplitude:.1}"));
                            ui.monospace(format!("b = {decay:.4} /mm"));
                            ui.monospace(format!("c = {offset:.1}"));
                            if let Some((_, hvl)) = half_values.iter().find(|(n, _)| n == material) {
                                ui.monospace(format!("HVL = {hvl:.2} mm"));
                            }
                        }
                        Some(FitParams::Linear { slope, intercept }) => {
                            ui.monospace(format!("a = {slope:.2} /mm"));
                            ui.monospace(format!("c = {intercept:.1}"));
                        }
                        None => {
                            ui.label(RichText::new("not fitted").italics());
                        }
                    });
            }

            if !failures.is_empty() {
                ui.separator();
                ui.strong("Problems");
                for failure in &failures {
                    ui.label(RichText::new(failure).color(Color32::LIGHT_RED));
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open manifest…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let can_reload = state.manifest_path.is_some();
            if ui.add_enabled(can_reload, egui::Button::new("Reload")).clicked() {
                if let Err(e) = state.reload() {
                    log::error!("Failed to reload: {e:#}");
                    state.status_message = Some(format!("Error: {e:#}"));
                }
                ui.close_menu();
            }
        });

        ui.separator();

        for (view, label) in [
            (View::Spectra, "Spectra"),
            (View::Peaks, "Peaks vs depth"),
            (View::Comparison, "Comparison"),
        ] {
            if ui.selectable_label(state.view == view, label).clicked() {
                state.view = view;
            }
        }

        ui.separator();

        if ui
            .selectable_label(state.scale == Scale::Log, "Log counts")
            .clicked()
        {
            state.scale = match state.scale {
                Scale::Log => Scale::Linear,
                Scale::Linear => Scale::Log,
            };
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open run manifest")
        .add_filter("Run manifest", &["json"])
        .pick_file();

    if let Some(path) = file {
        if let Err(e) = state.load(&path) {
            log::error!("Failed to load manifest: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
