use std::path::PathBuf;

use eframe::egui;

use crate::state::{AppState, View};
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RustyGammaApp {
    pub state: AppState,
}

impl RustyGammaApp {
    /// Start the viewer, optionally with a manifest already loaded.
    pub fn new(manifest: Option<PathBuf>) -> Self {
        let mut app = Self::default();
        if let Some(path) = manifest {
            if let Err(e) = app.state.load(&path) {
                log::error!("Failed to load manifest: {e:#}");
                app.state.status_message = Some(format!("Error: {e:#}"));
            }
        }
        app
    }
}

impl eframe::App for RustyGammaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: materials and fit results ----
        egui::SidePanel::left("material_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.view {
            View::Spectra => plot::spectra_plot(ui, &self.state),
            View::Peaks => plot::peaks_plot(ui, &self.state),
            View::Comparison => plot::comparison_plot(ui, &self.state),
        });
    }
}
