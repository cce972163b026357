mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::RustyGammaApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    // An optional manifest path opens straight into its reduction.
    let manifest = std::env::args_os().nth(1).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Gamma – Attenuation Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(RustyGammaApp::new(manifest)))),
    )
}
