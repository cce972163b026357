use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusty_gamma::data::loader::load_manifest;
use rusty_gamma::pipeline::{run_manifest, RunReport};
use rusty_gamma::Scale;

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which plot the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Windowed spectra of the selected material, one line per thickness.
    #[default]
    Spectra,
    /// Peak count vs thickness with the fitted curve.
    Peaks,
    /// Proportion remaining for every fitted material.
    Comparison,
}

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Reduction of the loaded manifest (None until user loads a file).
    pub report: Option<RunReport>,

    /// Manifest the report came from, for reloading.
    pub manifest_path: Option<PathBuf>,

    /// Material shown in the spectra and peak views.
    pub selected_material: Option<String>,

    /// Materials left out of the comparison view.
    pub hidden: BTreeSet<String>,

    pub view: View,

    /// y-axis scale of the count plots.
    pub scale: Scale,

    /// Material → colour.
    pub color_map: ColorMap,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    /// Ingest a finished run and reset selections.
    pub fn set_report(&mut self, report: RunReport) {
        let names: Vec<&str> = report.reductions.iter().map(|r| r.material()).collect();
        self.color_map = ColorMap::new(names.iter().copied());
        self.selected_material = names.first().map(|s| s.to_string());
        self.hidden.clear();
        self.scale = report.config.scale;

        self.status_message = match report.failures.len() {
            0 => None,
            n => Some(format!("{n} material(s) reported problems, see side panel")),
        };
        self.report = Some(report);
    }

    /// Load a manifest from disk and reduce it.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let manifest = load_manifest(path)
            .with_context(|| format!("loading manifest {}", path.display()))?;
        let report = run_manifest(&manifest);
        log::info!(
            "Reduced {} materials from {} ({} failures)",
            report.reductions.len(),
            path.display(),
            report.failures.len()
        );
        self.set_report(report);
        self.manifest_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Re-run the current manifest, e.g. after editing count files.
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .manifest_path
            .clone()
            .context("no manifest loaded yet")?;
        self.load(&path)
    }

    pub fn select_material(&mut self, material: &str) {
        self.selected_material = Some(material.to_string());
    }

    /// Toggle a material's visibility in the comparison view.
    pub fn toggle_visible(&mut self, material: &str) {
        if !self.hidden.remove(material) {
            self.hidden.insert(material.to_string());
        }
    }

    pub fn is_visible(&self, material: &str) -> bool {
        !self.hidden.contains(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_gamma::data::model::{MaterialSamples, Spectrum};
    use rusty_gamma::pipeline::run;
    use rusty_gamma::PipelineConfig;

    fn report() -> RunReport {
        let mut counts = vec![1; 800];
        counts[600] = 500;
        let materials = ["Pb", "Cu"].map(|name| {
            MaterialSamples::new(name).with_sample(0.0, "a.dat", Spectrum::new(counts.clone()))
        });
        run(materials, &PipelineConfig::default(), None)
    }

    #[test]
    fn set_report_selects_first_material() {
        let mut state = AppState::default();
        state.set_report(report());
        assert_eq!(state.selected_material.as_deref(), Some("Pb"));
        assert_eq!(state.scale, Scale::Log);
        // one-point tables cannot be fitted
        assert!(state.status_message.is_some());
    }

    #[test]
    fn toggling_hides_and_shows() {
        let mut state = AppState::default();
        state.toggle_visible("Cu");
        assert!(!state.is_visible("Cu"));
        state.toggle_visible("Cu");
        assert!(state.is_visible("Cu"));
    }

    #[test]
    fn reload_without_manifest_fails() {
        assert!(AppState::default().reload().is_err());
    }
}
