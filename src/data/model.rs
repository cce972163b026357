use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{AttenuationError, Result};

// ---------------------------------------------------------------------------
// Spectrum – raw detector counts, index = channel
// ---------------------------------------------------------------------------

/// One acquisition: non-negative counts per detector channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spectrum {
    counts: Vec<u64>,
}

impl Spectrum {
    pub fn new(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl From<Vec<u64>> for Spectrum {
    fn from(counts: Vec<u64>) -> Self {
        Self::new(counts)
    }
}

// ---------------------------------------------------------------------------
// EnergyAxis – calibrated channel energies (keV)
// ---------------------------------------------------------------------------

/// Energy in keV for each channel of a spectrum of a given length.
/// Strictly increasing in channel index.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyAxis {
    energies: Vec<f64>,
}

impl EnergyAxis {
    pub(crate) fn from_energies(energies: Vec<f64>) -> Self {
        Self { energies }
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// Pair the axis with a spectrum and cut both down to `window`.
    /// Used by the viewer to overlay the peak region of several spectra.
    pub fn window_slice(&self, spectrum: &Spectrum, window: &PeakWindow) -> Result<WindowTrace> {
        let len = spectrum.len().min(self.len());
        let range = window.checked_range(len)?;
        Ok(WindowTrace {
            energies: self.energies[range.clone()].to_vec(),
            counts: spectrum.counts()[range].to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// PeakWindow – fixed half-open channel range holding the photopeak
// ---------------------------------------------------------------------------

/// Half-open channel index range `[start, end)` searched for the peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakWindow {
    pub start: usize,
    pub end: usize,
}

impl PeakWindow {
    pub const DEFAULT_START: usize = 500;
    pub const DEFAULT_END: usize = 700;

    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The window as a slice range, or a `Range` error when it is empty or
    /// reaches past `len` channels.
    pub fn checked_range(&self, len: usize) -> Result<Range<usize>> {
        if self.start >= self.end || self.end > len {
            return Err(AttenuationError::Range { window: *self, len });
        }
        Ok(self.start..self.end)
    }
}

impl Default for PeakWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_START, Self::DEFAULT_END)
    }
}

impl fmt::Display for PeakWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The windowed part of one spectrum on its energy axis.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTrace {
    pub energies: Vec<f64>,
    pub counts: Vec<u64>,
}

// ---------------------------------------------------------------------------
// PeakRecord / PeakTable – per-material (thickness, peak count) series
// ---------------------------------------------------------------------------

/// Peak count observed behind one absorber thickness (mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRecord {
    pub thickness: f64,
    pub peak_count: u64,
}

/// All peak records of one material, in insertion order.
///
/// Thicknesses are unique: inserting a thickness that is already present is
/// rejected with `DuplicateKey` rather than overwriting the earlier record.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakTable {
    material: String,
    records: Vec<PeakRecord>,
}

impl PeakTable {
    pub fn new(material: &str) -> Self {
        Self {
            material: material.to_string(),
            records: Vec::new(),
        }
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn records(&self) -> &[PeakRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: PeakRecord) -> Result<()> {
        if self.records.iter().any(|r| r.thickness == record.thickness) {
            return Err(AttenuationError::DuplicateKey {
                thickness: record.thickness,
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Records ordered by increasing thickness, whatever the insertion order.
    pub fn sorted_by_thickness(&self) -> Vec<PeakRecord> {
        let mut sorted = self.records.clone();
        sorted.sort_by(|a, b| a.thickness.total_cmp(&b.thickness));
        sorted
    }

    /// Largest thickness in the table, `None` when empty.
    pub fn max_thickness(&self) -> Option<f64> {
        self.records
            .iter()
            .map(|r| r.thickness)
            .max_by(|a, b| a.total_cmp(b))
    }
}

// ---------------------------------------------------------------------------
// MaterialSamples – the spectra of one material, keyed by thickness
// ---------------------------------------------------------------------------

/// One spectrum taken behind `thickness` mm of absorber. `label` names the
/// source (usually the file) for error reports.
#[derive(Debug, Clone)]
pub struct Sample {
    pub thickness: f64,
    pub label: String,
    pub spectrum: Spectrum,
}

/// A material name plus its ordered samples.
#[derive(Debug, Clone)]
pub struct MaterialSamples {
    pub name: String,
    pub samples: Vec<Sample>,
}

impl MaterialSamples {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            samples: Vec::new(),
        }
    }

    pub fn with_sample(mut self, thickness: f64, label: &str, spectrum: Spectrum) -> Self {
        self.samples.push(Sample {
            thickness,
            label: label.to_string(),
            spectrum,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_must_fit_inside_spectrum() {
        let window = PeakWindow::default();
        assert_eq!(window.checked_range(700).unwrap(), 500..700);
        assert!(matches!(
            window.checked_range(699),
            Err(AttenuationError::Range { len: 699, .. })
        ));
    }

    #[test]
    fn empty_window_is_rejected() {
        assert!(PeakWindow::new(10, 10).checked_range(100).is_err());
        assert!(PeakWindow::new(20, 10).checked_range(100).is_err());
    }

    #[test]
    fn duplicate_thickness_is_rejected() {
        let mut table = PeakTable::new("Pb");
        table
            .insert(PeakRecord { thickness: 1.0, peak_count: 900 })
            .unwrap();
        let err = table
            .insert(PeakRecord { thickness: 1.0, peak_count: 800 })
            .unwrap_err();

        assert!(matches!(err, AttenuationError::DuplicateKey { thickness } if thickness == 1.0));
        assert_eq!(table.records()[0].peak_count, 900);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn sorting_does_not_touch_insertion_order() {
        let mut table = PeakTable::new("Cu");
        for (thickness, peak_count) in [(3.0, 10), (0.0, 40), (1.5, 25)] {
            table.insert(PeakRecord { thickness, peak_count }).unwrap();
        }

        let sorted: Vec<f64> = table.sorted_by_thickness().iter().map(|r| r.thickness).collect();
        assert_eq!(sorted, vec![0.0, 1.5, 3.0]);
        assert_eq!(table.records()[0].thickness, 3.0);
        assert_eq!(table.max_thickness(), Some(3.0));
    }
}
