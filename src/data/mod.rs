/// Data layer: spectra, calibration, peak extraction and file I/O.
///
/// Architecture:
/// ```text
///  *.dat count files (one per thickness)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Spectrum, manifest → MaterialSamples
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ calibration  │  channel → keV  (EnergyAxis)
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  peaks    │  max count in PeakWindow → PeakTable  (+ listing file)
///   └──────────┘
/// ```

pub mod calibration;
pub mod loader;
pub mod model;
pub mod peaks;
