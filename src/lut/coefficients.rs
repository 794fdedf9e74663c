use crate::lut::{AOT_GRID, LutError, NAOT};
use crate::sat_bands::Satellite;
use std::path::Path;

/// Number of coefficients of the semi-empirical polynomials (degree 4 in
/// AOT-550 nm).
pub const NCOEF: usize = 5;

/// Values stored per band and per auxiliary-file row: `tgo`, three
/// polynomials, `normext_p0a3`, `roatm_iaMax`.
const VALUES_PER_BAND: usize = 3 + 3 * NCOEF;

/// Per-band semi-empirical coefficients, immutable after scene load.
#[derive(Debug, Clone)]
pub struct BandCoefficients {
    /// Gaseous transmittance along the sun-target-sensor path.
    pub tgo: f64,
    /// Intrinsic atmospheric reflectance polynomial in AOT-550 nm.
    pub roatm: [f64; NCOEF],
    /// Total (down x up) transmittance polynomial, other-gas included.
    pub ttatmg: [f64; NCOEF],
    /// Spherical albedo polynomial.
    pub satm: [f64; NCOEF],
    /// Normalised extinction at the reference slice (pressure layer 0,
    /// AOT index 3); the basis of the spectral AOT scaling.
    pub normext_p0a3: f64,
    /// AOT grid index above which the polynomials are evaluated at the grid
    /// value instead of the requested AOT.
    pub roatm_ia_max: usize,
}

fn poly(coef: &[f64; NCOEF], x: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Read-only store of the per-band coefficient sets for one scene.
#[derive(Debug, Clone)]
pub struct CoefficientStore {
    bands: Vec<BandCoefficients>,
}

impl CoefficientStore {
    pub fn new(bands: Vec<BandCoefficients>) -> Self {
        Self { bands }
    }

    /// Load the coefficient file for `satellite`, searching `aux_dir`
    /// recursively.
    pub fn find_and_load(aux_dir: &Path, satellite: Satellite) -> Result<Self, LutError> {
        let filename = format!("{}_aerosol_coefficients.txt", satellite.table_prefix());
        let path = super::locate_aux_file(aux_dir, &filename)?;
        Self::from_file(&path, satellite.num_bands())
    }

    /// Parse a coefficient file: per band one row of `tgo`, five `roatm`
    /// coefficients, five `ttatmg`, five `satm`, `normext_p0a3` and the
    /// clamp index.
    pub fn from_file(path: &Path, num_bands: usize) -> Result<Self, LutError> {
        let values = super::read_values(path)?;
        let expected = num_bands * VALUES_PER_BAND;
        if values.len() < expected {
            return Err(LutError::MissingNode {
                table: "aerosol coefficients",
                expected,
                found: values.len(),
            });
        }

        let mut bands = Vec::with_capacity(num_bands);
        for row in values.chunks_exact(VALUES_PER_BAND).take(num_bands) {
            let mut roatm = [0.0; NCOEF];
            let mut ttatmg = [0.0; NCOEF];
            let mut satm = [0.0; NCOEF];
            roatm.copy_from_slice(&row[1..1 + NCOEF]);
            ttatmg.copy_from_slice(&row[1 + NCOEF..1 + 2 * NCOEF]);
            satm.copy_from_slice(&row[1 + 2 * NCOEF..1 + 3 * NCOEF]);

            let ia_max = row[VALUES_PER_BAND - 1];
            if !(0.0..NAOT as f64).contains(&ia_max) {
                return Err(LutError::Range {
                    what: "roatm_iaMax",
                    value: ia_max,
                });
            }

            bands.push(BandCoefficients {
                tgo: row[0],
                roatm,
                ttatmg,
                satm,
                normext_p0a3: row[VALUES_PER_BAND - 2],
                roatm_ia_max: ia_max as usize,
            });
        }

        Ok(Self { bands })
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, band: usize) -> &BandCoefficients {
        &self.bands[band]
    }

    /// The AOT-550 nm grid the coefficients were fitted on. Shared with the
    /// retrieval search so both sides use one definition.
    pub fn aot_grid(&self) -> &'static [f64; NAOT] {
        &AOT_GRID
    }

    /// Evaluate the three polynomials at `aot550`, clamped at the band's
    /// top grid node to prevent runaway extrapolation near AOT 5.0.
    /// Returns `(roatm, ttatmg, satm)`. Cannot fail.
    pub fn evaluate(&self, band: usize, aot550: f64) -> (f64, f64, f64) {
        let c = &self.bands[band];
        self.evaluate_at(band, aot550.min(AOT_GRID[c.roatm_ia_max]))
    }

    /// Evaluate at the exact abscissa, with no clamping. The correction
    /// kernel clamps the raw AOT once and then applies the spectral
    /// scaling; the scaled point is evaluated as-is even when the scaling
    /// pushes it past the clamp node.
    pub(crate) fn evaluate_at(&self, band: usize, x: f64) -> (f64, f64, f64) {
        let c = &self.bands[band];
        (poly(&c.roatm, x), poly(&c.ttatmg, x), poly(&c.satm, x))
    }
}

#[cfg(test)]
pub(crate) fn demo_band(lambda: f64) -> BandCoefficients {
    // A well-behaved synthetic band: path reflectance grows with AOT,
    // transmittance decays, spherical albedo grows slowly.
    BandCoefficients {
        tgo: 0.985,
        roatm: [0.02, 0.11, -0.012, 6.0e-4, 0.0],
        ttatmg: [0.92, -0.085, 0.006, -2.0e-4, 0.0],
        satm: [0.08, 0.055, -0.004, 1.0e-4, 0.0],
        normext_p0a3: 550.0 / lambda,
        roatm_ia_max: NAOT - 1,
    }
}

#[cfg(test)]
pub(crate) fn demo_store(wavelengths: &[f64]) -> CoefficientStore {
    CoefficientStore::new(wavelengths.iter().map(|&w| demo_band(w)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_polynomial_evaluation() {
        // 1 + 2x + 3x^2 at x = 2 -> 17
        let coef = [1.0, 2.0, 3.0, 0.0, 0.0];
        assert!((poly(&coef, 2.0) - 17.0).abs() < 1e-12);
        assert!((poly(&coef, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_clamps_at_band_top_node() {
        let mut band = demo_band(482.0);
        band.roatm_ia_max = 17; // grid value 3.0
        let store = CoefficientStore::new(vec![band]);

        let at_clamp = store.evaluate(0, AOT_GRID[17]);
        let beyond = store.evaluate(0, 5.0);
        assert_eq!(at_clamp, beyond);

        // Below the clamp the polynomials move.
        let below = store.evaluate(0, 1.0);
        assert!((below.0 - at_clamp.0).abs() > 1e-6);
    }

    #[test]
    fn test_evaluate_at_does_not_clamp() {
        let mut band = demo_band(482.0);
        band.roatm_ia_max = 17; // grid value 3.0
        let store = CoefficientStore::new(vec![band]);

        assert_ne!(store.evaluate_at(0, 3.5), store.evaluate(0, 3.5));
        assert_eq!(store.evaluate_at(0, 3.0), store.evaluate(0, 3.5));
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("landsat_aerosol_coefficients.txt");
        let mut file = File::create(&path).unwrap();
        for b in 0..8 {
            let tgo = 0.9 + 0.01 * b as f64;
            write!(file, "{}", tgo).unwrap();
            for i in 0..3 * NCOEF {
                write!(file, " {}", 0.001 * (b * 15 + i) as f64).unwrap();
            }
            writeln!(file, " {} {}", 1.1, 18).unwrap();
        }

        let store = CoefficientStore::from_file(&path, 8).unwrap();
        assert_eq!(store.num_bands(), 8);
        assert!((store.band(3).tgo - 0.93).abs() < 1e-12);
        assert_eq!(store.band(7).roatm_ia_max, 18);
        assert!((store.band(0).normext_p0a3 - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_from_file_reports_short_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "0.9 0.01 0.02").unwrap();

        let err = CoefficientStore::from_file(&path, 8).unwrap_err();
        assert!(matches!(
            err,
            LutError::MissingNode {
                expected: 144,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_from_file_rejects_bad_clamp_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        let mut file = File::create(&path).unwrap();
        for _ in 0..VALUES_PER_BAND - 1 {
            write!(file, "0.5 ").unwrap();
        }
        writeln!(file, "99").unwrap();

        let err = CoefficientStore::from_file(&path, 1).unwrap_err();
        assert!(matches!(err, LutError::Range { .. }));
    }

    #[test]
    fn test_shared_grid_definition() {
        let store = demo_store(&[482.0]);
        assert_eq!(store.aot_grid(), &AOT_GRID);
    }
}
