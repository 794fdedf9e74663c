use crate::aerosol::kernel::CorrectionKernel;
use crate::aerosol::parabola::parabolic_minimum;
use crate::aerosol::pixel::{PixelInputs, RetrievalResult};
use crate::lut::{AOT_GRID, LutError, NAOT};
use crate::sat_bands::{BandPolicy, SatBands};

// Parabolic candidates outside this window are discarded in favour of the
// best grid point.
const RAOT_MIN_VALID: f64 = 0.01;
const RAOT_MAX_VALID: f64 = 4.0;

/// Per-pixel AOT-550 nm search. Sweeps the non-uniform AOT grid until the
/// inter-band residual stops decreasing, then refines the bracket minimum
/// with a parabolic fit. Holds only borrows of the scene's read-only
/// stores, so one retriever can be shared across worker threads.
#[derive(Debug, Clone, Copy)]
pub struct AerosolRetriever<'a> {
    bands: SatBands,
    kernel: CorrectionKernel<'a>,
}

impl<'a> AerosolRetriever<'a> {
    pub fn new(bands: SatBands, kernel: CorrectionKernel<'a>) -> Self {
        Self { bands, kernel }
    }

    pub fn sat_bands(&self) -> SatBands {
        self.bands
    }

    /// RMS model residual at one AOT candidate, plus the plausibility flag.
    ///
    /// Land pixels anchor every participating band against the driver band
    /// (`roslamb_b - erelc_b * ros1`); water pixels penalise the retrieved
    /// reflectances directly. Any band dipping below its threshold raises
    /// the flag. The returned residual is always finite.
    fn residual_at(
        &self,
        pixel: &PixelInputs,
        policy: &BandPolicy,
        aot550: f64,
    ) -> Result<(f64, bool), LutError> {
        let mut testth = false;
        let mut sum = 0.0;
        let mut nbval = 0usize;

        let ros1 = if pixel.water {
            0.0
        } else {
            let r = self.kernel.surface_reflectance(
                pixel.iband1,
                aot550,
                band_value(&pixel.troatm, pixel.iband1),
                &pixel.geometry,
                pixel.eps,
            )?;
            if !r.is_finite() {
                testth = true;
                0.0
            } else {
                if r - band_value(policy.tth, pixel.iband1) < 0.0 {
                    testth = true;
                }
                r
            }
        };

        for &b in policy.bands {
            if band_value(&pixel.erelc, b) <= 0.0 {
                continue;
            }
            if !pixel.water && b == pixel.iband1 {
                continue;
            }

            let roslamb = self.kernel.surface_reflectance(
                b,
                aot550,
                band_value(&pixel.troatm, b),
                &pixel.geometry,
                pixel.eps,
            )?;
            if !roslamb.is_finite() {
                testth = true;
                continue;
            }
            if roslamb - band_value(policy.tth, b) < 0.0 {
                testth = true;
            }

            let point_error = if pixel.water {
                roslamb
            } else {
                roslamb - band_value(&pixel.erelc, b) * ros1
            };
            sum += point_error * point_error;
            nbval += 1;
        }

        if nbval == 0 {
            return Ok((0.0, true));
        }
        let residual = sum.sqrt() / nbval as f64;
        if residual.is_finite() {
            Ok((residual, testth))
        } else {
            Ok((f64::MAX, true))
        }
    }

    /// Retrieve the AOT for one pixel, starting the grid sweep at the
    /// warm-start index `iaots` carried over from the previous pixel.
    ///
    /// Never fails on the semi-empirical kernel; on the legacy kernel a
    /// lookup with unusable arguments is fatal to the pixel and propagates.
    pub fn retrieve(
        &self,
        pixel: &PixelInputs,
        iaots: usize,
    ) -> Result<RetrievalResult, LutError> {
        let policy = self.bands.policy(pixel.water);
        let start = iaots.min(NAOT - 1);

        let mut residual1 = 2000.0;
        let mut residual2 = 1000.0;
        let mut raot1 = 1.0e-4;
        let mut raot2 = 1.0e-6;
        let mut iaot1 = 0usize;
        let mut iaot2 = 0usize;

        let mut iaot = start;
        let mut raot550 = AOT_GRID[iaot];
        let mut residual = residual1;
        let mut testth = false;
        let mut any_testth = false;

        // Walk up the grid while the residual strictly decreases. The
        // plausibility flag halts the expansion before the next index but
        // leaves the stored bracket intact.
        while iaot < NAOT && !testth {
            raot550 = AOT_GRID[iaot];
            let (r, th) = self.residual_at(pixel, &policy, raot550)?;
            residual = r;
            testth = th;
            any_testth |= th;
            if residual >= residual1 {
                break;
            }
            residual2 = residual1;
            raot2 = raot1;
            iaot2 = iaot1;
            residual1 = residual;
            raot1 = raot550;
            iaot1 = iaot;
            iaot += 1;
        }

        let raot_saved = raot550;
        let residual_saved = residual;
        let mut raot = raot_saved;
        let mut best_residual = residual_saved;

        if iaot > 1 {
            // Refine the bracket minimum. A fitted minimum outside the
            // validity window (or a degenerate bracket) keeps the sweep's
            // exit point.
            if let Some(raot_min) =
                parabolic_minimum((raot2, residual2), (raot1, residual1), (raot550, residual))
                && (RAOT_MIN_VALID..=RAOT_MAX_VALID).contains(&raot_min)
            {
                let (residualm, th) = self.residual_at(pixel, &policy, raot_min)?;
                any_testth |= th;
                raot = raot_min;
                best_residual = residualm;
                if residual_saved < best_residual {
                    raot = raot_saved;
                    best_residual = residual_saved;
                }
                if residual1 < best_residual {
                    raot = raot1;
                    best_residual = residual1;
                }
                if residual2 < best_residual {
                    raot = raot2;
                    best_residual = residual2;
                }
            }
        } else if iaot > start {
            // Too few points to fit, but the sweep did accept its first
            // candidate; report that one rather than the point that broke
            // the descent.
            raot = raot1;
            best_residual = residual1;
        }

        // Warm-start hint for the next pixel; water pixels that never
        // descended restart the sweep at the grid origin.
        let iaots_next = if pixel.water && iaot == 1 {
            0
        } else {
            iaot2.saturating_sub(3)
        };

        Ok(RetrievalResult {
            raot: raot.clamp(0.01, 5.0),
            residual: best_residual.max(0.0),
            iaots: iaots_next,
            testth: any_testth,
        })
    }
}

#[inline]
fn band_value(values: &[f64], band: usize) -> f64 {
    values.get(band).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::kernel::forward_toa;
    use crate::aerosol::pixel::PixelInputs;
    use crate::lut::CoefficientStore;
    use crate::lut::coefficients::demo_store;
    use crate::lut::tables::demo_tables;
    use crate::sat_bands::{SatBands, Satellite};

    fn landsat_store() -> CoefficientStore {
        demo_store(SatBands::new(Satellite::Landsat8, false).wavelengths())
    }

    /// A land pixel whose TOA reflectances are exactly consistent with the
    /// given surface reflectance ratios at `aot_true`.
    fn seeded_land_pixel(store: &CoefficientStore, aot_true: f64) -> PixelInputs {
        let erelc = vec![0.3, 0.5, 0.7, 1.0, 0.0, 0.8, 0.0, 0.0];
        let ros1 = 0.25;
        let eps = 1.0;
        let mut troatm = vec![0.0; 8];
        for (b, &w) in erelc.iter().enumerate() {
            if w > 0.0 {
                troatm[b] = forward_toa(store, b, aot_true, eps, w * ros1);
            }
        }
        PixelInputs::new(troatm, erelc, 3, false, eps)
    }

    #[test]
    fn test_land_retrieval_recovers_seeded_aot() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );
        let pixel = seeded_land_pixel(&store, 0.2);

        let out = retriever.retrieve(&pixel, 0).unwrap();
        assert!((out.raot - 0.2).abs() <= 0.05, "raot = {}", out.raot);
        assert!(out.residual < 1e-2, "residual = {}", out.residual);
        assert!(!out.testth);
    }

    #[test]
    fn test_descending_phase_is_strictly_monotonic() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );
        let pixel = seeded_land_pixel(&store, 0.2);
        let policy = retriever.bands.policy(false);

        // Indices 0..4 cover 0.01..0.2; the residual must fall all the way
        // to the seeded minimum, then rise.
        let residuals: Vec<f64> = (0..=5)
            .map(|i| retriever.residual_at(&pixel, &policy, AOT_GRID[i]).unwrap().0)
            .collect();
        for w in residuals[..5].windows(2) {
            assert!(w[1] < w[0], "not descending: {:?}", residuals);
        }
        assert!(residuals[5] > residuals[4]);
    }

    #[test]
    fn test_refinement_never_worsens_bracket() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );
        let pixel = seeded_land_pixel(&store, 0.2);
        let policy = retriever.bands.policy(false);

        let out = retriever.retrieve(&pixel, 0).unwrap();
        let grid_best = (0..NAOT)
            .map(|i| retriever.residual_at(&pixel, &policy, AOT_GRID[i]).unwrap().0)
            .fold(f64::INFINITY, f64::min);
        assert!(out.residual <= grid_best + 1e-15);
    }

    #[test]
    fn test_water_retrieval_converges_and_resets_warm_start() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );
        let pixel = PixelInputs::new(vec![0.04; 8], vec![1.0; 8], 0, true, 1.0);

        let out = retriever.retrieve(&pixel, 0).unwrap();
        assert!(out.raot >= 0.01 && out.raot <= 0.4, "raot = {}", out.raot);
        assert!(out.residual < 0.05, "residual = {}", out.residual);
        assert_eq!(out.iaots, 0);
    }

    #[test]
    fn test_threshold_hit_on_first_step_skips_refinement() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );

        // Band 0 reconstructs to exactly zero surface reflectance at the
        // first grid point, under its 1e-3 threshold.
        let mut troatm = vec![0.0; 8];
        let mut erelc = vec![0.0; 8];
        erelc[0] = 0.3;
        erelc[3] = 1.0;
        troatm[0] = forward_toa(&store, 0, AOT_GRID[0], 1.0, 0.0);
        troatm[3] = forward_toa(&store, 3, AOT_GRID[0], 1.0, 0.25);
        let pixel = PixelInputs::new(troatm, erelc, 3, false, 1.0);

        let out = retriever.retrieve(&pixel, 0).unwrap();
        assert!(out.testth);
        assert_eq!(out.raot, AOT_GRID[0]);
        // Residual of the single participating band: |0 - 0.3 * 0.25|.
        assert!((out.residual - 0.075).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_window_parabola_keeps_exit_point() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );
        // Minimum seeded at 4.5: the fitted minimum lands above the 4.0
        // validity window and is discarded.
        let pixel = seeded_land_pixel(&store, 4.5);

        let out = retriever.retrieve(&pixel, 0).unwrap();
        assert!(out.raot >= 4.5, "raot = {}", out.raot);
        assert!(out.residual.is_finite());
    }

    #[test]
    fn test_warm_start_idempotence() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );
        let pixel = seeded_land_pixel(&store, 0.6);

        let a = retriever.retrieve(&pixel, 2).unwrap();
        let b = retriever.retrieve(&pixel, 2).unwrap();
        assert_eq!(a.raot.to_bits(), b.raot.to_bits());
        assert_eq!(a.residual.to_bits(), b.residual.to_bits());
        assert_eq!(a.iaots, b.iaots);
        // The sweep tops out at 0.8 (index 8), so the bracket's second
        // point sits at index 6 and the exported hint is 6 - 3.
        assert_eq!(a.iaots, 3);
    }

    #[test]
    fn test_result_invariants_over_input_sweep() {
        let store = landsat_store();
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::SemiEmpirical(&store),
        );

        for &aot in &[0.01, 0.1, 0.8, 2.0, 5.0] {
            for &eps in &[-0.5, 0.0, 1.0, 2.0] {
                for start in [0, 5, 21, 40] {
                    let mut pixel = seeded_land_pixel(&store, aot);
                    pixel.eps = eps;
                    let out = retriever.retrieve(&pixel, start).unwrap();
                    assert!((0.01..=5.0).contains(&out.raot));
                    assert!(out.residual.is_finite() && out.residual >= 0.0);
                    assert!(out.iaots < NAOT);
                }
            }
        }
    }

    #[test]
    fn test_sentinel2_default_ignores_excluded_bands() {
        let s2 = SatBands::new(Satellite::Sentinel2, false);
        let store = demo_store(s2.wavelengths());
        let retriever =
            AerosolRetriever::new(s2, CorrectionKernel::SemiEmpirical(&store));

        let eps = 1.0;
        let mut troatm = vec![0.0; 13];
        let mut erelc = vec![0.0; 13];
        for (b, w) in [(3usize, 1.0), (8, 0.9), (12, 0.5)] {
            erelc[b] = w;
            troatm[b] = forward_toa(&store, b, 0.3, eps, w * 0.2);
        }
        let clean = PixelInputs::new(troatm, erelc, 3, false, eps);

        // Poisoning the excluded bands must not change anything: they are
        // never evaluated.
        let mut poisoned = clean.clone();
        poisoned.erelc[9] = 5.0;
        poisoned.erelc[10] = 5.0;
        poisoned.troatm[9] = f64::NAN;
        poisoned.troatm[10] = f64::NAN;

        let a = retriever.retrieve(&clean, 0).unwrap();
        let b = retriever.retrieve(&poisoned, 0).unwrap();
        assert_eq!(a.raot.to_bits(), b.raot.to_bits());
        assert_eq!(a.residual.to_bits(), b.residual.to_bits());
        assert!((a.raot - 0.3).abs() < 0.1);
    }

    #[test]
    fn test_legacy_kernel_retrieval_runs() {
        let tables = demo_tables(8);
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::Legacy(&tables),
        );
        let pixel = PixelInputs::new(vec![0.08; 8], vec![1.0; 8], 0, true, 1.0);

        let out = retriever.retrieve(&pixel, 0).unwrap();
        assert!((0.01..=5.0).contains(&out.raot));
        assert!(out.residual.is_finite() && out.residual >= 0.0);
    }

    #[test]
    fn test_legacy_lookup_failure_is_fatal_to_pixel() {
        let tables = demo_tables(8);
        let retriever = AerosolRetriever::new(
            SatBands::new(Satellite::Landsat8, false),
            CorrectionKernel::Legacy(&tables),
        );
        let mut pixel = PixelInputs::new(vec![0.08; 8], vec![1.0; 8], 0, true, 1.0);
        pixel.geometry.pressure = f64::NAN;

        assert!(retriever.retrieve(&pixel, 0).is_err());
    }
}
