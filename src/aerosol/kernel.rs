use crate::aerosol::pixel::Geometry;
use crate::lut::{AOT_GRID, CoefficientStore, LegacyLutTables, LutError};

/// Floor for the Lambertian inversion denominator. Very bright pixels under
/// heavy aerosol can drive `ttatmg + satm * y` through zero; the clamp keeps
/// the output finite and leaves rejection to the caller's threshold test.
const DENOM_EPS: f64 = 1.0e-12;

/// Invert the Lambertian coupling equation
/// `troatm = tgo * (roatm + ttatmg * rho / (1 - satm * rho))`
/// for the surface reflectance `rho`.
fn invert(troatm: f64, tgo: f64, roatm: f64, ttatmg: f64, satm: f64) -> f64 {
    let y = troatm / tgo - roatm;
    y / (ttatmg + satm * y).max(DENOM_EPS)
}

/// Lambertian surface reflectance from the semi-empirical coefficients.
///
/// The raw AOT is clamped once at the band's top grid node, then scaled to
/// the band wavelength through `normext_p0a3^eps` (the spectral dependence
/// `tau(lambda) = tau(550) * (550/lambda)^eps`), and the three polynomials
/// are evaluated at the scaled point as-is. Deterministic and infallible.
pub fn semi_empirical(
    store: &CoefficientStore,
    band: usize,
    aot550: f64,
    troatm: f64,
    eps: f64,
) -> f64 {
    let c = store.band(band);
    let clamped = aot550.min(AOT_GRID[c.roatm_ia_max]);
    let x = clamped * c.normext_p0a3.powf(eps);
    let (roatm, ttatmg, satm) = store.evaluate_at(band, x);
    invert(troatm, c.tgo, roatm, ttatmg, satm)
}

/// Output of the table-driven correction: the surface reflectance plus the
/// intermediate atmospheric terms, surfaced for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct LegacyCorrection {
    pub roslamb: f64,
    pub roatm: f64,
    pub ttatmg: f64,
    pub satm: f64,
    pub tgo: f64,
    /// Single-scattering Rayleigh path reflectance. Computed for every
    /// pixel; the retrieval itself never consumes it.
    pub xrorayp: f64,
}

/// Lambertian surface reflectance from the traditional tables. The table
/// lookups clamp pressure and angles; non-finite arguments propagate as
/// `LutError` and are fatal to the pixel.
pub fn legacy(
    tables: &LegacyLutTables,
    band: usize,
    aot550: f64,
    troatm: f64,
    geometry: &Geometry,
    eps: f64,
) -> Result<LegacyCorrection, LutError> {
    let xts = geometry.solar_zenith.to_radians();
    let xtv = geometry.view_zenith.to_radians();
    let air_mass = 1.0 / xts.cos() + 1.0 / xtv.cos();

    let x = aot550 * tables.normext_p0a3(band).powf(eps);

    let roatm = tables.path_reflectance(
        band,
        geometry.pressure,
        x,
        geometry.solar_zenith,
        geometry.view_zenith,
    )?;
    let t_sun = tables.transmission(band, geometry.pressure, x, geometry.solar_zenith)?;
    let t_view = tables.transmission(band, geometry.pressure, x, geometry.view_zenith)?;
    let satm = tables.spherical_albedo(band, geometry.pressure, x)?;
    let (tgoz, tgwv, tgog) = tables.gaseous_transmittance(
        band,
        geometry.pressure,
        air_mass,
        geometry.ozone,
        geometry.water_vapor,
    );

    let tgo = tgoz * tgog;
    let ttatmg = t_sun * t_view * tgwv;
    let xrorayp = rayleigh_reflectance(
        tables.tauray(band, geometry.pressure),
        xts,
        xtv,
        geometry.relative_azimuth.to_radians(),
    );

    Ok(LegacyCorrection {
        roslamb: invert(troatm, tgo, roatm, ttatmg, satm),
        roatm,
        ttatmg,
        satm,
        tgo,
        xrorayp,
    })
}

/// Single-scattering Rayleigh path reflectance
/// `tau_ray * P(theta) / (4 mu_s mu_v)` with the Rayleigh phase function
/// `P(theta) = 3/4 (1 + cos^2 theta)`.
fn rayleigh_reflectance(tauray: f64, xts: f64, xtv: f64, xfi: f64) -> f64 {
    let xmus = xts.cos();
    let xmuv = xtv.cos();
    let cos_scatter = -xmus * xmuv + xts.sin() * xtv.sin() * xfi.cos();
    let phase = 0.75 * (1.0 + cos_scatter * cos_scatter);
    tauray * phase / (4.0 * xmus * xmuv)
}

/// The correction variant active for a retrieval, borrowing the scene's
/// read-only store.
#[derive(Debug, Clone, Copy)]
pub enum CorrectionKernel<'a> {
    SemiEmpirical(&'a CoefficientStore),
    Legacy(&'a LegacyLutTables),
}

impl CorrectionKernel<'_> {
    pub fn surface_reflectance(
        &self,
        band: usize,
        aot550: f64,
        troatm: f64,
        geometry: &Geometry,
        eps: f64,
    ) -> Result<f64, LutError> {
        match self {
            CorrectionKernel::SemiEmpirical(store) => {
                Ok(semi_empirical(store, band, aot550, troatm, eps))
            }
            CorrectionKernel::Legacy(tables) => {
                Ok(legacy(tables, band, aot550, troatm, geometry, eps)?.roslamb)
            }
        }
    }
}

/// Forward model matching `semi_empirical`: the TOA reflectance a surface
/// of reflectance `rho` would produce. Test fixture only.
#[cfg(test)]
pub(crate) fn forward_toa(
    store: &CoefficientStore,
    band: usize,
    aot550: f64,
    eps: f64,
    rho: f64,
) -> f64 {
    let c = store.band(band);
    let x = aot550.min(AOT_GRID[c.roatm_ia_max]) * c.normext_p0a3.powf(eps);
    let (roatm, ttatmg, satm) = store.evaluate_at(band, x);
    c.tgo * (roatm + ttatmg * rho / (1.0 - satm * rho))
}
