use lasrc::aerosol::{AerosolRetriever, CorrectionKernel, PixelInputs};
use lasrc::lut::{BandCoefficients, CoefficientStore};
use lasrc::sat_bands::{SatBands, Satellite};

fn band(lambda: f64) -> BandCoefficients {
    BandCoefficients {
        tgo: 0.985,
        roatm: [0.02, 0.11, -0.012, 6.0e-4, 0.0],
        ttatmg: [0.92, -0.085, 0.006, -2.0e-4, 0.0],
        satm: [0.08, 0.055, -0.004, 1.0e-4, 0.0],
        normext_p0a3: 550.0 / lambda,
        roatm_ia_max: 21,
    }
}

fn main() {
    let bands = SatBands::new(Satellite::Landsat8, false);
    let store =
        CoefficientStore::new(bands.wavelengths().iter().map(|&w| band(w)).collect());
    let retriever = AerosolRetriever::new(bands, CorrectionKernel::SemiEmpirical(&store));

    // A bright land pixel, NIR driver band.
    let troatm = vec![0.12, 0.14, 0.16, 0.20, 0.0, 0.18, 0.0, 0.0];
    let erelc = vec![0.3, 0.5, 0.7, 1.0, 0.0, 0.8, 0.0, 0.0];
    let pixel = PixelInputs::new(troatm, erelc, 3, false, 1.0);

    let result = retriever.retrieve(&pixel, 0).unwrap();
    println!(
        "AOT-550: {:.3}, residual: {:.5}, next start index: {}",
        result.raot, result.residual, result.iaots
    );
}
