use lasrc::aerosol::{
    AerosolRetriever, CorrectionKernel, Geometry, PixelInputs, TileProcessor,
};
use lasrc::config::Config;
use lasrc::lut::{CoefficientStore, LegacyLutTables};
use lasrc::sat_bands::SatBands;

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::AtomicBool;

/// One pixel of the scene driver's hand-off file.
#[derive(Debug, Deserialize)]
struct PixelRecord {
    troatm: Vec<f64>,
    erelc: Vec<f64>,
    iband1: usize,
    #[serde(default)]
    water: bool,
    eps: f64,
    solar_zenith: f64,
    view_zenith: f64,
    relative_azimuth: f64,
    pressure: f64,
    ozone: f64,
    water_vapor: f64,
}

impl From<PixelRecord> for PixelInputs {
    fn from(record: PixelRecord) -> Self {
        let mut pixel = PixelInputs::new(
            record.troatm,
            record.erelc,
            record.iband1,
            record.water,
            record.eps,
        );
        pixel.geometry = Geometry {
            solar_zenith: record.solar_zenith,
            view_zenith: record.view_zenith,
            relative_azimuth: record.relative_azimuth,
            pressure: record.pressure,
            ozone: record.ozone,
            water_vapor: record.water_vapor,
        };
        pixel
    }
}

fn print_stats(label: &str, values: &[f64]) {
    if values.is_empty() {
        return;
    }
    println!(
        "  {} - Min: {:.4}, Max: {:.4}, Mean: {:.4}",
        label,
        values.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
        values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        values.iter().sum::<f64>() / values.len() as f64
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/config/lasrc_config.json".to_string());

    println!("Starting aerosol retrieval...");
    let config = Config::from_file(&config_path)?;
    println!(
        "Scene: {} acquired {}",
        config.satellite(),
        config.acquisition_date()
    );

    let bands = SatBands::new(config.satellite(), config.process_all_sentinel_bands());

    let coefficient_store;
    let legacy_tables;
    let kernel = if config.use_semi_empirical_kernel() {
        coefficient_store =
            CoefficientStore::find_and_load(config.aux_directory(), config.satellite())?;
        CorrectionKernel::SemiEmpirical(&coefficient_store)
    } else {
        legacy_tables = LegacyLutTables::find_and_load(config.aux_directory(), config.satellite())?;
        CorrectionKernel::Legacy(&legacy_tables)
    };

    let Some(pixel_file) = config.pixel_file() else {
        eprintln!("No pixel_file configured; nothing to process");
        return Ok(());
    };
    let reader = BufReader::new(File::open(pixel_file)?);
    let records: Vec<PixelRecord> = serde_json::from_reader(reader)?;
    let pixels: Vec<PixelInputs> = records.into_iter().map(PixelInputs::from).collect();
    println!("Loaded {} pixels from {}", pixels.len(), pixel_file);

    let retriever = AerosolRetriever::new(bands, kernel);
    let processor = TileProcessor::new(retriever, config.tile_size(), config.workers());
    let cancel = AtomicBool::new(false);
    let results = processor.process(&pixels, &cancel)?;

    println!("Retrieved {} pixels", results.len());
    let raot: Vec<f64> = results.iter().map(|r| r.raot).collect();
    let residual: Vec<f64> = results.iter().map(|r| r.residual).collect();
    print_stats("AOT-550", &raot);
    print_stats("Residual", &residual);

    let flagged = results.iter().filter(|r| r.testth).count();
    println!(
        "  Threshold-flagged pixels: {} / {}",
        flagged,
        results.len()
    );

    Ok(())
}
