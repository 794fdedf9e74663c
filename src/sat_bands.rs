use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt::Display;

/// Nominal band-centre wavelengths [nm] of the Landsat-8/9 OLI reflective
/// bands (coastal aerosol through SWIR-2, plus the cirrus band).
const LANDSAT_WAVELENGTHS: [f64; 8] = [
    443.0, 482.0, 561.0, 655.0, 865.0, 1609.0, 2201.0, 1373.0,
];

/// Nominal band-centre wavelengths [nm] of the thirteen Sentinel-2 MSI bands.
const SENTINEL2_WAVELENGTHS: [f64; 13] = [
    443.0, 490.0, 560.0, 665.0, 705.0, 740.0, 783.0, 842.0, 865.0, 945.0, 1375.0, 1610.0, 2190.0,
];

/// Reflective bands the aerosol correction is applied to. Landsat skips the
/// cirrus band; Sentinel-2 by default skips the water-vapour and cirrus
/// bands (9 and 10).
const LANDSAT_BANDS: [usize; 7] = [0, 1, 2, 3, 4, 5, 6];
const SENTINEL2_BANDS: [usize; 11] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 11, 12];
const SENTINEL2_ALL_BANDS: [usize; 13] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

// Minimum plausible surface reflectance per band. A retrieved reflectance
// below the threshold flags the pixel and halts the AOT expansion.
const LANDSAT_TTH_LAND: [f64; 8] = [1.0e-3, 1.0e-3, 0.0, 1.0e-3, 0.0, 0.0, 1.0e-4, 0.0];
const LANDSAT_TTH_WATER: [f64; 8] = [1.0e-3, 1.0e-3, 0.0, 1.0e-3, 1.0e-3, 0.0, 1.0e-4, 0.0];

const SENTINEL2_TTH_LAND: [f64; 13] = [
    1.0e-3, 1.0e-3, 0.0, 1.0e-3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0e-4,
];
#[cfg(not(feature = "alt-water-thresholds"))]
const SENTINEL2_TTH_WATER: [f64; 13] = [
    1.0e-3, 0.0, 0.0, 1.0e-3, 0.0, 0.0, 0.0, 0.0, 1.0e-3, 0.0, 0.0, 0.0, 1.0e-4,
];
// Band 1 restored to the land value; the shipped table zeroes it for water
// while every other water table keeps it.
#[cfg(feature = "alt-water-thresholds")]
const SENTINEL2_TTH_WATER: [f64; 13] = [
    1.0e-3, 1.0e-3, 0.0, 1.0e-3, 0.0, 0.0, 0.0, 0.0, 1.0e-3, 0.0, 0.0, 0.0, 1.0e-4,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Satellite {
    #[serde(rename(deserialize = "landsat8"))]
    Landsat8,
    #[serde(rename(deserialize = "landsat9"))]
    Landsat9,
    #[serde(rename(deserialize = "sentinel2"))]
    Sentinel2,
}

impl Satellite {
    /// Number of reflective (solar) bands carried for this sensor.
    pub fn num_bands(&self) -> usize {
        match self {
            Satellite::Landsat8 | Satellite::Landsat9 => LANDSAT_WAVELENGTHS.len(),
            Satellite::Sentinel2 => SENTINEL2_WAVELENGTHS.len(),
        }
    }

    /// Date the sensor started producing usable scenes.
    pub fn operational_since(&self) -> NaiveDate {
        match self {
            Satellite::Landsat8 => NaiveDate::from_ymd_opt(2013, 5, 30),
            Satellite::Landsat9 => NaiveDate::from_ymd_opt(2022, 2, 10),
            Satellite::Sentinel2 => NaiveDate::from_ymd_opt(2015, 6, 23),
        }
        .expect("valid hard-coded date")
    }

    /// Prefix of the auxiliary coefficient/table files for this sensor.
    /// Landsat-8 and -9 share one set of tables.
    pub fn table_prefix(&self) -> &'static str {
        match self {
            Satellite::Landsat8 | Satellite::Landsat9 => "landsat",
            Satellite::Sentinel2 => "sentinel2",
        }
    }
}

/// Band set the retrieval iterates over, with the per-band reflectance
/// thresholds. Both slices are indexed in raw band-index space.
#[derive(Debug, Clone, Copy)]
pub struct BandPolicy {
    pub bands: &'static [usize],
    pub tth: &'static [f64],
}

#[derive(Debug, Clone, Copy)]
pub struct SatBands {
    sensor: Satellite,
    wavelengths: &'static [f64],
    bands: &'static [usize],
}

impl SatBands {
    pub fn new(sensor: Satellite, process_all_sentinel_bands: bool) -> Self {
        let (wavelengths, bands): (&'static [f64], &'static [usize]) = match sensor {
            Satellite::Landsat8 | Satellite::Landsat9 => (&LANDSAT_WAVELENGTHS, &LANDSAT_BANDS),
            Satellite::Sentinel2 if process_all_sentinel_bands => {
                (&SENTINEL2_WAVELENGTHS, &SENTINEL2_ALL_BANDS)
            }
            Satellite::Sentinel2 => (&SENTINEL2_WAVELENGTHS, &SENTINEL2_BANDS),
        };
        Self {
            sensor,
            wavelengths,
            bands,
        }
    }

    pub fn sensor(&self) -> Satellite {
        self.sensor
    }

    pub fn wavelengths(&self) -> &'static [f64] {
        self.wavelengths
    }

    /// Band range and reflectance thresholds for one pixel class.
    pub fn policy(&self, water: bool) -> BandPolicy {
        let tth: &'static [f64] = match self.sensor {
            Satellite::Landsat8 | Satellite::Landsat9 => {
                if water {
                    &LANDSAT_TTH_WATER
                } else {
                    &LANDSAT_TTH_LAND
                }
            }
            Satellite::Sentinel2 => {
                if water {
                    &SENTINEL2_TTH_WATER
                } else {
                    &SENTINEL2_TTH_LAND
                }
            }
        };
        BandPolicy {
            bands: self.bands,
            tth,
        }
    }
}

impl Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Satellite::Landsat8 => write!(f, "Landsat-8"),
            Satellite::Landsat9 => write!(f, "Landsat-9"),
            Satellite::Sentinel2 => write!(f, "Sentinel-2"),
        }
    }
}

impl Display for SatBands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Satellite: {}, correction bands: {:?}",
            self.sensor, self.bands
        )
    }
}
