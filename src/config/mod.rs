use chrono::NaiveDate;

use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::sat_bands::Satellite;

pub mod error;
pub use error::ConfigError;

/// Scene-level processing configuration. Deserialization validates the
/// document: the acquisition date must parse and fall inside the sensor's
/// operational period, the aux directory must exist, and the tiling
/// parameters must be non-zero.
#[derive(Debug, Clone)]
pub struct Config {
    satellite: Satellite,
    acquisition_date: NaiveDate,
    aux_directory: String,
    pixel_file: Option<String>,
    process_all_sentinel_bands: bool,
    use_semi_empirical_kernel: bool,
    tile_size: usize,
    workers: usize,
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            satellite: Satellite,
            acquisition_date: String,
            aux_directory: Option<String>,
            pixel_file: Option<String>,
            process_all_sentinel_bands: Option<bool>,
            use_semi_empirical_kernel: Option<bool>,
            tile_size: Option<usize>,
            workers: Option<usize>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let acquisition_date = NaiveDate::parse_from_str(&helper.acquisition_date, "%Y-%m-%d")
            .map_err(|e| D::Error::custom(format!("Invalid acquisition_date format: {}", e)))?;

        if acquisition_date < helper.satellite.operational_since() {
            return Err(D::Error::custom(ConfigError::PreOperational(format!(
                "{} predates {} operations (began {})",
                acquisition_date,
                helper.satellite,
                helper.satellite.operational_since()
            ))));
        }

        let aux_directory = helper
            .aux_directory
            .ok_or_else(|| D::Error::custom("aux_directory is required"))?;
        if !Path::new(&aux_directory).exists() {
            return Err(D::Error::custom(ConfigError::AuxDirectory(
                aux_directory.clone(),
            )));
        }

        let tile_size = helper.tile_size.unwrap_or(256);
        if tile_size == 0 {
            return Err(D::Error::custom(ConfigError::TileSize));
        }
        let workers = helper.workers.unwrap_or(4);
        if workers == 0 {
            return Err(D::Error::custom(ConfigError::Workers));
        }

        Ok(Config {
            satellite: helper.satellite,
            acquisition_date,
            aux_directory,
            pixel_file: helper.pixel_file,
            process_all_sentinel_bands: helper.process_all_sentinel_bands.unwrap_or(false),
            use_semi_empirical_kernel: helper.use_semi_empirical_kernel.unwrap_or(true),
            tile_size,
            workers,
        })
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: Config = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn satellite(&self) -> Satellite {
        self.satellite
    }

    pub fn acquisition_date(&self) -> NaiveDate {
        self.acquisition_date
    }

    pub fn aux_directory(&self) -> &Path {
        Path::new(&self.aux_directory)
    }

    pub fn pixel_file(&self) -> Option<&String> {
        self.pixel_file.as_ref()
    }

    pub fn process_all_sentinel_bands(&self) -> bool {
        self.process_all_sentinel_bands
    }

    pub fn use_semi_empirical_kernel(&self) -> bool {
        self.use_semi_empirical_kernel
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("config.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let aux = dir.path().join("aux");
        std::fs::create_dir(&aux).unwrap();

        let body = format!(
            r#"
    {{
        "satellite": "landsat8",
        "acquisition_date": "2024-07-01",
        "aux_directory": "{}",
        "tile_size": 128,
        "workers": 2
    }}
    "#,
            aux.display()
        );
        let path = write_config(dir.path(), &body);

        let config = Config::from_file(path).unwrap();
        assert_eq!(config.satellite(), Satellite::Landsat8);
        assert_eq!(
            config.acquisition_date(),
            NaiveDate::from_ymd_opt(2024, 7, 1).expect("Invalid date")
        );
        assert_eq!(config.tile_size(), 128);
        assert_eq!(config.workers(), 2);
        // Defaults.
        assert!(!config.process_all_sentinel_bands());
        assert!(config.use_semi_empirical_kernel());
        assert!(config.pixel_file().is_none());
    }

    #[test]
    fn test_rejects_pre_operational_date() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{ "satellite": "landsat9", "acquisition_date": "2020-01-01",
                 "aux_directory": "{}" }}"#,
            dir.path().display()
        );
        let path = write_config(dir.path(), &body);
        assert!(Config::from_file(path).is_err());
    }

    #[test]
    fn test_rejects_missing_aux_directory() {
        let dir = tempdir().unwrap();
        let body = r#"{ "satellite": "sentinel2", "acquisition_date": "2024-01-01",
                        "aux_directory": "/no/such/directory" }"#;
        let path = write_config(dir.path(), body);
        assert!(Config::from_file(path).is_err());
    }

    #[test]
    fn test_rejects_zero_tile_size() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{ "satellite": "landsat8", "acquisition_date": "2024-01-01",
                 "aux_directory": "{}", "tile_size": 0 }}"#,
            dir.path().display()
        );
        let path = write_config(dir.path(), &body);
        assert!(Config::from_file(path).is_err());
    }

    #[test]
    fn test_rejects_malformed_date() {
        let dir = tempdir().unwrap();
        let body = format!(
            r#"{{ "satellite": "landsat8", "acquisition_date": "July 1, 2024",
                 "aux_directory": "{}" }}"#,
            dir.path().display()
        );
        let path = write_config(dir.path(), &body);
        assert!(Config::from_file(path).is_err());
    }
}
