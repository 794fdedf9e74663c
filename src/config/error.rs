use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    DateParse(chrono::ParseError),
    /// The acquisition date predates the sensor's operational period.
    PreOperational(String),
    AuxDirectory(String),
    TileSize,
    Workers,
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DateParse(e) => write!(f, "Failed to parse date: {}", e),
            ConfigError::PreOperational(msg) => write!(f, "{}", msg),
            ConfigError::AuxDirectory(dir) => {
                write!(f, "aux_directory does not exist: {}", dir)
            }
            ConfigError::TileSize => write!(f, "tile_size must be greater than zero"),
            ConfigError::Workers => write!(f, "workers must be greater than zero"),
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse JSON: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> ConfigError {
        ConfigError::Io(err)
    }
}

impl From<chrono::ParseError> for ConfigError {
    fn from(err: chrono::ParseError) -> ConfigError {
        ConfigError::DateParse(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> ConfigError {
        ConfigError::Json(err)
    }
}
