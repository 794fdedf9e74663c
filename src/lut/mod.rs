use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod coefficients;
pub mod error;
pub mod tables;

// Re-export the main structures for convenience
pub use coefficients::{BandCoefficients, CoefficientStore, NCOEF};
pub use error::LutError;
pub use tables::{LegacyLutTables, LegacyTableParts};

/// Number of tabulated AOT-550 nm values.
pub const NAOT: usize = 22;

/// The AOT-550 nm grid shared by the coefficient stores and the retrieval
/// search. The spacing is deliberately non-uniform (fine at low loadings,
/// coarse above 2.0); do not resample.
pub const AOT_GRID: [f64; NAOT] = [
    0.01, 0.05, 0.10, 0.15, 0.20, 0.30, 0.40, 0.60, 0.80, 1.00, 1.20, 1.40, 1.60, 1.80, 2.00,
    2.30, 2.60, 3.00, 3.50, 4.00, 4.50, 5.00,
];

/// Find an auxiliary file by exact name. The direct path is tried first,
/// then the aux directory is searched recursively.
pub(crate) fn locate_aux_file(aux_dir: &Path, filename: &str) -> Result<PathBuf, LutError> {
    let direct = aux_dir.join(filename);
    if direct.exists() {
        return Ok(direct);
    }

    for entry in WalkDir::new(aux_dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file()
            && let Some(name) = entry.path().file_name()
            && name.to_string_lossy() == filename
        {
            return Ok(entry.path().to_path_buf());
        }
    }

    Err(LutError::FileNotFound(filename.to_string()))
}

/// Read every whitespace-separated token of an ASCII table file as f64.
/// Any non-numeric token is a load failure.
pub(crate) fn read_values(path: &Path) -> Result<Vec<f64>, LutError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut values = Vec::new();

    for line in reader.lines() {
        let line = line?;
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| LutError::Parse {
                file: path.display().to_string(),
                token: token.to_string(),
            })?;
            values.push(value);
        }
    }

    Ok(values)
}
