use std::fmt;

#[derive(Debug)]
pub enum LutError {
    /// An auxiliary file could not be located under the aux directory.
    FileNotFound(String),
    /// A token in an auxiliary file failed to parse as a number.
    Parse { file: String, token: String },
    /// An expected grid node is missing (the file ended early or a declared
    /// dimension does not match the data).
    MissingNode {
        table: &'static str,
        expected: usize,
        found: usize,
    },
    /// A lookup argument fell outside the tabulated bounds and could not be
    /// clamped (non-finite or negative where a physical value is required).
    Range { what: &'static str, value: f64 },
    Io(std::io::Error),
}

impl fmt::Display for LutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LutError::FileNotFound(name) => {
                write!(f, "auxiliary file {} not found", name)
            }
            LutError::Parse { file, token } => {
                write!(f, "failed to parse '{}' in {}", token, file)
            }
            LutError::MissingNode {
                table,
                expected,
                found,
            } => write!(
                f,
                "LUT read failure: {} expected {} values, found {}",
                table, expected, found
            ),
            LutError::Range { what, value } => {
                write!(f, "LUT argument out of range: {} = {}", what, value)
            }
            LutError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for LutError {}

impl From<std::io::Error> for LutError {
    fn from(err: std::io::Error) -> LutError {
        LutError::Io(err)
    }
}
