use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire model module.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The model module's error type.
#[derive(Debug)]
pub enum ModelErr {
    BadMagic,
    Truncated {
        got: usize,
        expected: usize,
    },
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    MissingDataset(&'static str),
    EmptyDataset,
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelErr::BadMagic => "The given bytes are not an encoded model".to_string(),
            ModelErr::Truncated { got, expected } => {
                format!("The encoded model is truncated, got {got} bytes and expected {expected}")
            }
            ModelErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => format!(
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            ModelErr::MissingDataset(which) => format!("The model has no {which} dataset"),
            ModelErr::EmptyDataset => "The dataset has no samples".to_string(),
        };

        write!(f, "{s}")
    }
}

impl Error for ModelErr {}
