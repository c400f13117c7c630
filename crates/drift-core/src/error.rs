use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// The profile generator ran out of candidate draws before finding
    /// enough unique vectors.
    GenerationExhausted {
        requested: usize,
        produced: usize,
        attempts: usize,
    },
    InvalidPopulationSize {
        size: usize,
        minimum: usize,
    },
    InvalidEpsilon(f64),
    /// A pair referenced a vector index outside the set.
    PairOutOfRange {
        pair: (usize, usize),
        len: usize,
    },
    DuplicateEntity(String),
    MissingBaseline(String),
    InvalidConfig(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::GenerationExhausted {
                requested,
                produced,
                attempts,
            } => write!(
                f,
                "generation exhausted: {produced}/{requested} unique profiles after {attempts} attempts"
            ),
            CoreError::InvalidPopulationSize { size, minimum } => {
                write!(f, "invalid population size {size} (minimum {minimum})")
            }
            CoreError::InvalidEpsilon(eps) => {
                write!(f, "privacy budget must be finite and positive, got {eps}")
            }
            CoreError::PairOutOfRange { pair, len } => write!(
                f,
                "pair ({}, {}) out of range for {len} vectors",
                pair.0, pair.1
            ),
            CoreError::DuplicateEntity(id) => write!(f, "duplicate entity id: {id}"),
            CoreError::MissingBaseline(name) => {
                write!(f, "ablation variants have no baseline named '{name}'")
            }
            CoreError::InvalidConfig(msg) => write!(f, "invalid mechanism config: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_generation_exhausted() {
        let err = CoreError::GenerationExhausted {
            requested: 10,
            produced: 7,
            attempts: 1000,
        };
        assert_eq!(
            err.to_string(),
            "generation exhausted: 7/10 unique profiles after 1000 attempts"
        );
    }

    #[test]
    fn test_display_pair_out_of_range() {
        let err = CoreError::PairOutOfRange { pair: (3, 9), len: 5 };
        assert_eq!(err.to_string(), "pair (3, 9) out of range for 5 vectors");
    }

    #[test]
    fn test_display_population_size() {
        let err = CoreError::InvalidPopulationSize { size: 1, minimum: 2 };
        assert!(err.to_string().contains("minimum 2"));
    }
}
