//! Error types for constrained model operations.

use crate::variables::Variable;
use thiserror::Error;

/// Failure kinds reported by model construction and serialization.
///
/// All errors are deterministic validation failures reported at the point
/// of the offending call. A failed operation leaves the model exactly as
/// it was before the call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A variable was re-registered with a different vartype.
    #[error("variable {0} already exists with a different vartype")]
    TypeConflict(Variable),

    /// A variable was re-registered with a different lower or upper bound.
    #[error("variable {0} has already been added with a different bound")]
    BoundConflict(Variable),

    /// A term referenced a variable not present in the registry.
    #[error("unknown variable {0}")]
    UnknownVariable(Variable),

    /// An explicitly supplied constraint label is already in use.
    #[error("a constraint with label {0} already exists")]
    DuplicateLabel(Variable),

    /// A label contains a non-finite float and has no archive encoding.
    #[error("label {0} contains a non-finite number")]
    UnserializableLabel(Variable),

    /// A variable requested for a discrete group is already claimed by
    /// another discrete group.
    #[error("variable {0} is already used in a discrete constraint")]
    DiscreteConflict(Variable),

    /// A term touched more than two variables.
    #[error("terms must be constant, linear or quadratic")]
    UnsupportedTermArity,

    /// The archive was written by a newer major format version.
    #[error("cannot read format version {0}.{1}, upgrade required")]
    FormatVersionUnsupported(u8, u8),

    /// Structural corruption: bad magic, truncated data, missing entries.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
