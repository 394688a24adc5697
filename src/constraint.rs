//! Comparison constraints: a quadratic expression against a numeric
//! right-hand side.

use crate::expr::QuadraticExpression;

/// The sense of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Less than or equal.
    Le,
    /// Greater than or equal.
    Ge,
    /// Equal.
    Eq,
}

impl Sense {
    /// The single ASCII byte used for this sense in the archive format.
    pub fn symbol(&self) -> u8 {
        match self {
            Sense::Le => b'<',
            Sense::Ge => b'>',
            Sense::Eq => b'=',
        }
    }

    /// The sense for an archive symbol byte.
    pub fn from_symbol(byte: u8) -> Option<Sense> {
        match byte {
            b'<' => Some(Sense::Le),
            b'>' => Some(Sense::Ge),
            b'=' => Some(Sense::Eq),
            _ => None,
        }
    }
}

/// A quadratic expression compared against a right-hand-side value.
///
/// This is both the ingestion value type and what the model stores per
/// constraint label. The model owns the left-hand expression exclusively:
/// every path that accepts a `Comparison` (or a bare expression) takes it
/// by value, so no caller retains a handle that could mutate a stored
/// constraint.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Left-hand expression.
    pub lhs: QuadraticExpression,
    /// Comparison sense.
    pub sense: Sense,
    /// Right-hand side.
    pub rhs: f64,
}

impl Comparison {
    /// `lhs <= rhs`.
    pub fn le(lhs: QuadraticExpression, rhs: f64) -> Self {
        Self {
            lhs,
            sense: Sense::Le,
            rhs,
        }
    }

    /// `lhs >= rhs`.
    pub fn ge(lhs: QuadraticExpression, rhs: f64) -> Self {
        Self {
            lhs,
            sense: Sense::Ge,
            rhs,
        }
    }

    /// `lhs == rhs`.
    pub fn eq(lhs: QuadraticExpression, rhs: f64) -> Self {
        Self {
            lhs,
            sense: Sense::Eq,
            rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sense_symbols() {
        for sense in [Sense::Le, Sense::Ge, Sense::Eq] {
            assert_eq!(Sense::from_symbol(sense.symbol()), Some(sense));
        }
        assert_eq!(Sense::from_symbol(b'?'), None);
    }

    #[test]
    fn test_constructors() {
        let c = Comparison::eq(QuadraticExpression::binary(), 1.0);
        assert_eq!(c.sense, Sense::Eq);
        assert_eq!(c.rhs, 1.0);
    }
}
