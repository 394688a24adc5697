//! Constrained quadratic model core.
//!
//! In-memory representation and persistence for constrained quadratic
//! optimization problems: an objective expression plus labeled
//! constraints, each a quadratic expression compared against a
//! right-hand-side value. This is the data layer consumed by solvers
//! that minimize the objective subject to the constraints; it contains
//! no solving logic itself.
//!
//! # Key Components
//!
//! - **Variables**: [`Variable`] labels, [`Vartype`] domains, and the
//!   insertion-ordered [`VariableRegistry`] every other piece builds on
//! - **Expressions**: [`QuadraticExpression`] — offset, linear, and
//!   quadratic terms over typed variables
//! - **Constraints**: [`Comparison`] — an expression related to a
//!   numeric right-hand side by [`Sense`]
//! - **Model**: [`ConstrainedModel`] — objective + constraint store +
//!   discrete (one-hot) group tracking + derived statistics
//! - **Serialization**: [`serialize`] — a versioned, self-describing
//!   binary archive; `ConstrainedModel::to_bytes` / `from_bytes`
//!
//! # Design
//!
//! All operations are synchronous validate-then-commit on the calling
//! thread: a failed call reports a [`ModelError`] and leaves the model
//! untouched. Stored expressions are owned exclusively by the model:
//! ingestion takes expressions by value, so there is no shared-mutation
//! hazard between a caller and the store.
//!
//! # Examples
//!
//! ```
//! use cqmodel::{ConstrainedModel, QuadraticExpression, Sense};
//!
//! let mut model = ConstrainedModel::new();
//!
//! let mut objective = QuadraticExpression::binary();
//! objective.add_variable("x0".into(), None, None).unwrap();
//! objective.add_variable("x1".into(), None, None).unwrap();
//! objective.add_linear(&"x0".into(), 1.0).unwrap();
//! objective.add_linear(&"x1".into(), 1.0).unwrap();
//! model.set_objective(objective).unwrap();
//!
//! let mut lhs = QuadraticExpression::binary();
//! lhs.add_variable("x0".into(), None, None).unwrap();
//! lhs.add_linear(&"x0".into(), 1.0).unwrap();
//! model.add_constraint_from_expression(lhs, Sense::Le, 1.0, Some("c0".into())).unwrap();
//!
//! let bytes = model.to_bytes();
//! let decoded = ConstrainedModel::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded.num_constraints(), 1);
//! ```

pub mod constraint;
pub mod error;
pub mod expr;
pub mod model;
pub mod serialize;
pub mod variables;

pub use constraint::{Comparison, Sense};
pub use error::{ModelError, Result};
pub use expr::{ExpressionKind, QuadraticExpression};
pub use model::ConstrainedModel;
pub use variables::{Variable, VariableRegistry, Vartype};
