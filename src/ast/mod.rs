//! Command tree model.
//!
//! Trees are immutable, fully typed inputs: every node carries a
//! [`TypeUsage`], relational nodes bind their inputs to variables, and
//! the whole tree serializes to JSON.

pub mod builders;
pub mod expr;
pub mod tree;
pub mod types;
pub mod values;

pub use expr::*;
pub use tree::*;
pub use types::*;
pub use values::*;
