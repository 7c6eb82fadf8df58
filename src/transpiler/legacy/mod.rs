//! Legacy dialect support.
//!
//! SQL Server 2000 has no EXCEPT, INTERSECT or any way to skip rows. Trees
//! that use them are first checked, then rewritten into equivalent trees
//! built from filters, quantifiers and TOP.

mod checker;
mod rewriter;

pub use checker::needs_rewrite;
pub use rewriter::rewrite;
