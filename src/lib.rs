//! # cqt: command tree to T-SQL
//!
//! `cqt` compiles typed, provider-neutral command trees into SQL Server
//! text. Relational operators are fused into as few SELECT statements as
//! the language allows, nested joins are flattened into one FROM clause,
//! and aliases are only fixed once the whole statement is known.
//!
//! ## Quick Example
//!
//! ```
//! use cqt::prelude::*;
//!
//! let orders = EntitySet::new("Orders", EntityType {
//!     name: "Order".into(),
//!     members: vec![
//!         Member::new("Id", TypeUsage::int32()),
//!         Member::new("Customer", TypeUsage::int32()),
//!     ],
//!     keys: vec!["Id".into()],
//! });
//! let o = Expr::scan(orders).bind("o");
//! let query = o.clone().filter(
//!     o.var_ref().prop("Customer").eq(Expr::param("cust", TypeUsage::int32())),
//! );
//!
//! let sql = CommandTree::query(query).to_sql().unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT o.[Id] AS [Id], o.[Customer] AS [Customer] FROM [dbo].[Orders] AS o WHERE o.[Customer] = @cust"
//! );
//! ```
//!
//! Older servers are targeted with [`Dialect`](transpiler::Dialect): SQL
//! Server 2000 has EXCEPT, INTERSECT and SKIP rewritten into filters over
//! quantifiers; 2005 and 2008 page with `row_number()`.

pub mod ast;
pub mod config;
pub mod error;
pub mod metadata;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::CompilerConfig;
    pub use crate::error::*;
    pub use crate::transpiler::{
        CommandType, CompileOptions, CompiledCommand, Dialect, ParameterDescriptor,
        ParameterDirection, ToSql, compile, compile_batch,
    };
}

pub use transpiler::{compile, compile_batch};
