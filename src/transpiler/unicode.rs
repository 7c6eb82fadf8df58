//! Parameters compared against non-unicode columns.
//!
//! A string parameter compared with a `varchar` column should be bound as
//! `varchar` too, otherwise SQL Server converts the column side and cannot
//! seek an index. The translator reports such parameters so the caller can
//! rebind them.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Expr, ExprKind, PrimitiveKind};

/// One-argument string functions that pass unicode-ness through.
const ONE_ARG_STRING_FUNCTIONS: &[&str] = &[
    "Edm.Trim",
    "Edm.RTrim",
    "Edm.LTrim",
    "Edm.Left",
    "Edm.Right",
    "Edm.Substring",
    "Edm.ToLower",
    "Edm.ToUpper",
    "Edm.Reverse",
    "SqlServer.RTRIM",
    "SqlServer.LTRIM",
    "SqlServer.LEFT",
    "SqlServer.RIGHT",
    "SqlServer.SUBSTRING",
    "SqlServer.LOWER",
    "SqlServer.UPPER",
    "SqlServer.REVERSE",
];

/// A column whose type says it is not unicode.
pub fn is_non_unicode_source(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::Property { .. }) && e.ty.facets.unicode == Some(false)
}

/// A string constant, parameter or null with no unicode facet, or a string
/// function built only from such values.
pub fn is_unspecified_target(e: &Expr) -> bool {
    if e.ty.is_primitive_kind(PrimitiveKind::String)
        && matches!(
            e.kind,
            ExprKind::Constant(_) | ExprKind::ParameterRef(_) | ExprKind::Null
        )
        && e.ty.facets.unicode.is_none()
    {
        return true;
    }

    let ExprKind::Function { function, args } = &e.kind else {
        return false;
    };
    if !function.is_canonical() && !function.built_in {
        return false;
    }
    let name = function.full_name();
    if ONE_ARG_STRING_FUNCTIONS.contains(&name.as_str()) {
        return args.first().is_some_and(is_unspecified_target);
    }
    match name.as_str() {
        "Edm.Concat" => args.len() == 2 && args.iter().all(is_unspecified_target),
        "Edm.Replace" | "SqlServer.REPLACE" => {
            args.len() == 3 && args.iter().all(is_unspecified_target)
        }
        _ => false,
    }
}

/// Whether values under this comparison should be non-unicode.
pub fn comparison_forces(left: &Expr, right: &Expr) -> bool {
    (is_non_unicode_source(left) && is_unspecified_target(right))
        || (is_non_unicode_source(right) && is_unspecified_target(left))
}

pub fn like_forces(input: &Expr, pattern: &Expr, escape: Option<&Expr>) -> bool {
    is_non_unicode_source(input)
        && is_unspecified_target(pattern)
        && escape.is_none_or(is_unspecified_target)
}

pub fn in_forces(item: &Expr) -> bool {
    is_non_unicode_source(item)
}

/// Tracks, per parameter, whether every use of it was in a forcing context.
#[derive(Debug, Default)]
pub struct NonUnicodeTracker {
    candidates: BTreeMap<String, bool>,
}

impl NonUnicodeTracker {
    /// Record one reference to parameter `name`.
    pub fn record(&mut self, name: &str, forced: bool) {
        if !forced {
            self.candidates.insert(name.to_string(), false);
        } else {
            self.candidates.entry(name.to_string()).or_insert(true);
        }
    }

    /// Parameters that were only ever used in forcing contexts.
    pub fn finish(&self) -> BTreeSet<String> {
        self.candidates
            .iter()
            .filter(|(_, forced)| **forced)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
