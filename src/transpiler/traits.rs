//! Generator traits and identifier utilities.

/// T-SQL words that must be bracketed when used as aliases.
pub const RESERVED_WORDS: &[&str] = &[
    "add", "all", "and", "any", "as", "asc", "between", "by", "case", "check", "column",
    "constraint", "create", "cross", "current", "default", "delete", "desc", "distinct", "drop",
    "else", "end", "except", "exists", "fetch", "file", "for", "foreign", "from", "full",
    "function", "group", "having", "identity", "in", "index", "inner", "insert", "intersect",
    "into", "is", "join", "key", "left", "like", "not", "null", "of", "offset", "on", "open",
    "option", "or", "order", "outer", "over", "percent", "plan", "primary", "procedure", "public",
    "references", "right", "rowcount", "rows", "schema", "select", "set", "table", "then", "to",
    "top", "union", "unique", "update", "user", "values", "view", "when", "where", "with",
];

/// Bracket an alias only if it is a reserved word or not a plain identifier.
pub fn escape_identifier(name: &str) -> String {
    let lower = name.to_lowercase();
    let needs_escaping = name.is_empty()
        || RESERVED_WORDS.contains(&lower.as_str())
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().map(|c| c.is_numeric()).unwrap_or(false);

    if needs_escaping {
        quote_identifier(name)
    } else {
        name.to_string()
    }
}

/// Always bracket, doubling any closing bracket.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Dialect-specific text generation.
pub trait SqlGenerator {
    /// Quote a table, schema or column name.
    fn quote_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }
    /// Quote an extent or column alias.
    fn quote_alias(&self, name: &str) -> String {
        escape_identifier(name)
    }
    /// Parameter placeholder for a named parameter.
    fn placeholder(&self, name: &str) -> String;
    fn string_literal(&self, value: &str, unicode: bool) -> String;
    fn binary_literal(&self, bytes: &[u8]) -> String;
    /// `TOP (n)` text, without surrounding spaces.
    fn top_clause(&self, count: &str, with_ties: bool) -> String;
    /// ` OFFSET n ROWS[ FETCH NEXT m ROWS ONLY]`.
    fn offset_fetch(&self, skip: &str, fetch: Option<&str>) -> String;
}
