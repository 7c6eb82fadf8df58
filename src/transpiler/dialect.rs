use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::transpiler::sql::sqlserver::SqlServerGenerator;
use crate::transpiler::traits::SqlGenerator;

/// Supported SQL Server versions.
///
/// `Sql2000` is the legacy dialect: no EXCEPT/INTERSECT, no OFFSET/FETCH,
/// no OUTPUT clause, no `row_number()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sql2000,
    Sql2005,
    Sql2008,
    #[default]
    Sql2012,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        Box::new(SqlServerGenerator::new(*self))
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Dialect::Sql2000)
    }

    /// No `datetime2`, `time`, `datetimeoffset` or spatial types.
    pub fn is_pre_2008(&self) -> bool {
        matches!(self, Dialect::Sql2000 | Dialect::Sql2005)
    }

    pub fn supports_offset_fetch(&self) -> bool {
        matches!(self, Dialect::Sql2012)
    }

    pub fn supports_output_clause(&self) -> bool {
        !self.is_legacy()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sql2000 => "sql2000",
            Dialect::Sql2005 => "sql2005",
            Dialect::Sql2008 => "sql2008",
            Dialect::Sql2012 => "sql2012",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql2000" | "2000" | "legacy" => Ok(Dialect::Sql2000),
            "sql2005" | "2005" => Ok(Dialect::Sql2005),
            "sql2008" | "2008" => Ok(Dialect::Sql2008),
            "sql2012" | "2012" | "latest" => Ok(Dialect::Sql2012),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_queries() {
        assert!(Dialect::Sql2000.is_legacy());
        assert!(!Dialect::Sql2000.supports_output_clause());
        assert!(Dialect::Sql2005.is_pre_2008());
        assert!(!Dialect::Sql2008.is_pre_2008());
        assert!(Dialect::default().supports_offset_fetch());
    }

    #[test]
    fn test_parse() {
        assert_eq!("SQL2008".parse::<Dialect>(), Ok(Dialect::Sql2008));
        assert_eq!("legacy".parse::<Dialect>(), Ok(Dialect::Sql2000));
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
