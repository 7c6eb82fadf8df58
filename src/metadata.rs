//! Conceptual type to SQL Server store type mapping.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ast::{EdmType, Facets, PrimitiveKind, TypeUsage};
use crate::error::{CqtError, CqtResult};
use crate::transpiler::Dialect;

/// A resolved store type, e.g. `nvarchar` with `max_length = 50`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreType {
    pub name: String,
    pub kind: PrimitiveKind,
    pub facets: Facets,
}

impl StoreType {
    fn new(name: &str, kind: PrimitiveKind, facets: Facets) -> Self {
        Self {
            name: name.to_string(),
            kind,
            facets,
        }
    }
}

/// Maps conceptual types to store types.
pub trait StoreTypeMapper {
    fn store_type(&self, ty: &TypeUsage) -> CqtResult<StoreType>;
}

/// The built-in SQL Server provider manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerManifest {
    dialect: Dialect,
}

const NVARCHAR_LIMIT: u32 = 4000;
const VARCHAR_LIMIT: u32 = 8000;

impl SqlServerManifest {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn require_2008(&self, kind: PrimitiveKind) -> CqtResult<()> {
        if self.dialect.is_pre_2008() {
            return Err(CqtError::unsupported(format!(
                "type {} on {}",
                kind.name(),
                self.dialect
            )));
        }
        Ok(())
    }

    fn sized(&self, kind: PrimitiveKind, facets: &Facets, names: [&str; 2], limit: u32) -> StoreType {
        let fixed = facets.fixed_length.unwrap_or(false);
        let mut facets = facets.clone();
        let too_long = facets.max_length.is_none_or(|n| n > limit);
        if facets.is_max_length || too_long {
            facets.is_max_length = true;
            facets.max_length = None;
            // fixed-length columns cannot be (max)
            return StoreType::new(names[1], kind, facets);
        }
        StoreType::new(if fixed { names[0] } else { names[1] }, kind, facets)
    }
}

impl StoreTypeMapper for SqlServerManifest {
    fn store_type(&self, ty: &TypeUsage) -> CqtResult<StoreType> {
        let EdmType::Primitive(kind) = ty.edm else {
            return Err(CqtError::unsupported(format!(
                "store type for non-primitive type {}",
                ty.type_name()
            )));
        };
        let facets = &ty.facets;
        if let Some(name) = &facets.store_type {
            return Ok(StoreType::new(name, kind, facets.clone()));
        }

        let store = match kind {
            PrimitiveKind::Boolean => StoreType::new("bit", kind, Facets::default()),
            PrimitiveKind::Byte => StoreType::new("tinyint", kind, Facets::default()),
            PrimitiveKind::Int16 => StoreType::new("smallint", kind, Facets::default()),
            PrimitiveKind::Int32 => StoreType::new("int", kind, Facets::default()),
            PrimitiveKind::Int64 => StoreType::new("bigint", kind, Facets::default()),
            PrimitiveKind::Single => StoreType::new("real", kind, Facets::default()),
            PrimitiveKind::Double => StoreType::new("float", kind, Facets::default()),
            PrimitiveKind::Decimal => {
                let mut f = Facets::default();
                f.precision = Some(facets.precision.unwrap_or(18));
                f.scale = Some(facets.scale.unwrap_or(0));
                StoreType::new("decimal", kind, f)
            }
            PrimitiveKind::String => {
                if facets.unicode.unwrap_or(true) {
                    self.sized(kind, facets, ["nchar", "nvarchar"], NVARCHAR_LIMIT)
                } else {
                    self.sized(kind, facets, ["char", "varchar"], VARCHAR_LIMIT)
                }
            }
            PrimitiveKind::Binary => self.sized(kind, facets, ["binary", "varbinary"], VARCHAR_LIMIT),
            PrimitiveKind::DateTime => match facets.precision {
                Some(_) if !self.dialect.is_pre_2008() => {
                    StoreType::new("datetime2", kind, facets.clone())
                }
                _ => StoreType::new("datetime", kind, Facets::default()),
            },
            PrimitiveKind::Time => {
                self.require_2008(kind)?;
                StoreType::new("time", kind, facets.clone())
            }
            PrimitiveKind::DateTimeOffset => {
                self.require_2008(kind)?;
                StoreType::new("datetimeoffset", kind, facets.clone())
            }
            PrimitiveKind::Guid => StoreType::new("uniqueidentifier", kind, Facets::default()),
            PrimitiveKind::Geography => {
                self.require_2008(kind)?;
                StoreType::new("geography", kind, Facets::default())
            }
            PrimitiveKind::Geometry => {
                self.require_2008(kind)?;
                StoreType::new("geometry", kind, Facets::default())
            }
        };
        Ok(store)
    }
}

/// Full type text for declarations and casts, e.g. `nvarchar(max)`, `decimal(18,2)`.
pub fn store_type_sql(dialect: Dialect, store: &StoreType) -> String {
    let facets = &store.facets;
    match store.name.as_str() {
        "nvarchar" | "varchar" | "nchar" | "char" | "varbinary" | "binary" => {
            if facets.is_max_length {
                if dialect.is_legacy() {
                    let limit = if store.name == "nvarchar" || store.name == "nchar" {
                        NVARCHAR_LIMIT
                    } else {
                        VARCHAR_LIMIT
                    };
                    warn!(store_type = %store.name, limit, "no (max) types before 2005, truncating");
                    format!("{}({})", store.name, limit)
                } else {
                    format!("{}(max)", store.name)
                }
            } else if let Some(n) = facets.max_length {
                format!("{}({})", store.name, n)
            } else {
                store.name.clone()
            }
        }
        "decimal" | "numeric" => match (facets.precision, facets.scale) {
            (Some(p), Some(s)) => format!("{}({},{})", store.name, p, s),
            (Some(p), None) => format!("{}({})", store.name, p),
            _ => store.name.clone(),
        },
        "datetime2" | "time" | "datetimeoffset" => match facets.precision {
            Some(p) => format!("{}({})", store.name, p),
            None => store.name.clone(),
        },
        _ => store.name.clone(),
    }
}

/// Whether `scope_identity()` can recover a value of this store type.
pub fn is_identity_type(store: &StoreType) -> bool {
    match store.name.as_str() {
        "tinyint" | "smallint" | "int" | "bigint" => true,
        "decimal" | "numeric" => store.facets.scale.unwrap_or(0) == 0,
        _ => false,
    }
}
