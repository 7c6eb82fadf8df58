use serde::{Deserialize, Serialize};

/// Conceptual primitive types a command tree can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Binary,
    Boolean,
    Byte,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    Geography,
    Geometry,
    Guid,
    Int16,
    Int32,
    Int64,
    Single,
    String,
    Time,
}

impl PrimitiveKind {
    pub fn is_spatial(&self) -> bool {
        matches!(self, PrimitiveKind::Geography | PrimitiveKind::Geometry)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Binary => "Binary",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::DateTime => "DateTime",
            PrimitiveKind::DateTimeOffset => "DateTimeOffset",
            PrimitiveKind::Decimal => "Decimal",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Geography => "Geography",
            PrimitiveKind::Geometry => "Geometry",
            PrimitiveKind::Guid => "Guid",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::Single => "Single",
            PrimitiveKind::String => "String",
            PrimitiveKind::Time => "Time",
        }
    }
}

/// Facets refining a primitive type. Absent facets mean "unspecified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Facets {
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub is_max_length: bool,
    #[serde(default)]
    pub fixed_length: Option<bool>,
    #[serde(default)]
    pub unicode: Option<bool>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub srid: Option<i32>,
    #[serde(default)]
    pub collation: Option<String>,
    /// Explicit store type name (e.g. `rowversion`, `money`) overriding the default mapping.
    #[serde(default)]
    pub store_type: Option<String>,
}

/// How the server populates a column on write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreGenerated {
    #[default]
    None,
    Identity,
    Computed,
}

/// A named, typed member of a row or entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub ty: TypeUsage,
    #[serde(default)]
    pub generated: StoreGenerated,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeUsage) -> Self {
        Self {
            name: name.into(),
            ty,
            generated: StoreGenerated::None,
        }
    }

    pub fn identity(mut self) -> Self {
        self.generated = StoreGenerated::Identity;
        self
    }

    pub fn computed(mut self) -> Self {
        self.generated = StoreGenerated::Computed;
        self
    }
}

/// An entity (table row) type with its key members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub members: Vec<Member>,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl EntityType {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn key_members(&self) -> impl Iterator<Item = &Member> {
        self.keys.iter().filter_map(move |k| self.member(k))
    }
}

/// The structural part of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdmType {
    Primitive(PrimitiveKind),
    Row(Vec<Member>),
    Entity(EntityType),
    Collection(Box<TypeUsage>),
    /// Reference to an entity of the named type. Only produced by object-graph nodes.
    Ref(String),
}

/// A type plus its facets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeUsage {
    pub edm: EdmType,
    #[serde(default)]
    pub facets: Facets,
}

impl TypeUsage {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            edm: EdmType::Primitive(kind),
            facets: Facets::default(),
        }
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean)
    }

    pub fn int32() -> Self {
        Self::primitive(PrimitiveKind::Int32)
    }

    pub fn int64() -> Self {
        Self::primitive(PrimitiveKind::Int64)
    }

    pub fn double() -> Self {
        Self::primitive(PrimitiveKind::Double)
    }

    pub fn guid() -> Self {
        Self::primitive(PrimitiveKind::Guid)
    }

    /// String with unspecified unicode facet.
    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    /// `varchar(n)`-style column type.
    pub fn ansi_string(max_length: u32) -> Self {
        Self::string()
            .with_unicode(false)
            .with_max_length(max_length)
    }

    pub fn decimal(precision: u8, scale: u8) -> Self {
        let mut ty = Self::primitive(PrimitiveKind::Decimal);
        ty.facets.precision = Some(precision);
        ty.facets.scale = Some(scale);
        ty
    }

    pub fn row(members: Vec<Member>) -> Self {
        Self {
            edm: EdmType::Row(members),
            facets: Facets::default(),
        }
    }

    pub fn entity(entity: EntityType) -> Self {
        Self {
            edm: EdmType::Entity(entity),
            facets: Facets::default(),
        }
    }

    pub fn collection(element: TypeUsage) -> Self {
        Self {
            edm: EdmType::Collection(Box::new(element)),
            facets: Facets::default(),
        }
    }

    pub fn with_unicode(mut self, unicode: bool) -> Self {
        self.facets.unicode = Some(unicode);
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.facets.max_length = Some(max_length);
        self
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.facets.srid = Some(srid);
        self
    }

    pub fn with_store_type(mut self, store_type: impl Into<String>) -> Self {
        self.facets.store_type = Some(store_type.into());
        self
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.edm {
            EdmType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.edm, EdmType::Primitive(_))
    }

    pub fn is_primitive_kind(&self, kind: PrimitiveKind) -> bool {
        self.primitive_kind() == Some(kind)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.edm, EdmType::Collection(_))
    }

    pub fn is_row(&self) -> bool {
        matches!(self.edm, EdmType::Row(_))
    }

    pub fn is_spatial(&self) -> bool {
        self.primitive_kind().is_some_and(|k| k.is_spatial())
    }

    /// Element type of a collection; the type itself otherwise.
    pub fn element_type(&self) -> &TypeUsage {
        match &self.edm {
            EdmType::Collection(element) => element,
            _ => self,
        }
    }

    /// Members of a row or entity type, in declaration order.
    pub fn properties(&self) -> &[Member] {
        match &self.edm {
            EdmType::Row(members) => members,
            EdmType::Entity(entity) => &entity.members,
            _ => &[],
        }
    }

    pub fn property(&self, name: &str) -> Option<&Member> {
        self.properties().iter().find(|m| m.name == name)
    }

    /// Structural type equality ignoring facets.
    pub fn same_edm_type(&self, other: &TypeUsage) -> bool {
        self.edm == other.edm
    }

    pub fn type_name(&self) -> String {
        match &self.edm {
            EdmType::Primitive(kind) => kind.name().to_string(),
            EdmType::Row(_) => "Row".to_string(),
            EdmType::Entity(entity) => entity.name.clone(),
            EdmType::Collection(element) => format!("Collection({})", element.type_name()),
            EdmType::Ref(name) => format!("Ref({})", name),
        }
    }
}

/// A named table (or defining query) rows are scanned from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    pub container: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub defining_query: Option<String>,
    pub element: EntityType,
}

impl EntitySet {
    pub fn new(name: impl Into<String>, element: EntityType) -> Self {
        Self {
            name: name.into(),
            container: "CodeFirstDatabase".to_string(),
            schema: Some("dbo".to_string()),
            table: None,
            defining_query: None,
            element,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn element_type(&self) -> TypeUsage {
        TypeUsage::entity(self.element.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> EntityType {
        EntityType {
            name: "Order".into(),
            members: vec![
                Member::new("Id", TypeUsage::int32()).identity(),
                Member::new("Customer", TypeUsage::ansi_string(20)),
            ],
            keys: vec!["Id".into()],
        }
    }

    #[test]
    fn test_properties_and_keys() {
        let ty = TypeUsage::entity(order());
        assert_eq!(ty.properties().len(), 2);
        assert!(ty.property("Customer").is_some());

        let entity = order();
        let keys: Vec<_> = entity.key_members().map(|m| m.name.as_str()).collect();
        assert_eq!(keys, vec!["Id"]);
    }

    #[test]
    fn test_element_type() {
        let coll = TypeUsage::collection(TypeUsage::int32());
        assert!(coll.is_collection());
        assert!(coll.element_type().is_primitive_kind(PrimitiveKind::Int32));
        assert_eq!(coll.type_name(), "Collection(Int32)");
    }

    #[test]
    fn test_same_edm_type_ignores_facets() {
        let a = TypeUsage::string().with_unicode(false);
        let b = TypeUsage::string();
        assert!(a.same_edm_type(&b));
        assert_ne!(a, b);
    }
}
