//! Entity descriptors - the mapped view of one logical entity.
//!
//! A descriptor is built once per mapping load and shared read-only as an
//! `Arc<EntityDescriptor>` by every compilation that touches it.

use serde::{Deserialize, Serialize};

/// Value type of a persistent attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    String,
    Date,
    Time,
    Timestamp,
    Bytes,
    /// Anything the mapping doesn't classify further.
    Object,
}

impl ValueType {
    /// Is this an integral numeric type?
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            ValueType::Int8 | ValueType::Int16 | ValueType::Int32 | ValueType::Int64
        )
    }

    /// Is this any numeric type?
    pub fn is_numeric(&self) -> bool {
        self.is_integral()
            || matches!(
                self,
                ValueType::Float32 | ValueType::Float64 | ValueType::Decimal
            )
    }

    /// Get the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int8 => "int8",
            ValueType::Int16 => "int16",
            ValueType::Int32 => "int32",
            ValueType::Int64 => "int64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::Timestamp => "timestamp",
            ValueType::Bytes => "bytes",
            ValueType::Object => "object",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persistent attribute mapped to a column path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Logical attribute name used in query paths.
    pub name: String,
    /// Column path in the entity's table (dotted for flattened attributes).
    pub column: String,
    pub value_type: ValueType,
}

/// One column pair of a db-level join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    pub source: String,
    pub target: String,
}

/// One db-level join between two tables.
///
/// A relationship that crosses a join table (a flattened relationship)
/// is described by more than one hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinHop {
    /// Name of the db relationship.
    pub name: String,
    pub source_table: String,
    pub target_table: String,
    pub columns: Vec<JoinColumn>,
}

impl JoinHop {
    pub fn new(
        name: impl Into<String>,
        source_table: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_table: source_table.into(),
            target_table: target_table.into(),
            columns: vec![],
        }
    }

    /// Add a join column pair.
    pub fn with_join(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.columns.push(JoinColumn {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    /// Source-side column names, in join order.
    pub fn source_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.source.as_str())
    }
}

/// A navigable association from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    /// Target entity name.
    pub target: String,
    pub to_many: bool,
    /// Underlying db joins, in traversal order.
    pub hops: Vec<JoinHop>,
}

impl Relationship {
    pub fn to_one(name: impl Into<String>, target: impl Into<String>, hop: JoinHop) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            to_many: false,
            hops: vec![hop],
        }
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>, hop: JoinHop) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            to_many: true,
            hops: vec![hop],
        }
    }

    /// Append another hop (flattened relationships).
    pub fn with_hop(mut self, hop: JoinHop) -> Self {
        self.hops.push(hop);
        self
    }

    /// Does this relationship cross more than one db join?
    pub fn is_flattened(&self) -> bool {
        self.hops.len() > 1
    }
}

/// A named property of an entity, as seen by path resolution.
#[derive(Debug, Clone, Copy)]
pub enum Property<'a> {
    Attribute(&'a Attribute),
    Relationship(&'a Relationship),
}

/// Immutable description of a mapped entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Logical entity name, as used in FROM items.
    pub name: String,
    /// Identity of the object class instantiated for this entity.
    pub object_class: String,
    /// Db table the entity maps to.
    pub table: String,
    /// Entity this one inherits from, if any.
    pub super_entity: Option<String>,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,
    /// Inheritance discriminator columns.
    pub discriminator_columns: Vec<String>,
}

impl EntityDescriptor {
    /// Create a descriptor for `name` mapped to `table`.
    ///
    /// The object class defaults to the entity name.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            object_class: name.clone(),
            name,
            table: table.into(),
            super_entity: None,
            attributes: vec![],
            relationships: vec![],
            primary_key: vec![],
            discriminator_columns: vec![],
        }
    }

    pub fn with_object_class(mut self, object_class: impl Into<String>) -> Self {
        self.object_class = object_class.into();
        self
    }

    pub fn with_super_entity(mut self, super_entity: impl Into<String>) -> Self {
        self.super_entity = Some(super_entity.into());
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            column: column.into(),
            value_type,
        });
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key.push(column.into());
        self
    }

    pub fn with_discriminator(mut self, column: impl Into<String>) -> Self {
        self.discriminator_columns.push(column.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Look up a property by name. Attributes shadow relationships.
    pub fn property(&self, name: &str) -> Option<Property<'_>> {
        self.attribute(name)
            .map(Property::Attribute)
            .or_else(|| self.relationship(name).map(Property::Relationship))
    }

    /// Foreign key columns owned through to-one relationships.
    ///
    /// Only the first hop's source columns live in this entity's table.
    pub fn foreign_key_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for rel in self.relationships.iter().filter(|r| !r.to_many) {
            if let Some(hop) = rel.hops.first() {
                for column in hop.source_columns() {
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
            }
        }
        columns
    }

    /// Every column name known to live in this entity's table.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        let attribute_columns = self
            .attributes
            .iter()
            .filter(|a| !a.column.contains('.'))
            .map(|a| a.column.as_str());
        let candidates = attribute_columns
            .chain(self.foreign_key_columns())
            .chain(self.primary_key.iter().map(String::as_str))
            .chain(self.discriminator_columns.iter().map(String::as_str));
        for column in candidates {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    /// Find the relationship whose hop is named `hop_name`, returning the
    /// hop's position within it.
    pub fn relationship_by_hop(&self, hop_name: &str) -> Option<(&Relationship, usize)> {
        self.relationships.iter().find_map(|rel| {
            rel.hops
                .iter()
                .position(|h| h.name == hop_name)
                .map(|idx| (rel, idx))
        })
    }
}
