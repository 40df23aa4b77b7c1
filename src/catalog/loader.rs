//! TOML mapping files.
//!
//! Example mapping:
//! ```toml
//! [[entity]]
//! name = "Artist"
//! object_class = "org.example.Artist"
//! table = "ARTIST"
//! primary_key = ["ARTIST_ID"]
//!
//! [[entity.attribute]]
//! name = "artistName"
//! column = "ARTIST_NAME"
//! type = "string"
//!
//! [[entity.relationship]]
//! name = "paintings"
//! target = "Painting"
//! to_many = true
//!
//! [[entity.relationship.hop]]
//! name = "paintingArray"
//! target_table = "PAINTING"
//! joins = [{ source = "ARTIST_ID", target = "ARTIST_ID" }]
//! ```
//!
//! A hop's `source_table` defaults to the owning entity's table for the
//! first hop and to the previous hop's target table afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    CatalogError, CatalogResult, EntityCatalog, EntityDescriptor, JoinColumn, JoinHop,
    Relationship, ValueType,
};

/// Root of a mapping file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingFile {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityMapping {
    pub name: String,
    #[serde(default)]
    pub object_class: Option<String>,
    pub table: String,
    #[serde(default)]
    pub super_entity: Option<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub discriminator_columns: Vec<String>,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeMapping>,
    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttributeMapping {
    pub name: String,
    pub column: String,
    #[serde(rename = "type", default = "default_value_type")]
    pub value_type: ValueType,
}

fn default_value_type() -> ValueType {
    ValueType::Object
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipMapping {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub to_many: bool,
    #[serde(default, rename = "hop")]
    pub hops: Vec<HopMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HopMapping {
    pub name: String,
    #[serde(default)]
    pub source_table: Option<String>,
    pub target_table: String,
    #[serde(default)]
    pub joins: Vec<JoinColumn>,
}

impl EntityMapping {
    /// Convert into a descriptor.
    pub fn into_descriptor(self) -> EntityDescriptor {
        let mut desc = EntityDescriptor::new(self.name, self.table);
        if let Some(object_class) = self.object_class {
            desc = desc.with_object_class(object_class);
        }
        desc.super_entity = self.super_entity;
        desc.primary_key = self.primary_key;
        desc.discriminator_columns = self.discriminator_columns;

        for attr in self.attributes {
            desc = desc.with_attribute(attr.name, attr.column, attr.value_type);
        }

        for rel in self.relationships {
            let mut source_table = desc.table.clone();
            let mut hops = Vec::with_capacity(rel.hops.len());
            for hop in rel.hops {
                let source = hop.source_table.unwrap_or(source_table);
                source_table = hop.target_table.clone();
                hops.push(JoinHop {
                    name: hop.name,
                    source_table: source,
                    target_table: hop.target_table,
                    columns: hop.joins,
                });
            }
            desc = desc.with_relationship(Relationship {
                name: rel.name,
                target: rel.target,
                to_many: rel.to_many,
                hops,
            });
        }

        desc
    }
}

impl EntityCatalog {
    /// Parse and validate a TOML mapping.
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let mapping: MappingFile = toml::from_str(content)?;
        EntityCatalog::new(
            mapping
                .entities
                .into_iter()
                .map(EntityMapping::into_descriptor),
        )
    }

    /// Load a TOML mapping file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        tracing::debug!(target: "objql.catalog", path = %path.display(), "loading mapping file");
        Self::from_toml_str(&content)
    }
}
