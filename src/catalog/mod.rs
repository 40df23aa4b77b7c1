//! Entity catalog - the read-only registry of mapped entities.
//!
//! The compiler consumes the catalog, never mutates it. A catalog is built
//! either programmatically from [`EntityDescriptor`] builders or from a TOML
//! mapping file (see [`loader`]), validated once, and then shared behind an
//! `Arc` by any number of concurrent compilations.
//!
//! Entity lookups are case-sensitive: entity names are proper identifiers,
//! unlike identification variables.

mod entity;
pub mod loader;

pub use entity::{
    Attribute, EntityDescriptor, JoinColumn, JoinHop, Property, Relationship, ValueType,
};

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cache::compute_hash;
use crate::compiler::{CompileError, CompileResult};

/// Entity names must be plain identifiers. This keeps `%` out of names,
/// which the alias case-folding scheme reserves.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid identifier regex"));

/// Errors raised while building or loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Mapping file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read mapping file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse mapping file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to hash catalog: {0}")]
    HashError(#[from] serde_json::Error),

    #[error("Invalid entity name: '{0}'")]
    InvalidName(String),

    #[error("Duplicate entity: '{0}'")]
    DuplicateEntity(String),

    #[error("Duplicate property '{property}' on entity '{entity}'")]
    DuplicateProperty { entity: String, property: String },

    #[error("Relationship '{entity}.{relationship}' targets unknown entity '{target}'")]
    UnknownTarget {
        entity: String,
        relationship: String,
        target: String,
    },

    #[error("Relationship '{entity}.{relationship}' has no join hops")]
    EmptyRelationship { entity: String, relationship: String },

    #[error("Entity '{entity}' extends unknown entity '{super_entity}'")]
    UnknownSuperEntity { entity: String, super_entity: String },

    #[error("Inheritance cycle detected: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Read-only registry of entity descriptors, keyed by entity name.
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    entities: BTreeMap<String, Arc<EntityDescriptor>>,
    content_hash: String,
}

impl EntityCatalog {
    /// Build and validate a catalog.
    ///
    /// Inherited attributes, relationships, primary keys and discriminator
    /// columns are folded into each sub-entity's descriptor here, so the
    /// compiler never walks the inheritance chain itself.
    pub fn new(descriptors: impl IntoIterator<Item = EntityDescriptor>) -> CatalogResult<Self> {
        let mut declared: BTreeMap<String, EntityDescriptor> = BTreeMap::new();
        for desc in descriptors {
            if !IDENTIFIER.is_match(&desc.name) {
                return Err(CatalogError::InvalidName(desc.name));
            }
            validate_properties(&desc)?;
            if declared.contains_key(&desc.name) {
                return Err(CatalogError::DuplicateEntity(desc.name));
            }
            declared.insert(desc.name.clone(), desc);
        }

        for desc in declared.values() {
            for rel in &desc.relationships {
                if !declared.contains_key(&rel.target) {
                    return Err(CatalogError::UnknownTarget {
                        entity: desc.name.clone(),
                        relationship: rel.name.clone(),
                        target: rel.target.clone(),
                    });
                }
                if rel.hops.is_empty() {
                    return Err(CatalogError::EmptyRelationship {
                        entity: desc.name.clone(),
                        relationship: rel.name.clone(),
                    });
                }
            }
        }

        let mut entities = BTreeMap::new();
        for name in declared.keys() {
            let flattened = flatten_inheritance(name, &declared, &mut Vec::new())?;
            entities.insert(name.clone(), Arc::new(flattened));
        }

        let content_hash = compute_hash(&entities.values().collect::<Vec<_>>())?;

        tracing::debug!(
            target: "objql.catalog",
            entities = entities.len(),
            hash = %content_hash,
            "built entity catalog"
        );

        Ok(Self {
            entities,
            content_hash,
        })
    }

    /// Look up a descriptor by its exact entity name.
    pub fn descriptor_for(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entities.get(name)
    }

    /// Look up a descriptor named in a FROM item.
    pub fn lookup(&self, name: &str) -> CompileResult<&Arc<EntityDescriptor>> {
        self.descriptor_for(name)
            .ok_or_else(|| CompileError::UnmappedAbstractSchemaName(name.to_string()))
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// All descriptors, in entity name order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Content hash of the validated catalog, stable across loads of the
    /// same mapping.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

fn validate_properties(desc: &EntityDescriptor) -> CatalogResult<()> {
    let mut seen = HashSet::new();
    let names = desc
        .attributes
        .iter()
        .map(|a| &a.name)
        .chain(desc.relationships.iter().map(|r| &r.name));
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(CatalogError::DuplicateProperty {
                entity: desc.name.clone(),
                property: name.clone(),
            });
        }
    }
    Ok(())
}

/// Merge super-entity properties into `name`'s descriptor.
///
/// Sub-entity properties override inherited ones with the same name.
fn flatten_inheritance(
    name: &str,
    declared: &BTreeMap<String, EntityDescriptor>,
    stack: &mut Vec<String>,
) -> CatalogResult<EntityDescriptor> {
    if stack.iter().any(|s| s == name) {
        let mut cycle = stack.clone();
        cycle.push(name.to_string());
        return Err(CatalogError::InheritanceCycle(cycle));
    }

    let desc = &declared[name];
    let Some(super_name) = desc.super_entity.as_deref() else {
        return Ok(desc.clone());
    };
    if !declared.contains_key(super_name) {
        return Err(CatalogError::UnknownSuperEntity {
            entity: name.to_string(),
            super_entity: super_name.to_string(),
        });
    }

    stack.push(name.to_string());
    let parent = flatten_inheritance(super_name, declared, stack)?;
    stack.pop();

    let mut merged = desc.clone();

    let mut attributes: Vec<Attribute> = parent
        .attributes
        .into_iter()
        .filter(|a| desc.attribute(&a.name).is_none())
        .collect();
    attributes.extend(desc.attributes.iter().cloned());
    merged.attributes = attributes;

    let mut relationships: Vec<Relationship> = parent
        .relationships
        .into_iter()
        .filter(|r| desc.relationship(&r.name).is_none())
        .collect();
    relationships.extend(desc.relationships.iter().cloned());
    merged.relationships = relationships;

    if merged.primary_key.is_empty() {
        merged.primary_key = parent.primary_key;
    }

    let mut discriminators = parent.discriminator_columns;
    for column in &desc.discriminator_columns {
        if !discriminators.contains(column) {
            discriminators.push(column.clone());
        }
    }
    merged.discriminator_columns = discriminators;

    Ok(merged)
}
