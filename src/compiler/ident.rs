//! Identification variable table.
//!
//! Identification variables are case-insensitive, so keys are stored with
//! the variable portion lowercased. FROM items without an alias are keyed by
//! the case-folded entity name (see [`fold_entity_name`]) so that `Entity`
//! and `entity` stay distinct.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::catalog::EntityDescriptor;

use super::error::{CompileError, CompileResult};

/// How a binding came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// A FROM item range declaration.
    Range,
    /// A join alias.
    Join,
    /// A synthetic variable derived from a relationship path.
    Path,
}

/// One variable → entity binding.
#[derive(Debug, Clone)]
pub struct Binding {
    pub key: String,
    pub entity: Arc<EntityDescriptor>,
    pub origin: BindingOrigin,
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Binding", 3)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("entity", &self.entity.name)?;
        state.serialize_field("origin", &self.origin)?;
        state.end()
    }
}

/// Case-insensitive variable → descriptor table, in binding order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct IdentificationVariableTable {
    bindings: Vec<Binding>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl IdentificationVariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `entity`.
    ///
    /// Returns `true` for a new binding, `false` when the identical binding
    /// already exists. Rebinding to a different entity fails.
    pub fn bind(
        &mut self,
        name: &str,
        entity: &Arc<EntityDescriptor>,
        origin: BindingOrigin,
    ) -> CompileResult<bool> {
        let key = normalize_id_path(name);
        if let Some(&idx) = self.index.get(&key) {
            let previous = &self.bindings[idx].entity;
            if previous.name == entity.name {
                return Ok(false);
            }
            return Err(CompileError::DuplicateIdentificationVariable {
                id: key,
                entity: entity.name.clone(),
                previous: previous.name.clone(),
            });
        }

        tracing::trace!(
            target: "objql.compiler",
            variable = %key,
            entity = %entity.name,
            ?origin,
            "bound identification variable"
        );
        self.index.insert(key.clone(), self.bindings.len());
        self.bindings.push(Binding {
            key,
            entity: Arc::clone(entity),
            origin,
        });
        Ok(true)
    }

    /// The table key `name` resolves to, if any.
    ///
    /// Tries the case-folded entity form used for FROM items declared
    /// without an alias first, then the normalized form. Folding only differs
    /// from normalizing when `name` has uppercase letters, and folded keys
    /// only ever come from unaliased FROM items.
    pub fn key_for(&self, name: &str) -> Option<&str> {
        let folded = fold_id_path(name);
        if let Some(&idx) = self.index.get(&folded) {
            return Some(&self.bindings[idx].key);
        }
        let normalized = normalize_id_path(name);
        self.index
            .get(&normalized)
            .map(|&idx| self.bindings[idx].key.as_str())
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.binding(name).map(|b| &b.entity)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        let key = self.key_for(name)?;
        self.index.get(key).map(|&idx| &self.bindings[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.key_for(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Lowercase the identification variable portion of a dotted path.
///
/// `"A.toGallery"` becomes `"a.toGallery"`; a bare variable is lowercased.
pub fn normalize_id_path(path: &str) -> String {
    match path.find('.') {
        Some(sep) => format!("{}{}", path[..sep].to_lowercase(), &path[sep..]),
        None => path.to_lowercase(),
    }
}

/// Synthesize a variable for an entity referenced without an alias.
///
/// Each uppercase letter becomes `%` followed by its lowercase form, so
/// `Entity` → `%entity` while `entity` → `entity`.
pub fn fold_entity_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_uppercase() {
            folded.push('%');
            folded.extend(ch.to_lowercase());
        } else {
            folded.push(ch);
        }
    }
    folded
}

fn fold_id_path(path: &str) -> String {
    match path.find('.') {
        Some(sep) => format!("{}{}", fold_entity_name(&path[..sep]), &path[sep..]),
        None => fold_entity_name(path),
    }
}
