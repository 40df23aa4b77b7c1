//! Path resolver tests against the sample catalog.

use objql::ast::path;
use objql::catalog::EntityCatalog;
use objql::compiler::{
    BindingOrigin, CompileError, IdentificationVariableTable, PathMode, PathResolver, PathTerminal,
};
use objql::test_utils::sample_catalog;

fn table_with(catalog: &EntityCatalog, bindings: &[(&str, &str)]) -> IdentificationVariableTable {
    let mut table = IdentificationVariableTable::new();
    for (variable, entity) in bindings {
        table
            .bind(variable, catalog.lookup(entity).unwrap(), BindingOrigin::Range)
            .unwrap();
    }
    table
}

// ============================================================================
// Object paths
// ============================================================================

#[test]
fn test_bare_variable_is_entity_terminal() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    let resolved = resolver
        .resolve(&table, &path("A"), PathMode::Navigation)
        .unwrap();
    let (variable, entity) = resolved.terminal_entity().unwrap();
    assert_eq!(variable, "a");
    assert_eq!(entity.name, "Artist");
    assert!(!resolved.ends_in_relationship());
}

#[test]
fn test_synthetic_variable_names_are_normalized() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("p", "Painting")]);
    let resolver = PathResolver::new(&catalog, 32);

    let resolved = resolver
        .resolve(&table, &path("P.toGallery+"), PathMode::Navigation)
        .unwrap();
    assert_eq!(resolved.text, "p.toGallery");
    assert_eq!(resolved.traversals[0].target, "p.toGallery");
    assert_eq!(resolved.traversals[0].source, "p");
    assert!(resolved.traversals[0].outer);
    assert!(resolved.ends_in_relationship());
}

#[test]
fn test_attribute_through_to_many() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    let resolved = resolver
        .resolve(&table, &path("a.paintings.paintingTitle"), PathMode::Navigation)
        .unwrap();
    assert_eq!(resolved.traversals.len(), 1);
    assert!(resolved.traversals[0].relationship.to_many);
    match &resolved.terminal {
        PathTerminal::Attribute(attr) => {
            assert_eq!(attr.entity, "Painting");
            assert_eq!(attr.column, "PAINTING_TITLE");
        }
        other => panic!("unexpected terminal {:?}", other),
    }
}

#[test]
fn test_resolved_path_then_alias_gives_same_descriptor() {
    let catalog = sample_catalog();
    let mut table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    let resolved = resolver
        .resolve(&table, &path("a.paintings"), PathMode::Join)
        .unwrap();
    let (variable, target) = resolved.terminal_entity().unwrap();
    let target = target.clone();
    table.bind(variable, &target, BindingOrigin::Path).unwrap();
    table.bind("p", &target, BindingOrigin::Join).unwrap();

    assert_eq!(table.resolve("a.paintings").unwrap(), table.resolve("P").unwrap());
}

#[test]
fn test_attribute_in_middle_of_path() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    let err = resolver
        .resolve(&table, &path("a.artistName.length"), PathMode::Navigation)
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::IncorrectRelationshipPath {
            segment: "artistName".into(),
            path: "a.artistName.length".into(),
        }
    );
}

#[test]
fn test_unbound_root() {
    let catalog = sample_catalog();
    let table = IdentificationVariableTable::new();
    let resolver = PathResolver::new(&catalog, 32);

    let err = resolver
        .resolve(&table, &path("x.artistName"), PathMode::Navigation)
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnmappedIdentifier {
            identifier: "x".into(),
            path: "x.artistName".into(),
        }
    );
}

// ============================================================================
// Db paths
// ============================================================================

#[test]
fn test_db_path_through_flattened_relationship() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    let resolved = resolver
        .resolve_db(&table, &path("a.artistGroupArray.toGroup.NAME"))
        .unwrap();
    match resolved.terminal {
        PathTerminal::Column { table, column } => {
            assert_eq!(table, "ARTGROUP");
            assert_eq!(column, "NAME");
        }
        other => panic!("unexpected terminal {:?}", other),
    }
    assert!(resolved.traversals.is_empty());
}

#[test]
fn test_db_path_must_start_at_first_hop() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    let err = resolver
        .resolve_db(&table, &path("a.toGroup.NAME"))
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnmappedIdentifier { ref identifier, .. } if identifier == "toGroup"
    ));
}

#[test]
fn test_db_path_to_own_column() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("p", "Painting")]);
    let resolver = PathResolver::new(&catalog, 32);

    let resolved = resolver.resolve_db(&table, &path("p.GALLERY_ID")).unwrap();
    match resolved.terminal {
        PathTerminal::Column { table, column } => {
            assert_eq!(table, "PAINTING");
            assert_eq!(column, "GALLERY_ID");
        }
        other => panic!("unexpected terminal {:?}", other),
    }
}

#[test]
fn test_db_path_needs_a_column() {
    let catalog = sample_catalog();
    let table = table_with(&catalog, &[("a", "Artist")]);
    let resolver = PathResolver::new(&catalog, 32);

    assert!(resolver.resolve_db(&table, &path("a")).is_err());
}
