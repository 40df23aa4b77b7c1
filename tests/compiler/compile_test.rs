//! End-to-end compilation tests.
//!
//! Queries are assembled with the parse-tree builders; the query text in
//! each test is what the tree would be parsed from.

use std::sync::Arc;

use objql::ast::{
    count, db_path, exists, lit_int, lit_str, param, path, path_expr, subselect, sum, var, Delete,
    ExprExt, FromItem, Join, QueryDocument, Select, SelectItem, Statement, Update,
};
use objql::catalog::{EntityCatalog, EntityDescriptor, ValueType};
use objql::compiler::{
    BindingOrigin, CompileError, CompileResult, CompiledExpression, Compiler, PrefetchSemantics,
    ResultComponent,
};
use objql::config::CompilerSettings;
use objql::test_utils::sample_catalog;

fn compile(statement: impl Into<Statement>) -> CompileResult<CompiledExpression> {
    Compiler::new(sample_catalog()).compile("", &statement.into())
}

// ============================================================================
// Basic scenarios
// ============================================================================

#[test]
fn test_select_single_entity() {
    // SELECT a FROM Artist a
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "a");
    assert_eq!(compiled.root_descriptor().name, "Artist");
    assert!(compiled.prefetch_tree().is_none());

    let result = compiled.result().unwrap();
    assert_eq!(result.len(), 1);
    match result.get(0).unwrap() {
        ResultComponent::Entity(entity) => {
            assert_eq!(entity.entity, "Artist");
            assert_eq!(entity.object_class, "org.example.art.Artist");
            assert!(entity.field("artistName").is_some());
            assert_eq!(entity.field("ARTIST_ID").unwrap().db_path, "ARTIST_ID");
        }
        other => panic!("expected entity result, got {:?}", other),
    }
}

#[test]
fn test_fetch_join_builds_prefetch_tree() {
    // SELECT a FROM Artist a INNER JOIN FETCH a.paintings p
    let compiled = compile(
        Select::new().select(SelectItem::new(var("a"))).from(
            FromItem::new("Artist")
                .alias("a")
                .join(Join::inner(path("a.paintings")).fetch().alias("p")),
        ),
    )
    .unwrap();

    let tree = compiled.prefetch_tree().unwrap();
    assert_eq!(tree.len(), 1);
    let node = tree.node("paintings").unwrap();
    assert!(!node.phantom);
    assert_eq!(node.semantics, PrefetchSemantics::Joint);
    assert_eq!(node.entity_id.as_deref(), Some("a"));
}

#[test]
fn test_sum_of_short_is_promoted() {
    // SELECT SUM(a.shortAttribute) FROM Artist a
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(sum(path_expr("a.shortAttribute"))))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap();

    let scalars: Vec<_> = compiled.result().unwrap().scalars().collect();
    assert_eq!(scalars.len(), 1);
    assert_eq!(scalars[0].value_type, Some(ValueType::Int64));
}

#[test]
fn test_rebinding_same_alias() {
    // SELECT a FROM Artist a, Artist a
    let same = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap();
    assert_eq!(same.variable_table().len(), 1);

    // SELECT a FROM Artist a, Gallery a
    let err = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .from(FromItem::new("Gallery").alias("a")),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::DuplicateIdentificationVariable {
            id: "a".into(),
            entity: "Gallery".into(),
            previous: "Artist".into(),
        }
    );
}

#[test]
fn test_unknown_relationship_in_path() {
    // SELECT a FROM Artist a WHERE a.paintingz.paintingTitle = 'x'
    let err = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(path_expr("a.paintingz.paintingTitle").eq(lit_str("x"))),
    )
    .unwrap_err();

    assert_eq!(
        err,
        CompileError::IncorrectRelationshipPath {
            segment: "paintingz".into(),
            path: "a.paintingz.paintingTitle".into(),
        }
    );
    assert!(err.to_string().contains("paintingz"));
}

// ============================================================================
// Binding and resolution
// ============================================================================

#[test]
fn test_unmapped_entity() {
    let err = compile(
        Select::new()
            .select(SelectItem::new(var("s")))
            .from(FromItem::new("Sculpture").alias("s")),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnmappedAbstractSchemaName("Sculpture".into())
    );
}

#[test]
fn test_unaliased_entities_fold_distinctly() {
    let catalog = EntityCatalog::new(vec![
        EntityDescriptor::new("Entity", "ENTITY").with_primary_key("ID"),
        EntityDescriptor::new("entity", "ENTITY_LOWER").with_primary_key("ID"),
    ])
    .unwrap();

    // SELECT Entity FROM Entity, entity
    let statement: Statement = Select::new()
        .select(SelectItem::new(var("Entity")))
        .from(FromItem::new("Entity"))
        .from(FromItem::new("entity"))
        .into();
    let compiled = Compiler::new(catalog).compile("", &statement).unwrap();

    let keys: Vec<_> = compiled.bindings().map(|b| b.key.as_str()).collect();
    assert_eq!(keys, vec!["%entity", "entity"]);
    assert_eq!(compiled.root_id(), "%entity");
    assert_eq!(compiled.entity_descriptor("Entity").unwrap().table, "ENTITY");
    assert_eq!(compiled.entity_descriptor("entity").unwrap().table, "ENTITY_LOWER");
}

#[test]
fn test_variables_are_case_insensitive() {
    // SELECT A FROM Artist a WHERE A.artistName = :name
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("A")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(path_expr("A.artistName").eq(param("name"))),
    )
    .unwrap();
    assert_eq!(compiled.root_id(), "a");
}

#[test]
fn test_forward_reference_from_select_list() {
    // SELECT p.toArtist.artistName FROM Painting p
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(path_expr("p.toArtist.artistName")))
            .from(FromItem::new("Painting").alias("p")),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "p");
    assert_eq!(compiled.entity_descriptor("p.toArtist").unwrap().name, "Artist");
    let scalar = compiled.result().unwrap().scalars().next().unwrap();
    assert_eq!(scalar.path.as_deref(), Some("p.toArtist.artistName"));
}

#[test]
fn test_subselect_references_outer_variable() {
    // SELECT a FROM Artist a
    // WHERE EXISTS (SELECT p FROM Painting p WHERE p.toArtist = a)
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(exists(
                Select::new()
                    .select(SelectItem::new(var("p")))
                    .from(FromItem::new("Painting").alias("p"))
                    .filter(path_expr("p.toArtist").eq(var("a"))),
            )),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "a");
    assert_eq!(compiled.result().unwrap().len(), 1);
    assert_eq!(compiled.entity_descriptor("p").unwrap().name, "Painting");
    assert_eq!(compiled.entity_descriptor("p.toArtist").unwrap().name, "Artist");
}

#[test]
fn test_select_list_subselect_joins_outer_variable() {
    // SELECT a, (SELECT COUNT(p) FROM Gallery g JOIN a.paintings p) FROM Artist a
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .select(SelectItem::new(subselect(
                Select::new()
                    .select(SelectItem::new(count(var("p"))))
                    .from(
                        FromItem::new("Gallery")
                            .alias("g")
                            .join(Join::inner(path("a.paintings")).alias("p")),
                    ),
            )))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "a");
    assert_eq!(compiled.entity_descriptor("p").unwrap().name, "Painting");
    assert_eq!(compiled.entity_descriptor("g").unwrap().name, "Gallery");
    let shape = compiled.result().unwrap();
    assert_eq!(shape.len(), 2);
    assert!(matches!(shape.get(1), Some(ResultComponent::Scalar(_))));
}

#[test]
fn test_unbound_variable_in_where() {
    let err = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(path_expr("b.artistName").eq(lit_str("x"))),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnmappedIdentifier { ref identifier, .. } if identifier == "b"
    ));
}

#[test]
fn test_unknown_attribute_terminal() {
    let err = compile(
        Select::new()
            .select(SelectItem::new(path_expr("a.nickname")))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnmappedIdentifier {
            identifier: "nickname".into(),
            path: "a.nickname".into(),
        }
    );
}

#[test]
fn test_unbound_select_variable() {
    // SELECT b FROM Artist a
    let err = compile(
        Select::new()
            .select(SelectItem::new(var("b")))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap_err();
    assert_eq!(err, CompileError::UnmappedIdentificationVariable("b".into()));
}

#[test]
fn test_join_must_end_in_relationship() {
    let err = compile(
        Select::new().select(SelectItem::new(var("a"))).from(
            FromItem::new("Artist")
                .alias("a")
                .join(Join::inner(path("a.artistName"))),
        ),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::IncorrectRelationshipPath { .. }));
}

#[test]
fn test_join_alias_is_bound_to_target() {
    // SELECT p FROM Artist a JOIN a.paintings p
    let compiled = compile(
        Select::new().select(SelectItem::new(var("p"))).from(
            FromItem::new("Artist")
                .alias("a")
                .join(Join::inner(path("a.paintings")).alias("p")),
        ),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "p");
    assert_eq!(compiled.root_descriptor().name, "Painting");

    let origins: Vec<_> = compiled.bindings().map(|b| (b.key.as_str(), b.origin)).collect();
    assert_eq!(
        origins,
        vec![
            ("a", BindingOrigin::Range),
            ("a.paintings", BindingOrigin::Path),
            ("p", BindingOrigin::Join),
        ]
    );
}

#[test]
fn test_path_and_alias_resolve_to_same_descriptor() {
    // SELECT a FROM Artist a JOIN a.paintings p WHERE p.toGallery.galleryName = 'x'
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(
                FromItem::new("Artist")
                    .alias("a")
                    .join(Join::inner(path("a.paintings")).alias("p")),
            )
            .filter(path_expr("p.toGallery.galleryName").eq(lit_str("x"))),
    )
    .unwrap();

    let by_path = compiled.entity_descriptor("a.paintings").unwrap();
    let by_alias = compiled.entity_descriptor("p").unwrap();
    assert!(Arc::ptr_eq(by_path, by_alias));
    assert_eq!(compiled.entity_descriptor("p.toGallery").unwrap().name, "Gallery");
}

// ============================================================================
// Traversals
// ============================================================================

#[test]
fn test_incoming_relationships_cover_whole_chain() {
    // SELECT p FROM Painting p WHERE p.toGallery.paintingArray.paintingTitle = 'x'
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("p")))
            .from(FromItem::new("Painting").alias("p"))
            .filter(path_expr("p.toGallery.paintingArray.paintingTitle").eq(lit_str("x"))),
    )
    .unwrap();

    let hops: Vec<_> = compiled
        .incoming_relationships("p.toGallery.paintingArray")
        .iter()
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(hops, vec!["toGallery", "paintingArray"]);

    let traversal = compiled.traversal("P.toGallery.paintingArray").unwrap();
    assert_eq!(traversal.source, "p");
    assert_eq!(traversal.chain.len(), 2);
    assert!(compiled.incoming_relationships("p").is_empty());
}

#[test]
fn test_flattened_relationship_hops() {
    // SELECT a FROM Artist a WHERE a.groups.name = 'cubists'
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(path_expr("a.groups.name").eq(lit_str("cubists"))),
    )
    .unwrap();

    let hops = compiled.incoming_relationships("a.groups");
    assert_eq!(hops.len(), 2);
    assert_eq!(hops[0].target_table, "ARTIST_GROUP");
    assert_eq!(hops[1].target_table, "ARTGROUP");
}

#[test]
fn test_outer_join_marks_traversals() {
    // SELECT a FROM Artist a LEFT OUTER JOIN a.paintings p
    let compiled = compile(
        Select::new().select(SelectItem::new(var("a"))).from(
            FromItem::new("Artist")
                .alias("a")
                .join(Join::left_outer(path("a.paintings")).alias("p")),
        ),
    )
    .unwrap();

    assert!(compiled.traversal("a.paintings").unwrap().outer);
    assert!(compiled.traversal("p").unwrap().outer);
}

#[test]
fn test_outer_marker_in_path() {
    // SELECT p FROM Painting p WHERE p.toGallery+.galleryName = 'x'
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("p")))
            .from(FromItem::new("Painting").alias("p"))
            .filter(path_expr("p.toGallery+.galleryName").eq(lit_str("x"))),
    )
    .unwrap();

    let traversal = compiled.traversal("p.toGallery").unwrap();
    assert!(traversal.outer);
    assert_eq!(traversal.relationship.name, "toGallery");
}

// ============================================================================
// Canonicalization and root inference
// ============================================================================

#[test]
fn test_relationship_select_becomes_entity_root() {
    // SELECT p.toGallery FROM Painting p
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(path_expr("p.toGallery")))
            .from(FromItem::new("Painting").alias("p")),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "p.toGallery");
    assert_eq!(compiled.root_descriptor().name, "Gallery");
    match compiled.result().unwrap().get(0).unwrap() {
        ResultComponent::Entity(entity) => {
            assert_eq!(entity.variable, "p.toGallery");
            assert_eq!(entity.entity, "Gallery");
            assert_eq!(entity.prefix, "ec0_");
        }
        other => panic!("expected entity result, got {:?}", other),
    }
}

#[test]
fn test_explicit_root_wins_over_canonical_path() {
    // SELECT p, p.toGallery FROM Painting p
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("p")))
            .select(SelectItem::new(path_expr("p.toGallery")))
            .from(FromItem::new("Painting").alias("p")),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "p");
    let entities: Vec<_> = compiled.result().unwrap().entities().collect();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[1].prefix, "ec1_");
}

#[test]
fn test_scalar_select_roots_at_first_from_item() {
    // SELECT g.galleryName FROM Gallery g, Artist a
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(path_expr("g.galleryName")))
            .from(FromItem::new("Gallery").alias("g"))
            .from(FromItem::new("Artist").alias("a")),
    )
    .unwrap();
    assert_eq!(compiled.root_id(), "g");
}

// ============================================================================
// Other statement shapes
// ============================================================================

#[test]
fn test_group_by_having_order_by() {
    // SELECT a.artistName, COUNT(p) FROM Artist a JOIN a.paintings p
    // GROUP BY a.artistName HAVING COUNT(p) > 1 ORDER BY a.artistName
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(path_expr("a.artistName")))
            .select(SelectItem::new(count(var("p"))))
            .from(
                FromItem::new("Artist")
                    .alias("a")
                    .join(Join::inner(path("a.paintings")).alias("p")),
            )
            .group_by(path_expr("a.artistName"))
            .having(count(var("p")).gt(lit_int(1)))
            .order_by(path_expr("a.artistName"), false),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "a");
    let result = compiled.result().unwrap();
    assert_eq!(result.column_names(), vec!["sc0", "sc1"]);
}

#[test]
fn test_db_path_in_where() {
    // SELECT a FROM Artist a WHERE db:a.paintingArray.PAINTING_TITLE = 'x'
    let compiled = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(db_path("a.paintingArray.PAINTING_TITLE").eq(lit_str("x"))),
    );
    assert!(compiled.is_ok(), "{:?}", compiled.err());

    let err = compile(
        Select::new()
            .select(SelectItem::new(var("a")))
            .from(FromItem::new("Artist").alias("a"))
            .filter(db_path("a.paintingArray.NOPE").eq(lit_str("x"))),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnmappedIdentifier { ref identifier, .. } if identifier == "NOPE"
    ));
}

#[test]
fn test_update_statement() {
    // UPDATE Artist a SET a.artistName = 'x' WHERE a.paintings.paintingTitle = 'y'
    let compiled = compile(
        Update::new(FromItem::new("Artist").alias("a"))
            .set(path("a.artistName"), lit_str("x"))
            .filter(path_expr("a.paintings.paintingTitle").eq(lit_str("y"))),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "a");
    assert!(compiled.result().is_none());
    assert_eq!(compiled.entity_descriptor("a.paintings").unwrap().name, "Painting");
}

#[test]
fn test_update_with_unknown_set_target() {
    let err = compile(
        Update::new(FromItem::new("Artist").alias("a")).set(path("a.nickname"), lit_str("x")),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnmappedIdentifier { .. }));
}

#[test]
fn test_delete_statement() {
    // DELETE FROM Painting WHERE Painting.paintingTitle = 'x'
    let compiled = compile(
        Delete::new(FromItem::new("Painting"))
            .filter(path_expr("Painting.paintingTitle").eq(lit_str("x"))),
    )
    .unwrap();

    assert_eq!(compiled.root_id(), "%painting");
    assert!(compiled.result().is_none());
}

// ============================================================================
// Limits and malformed trees
// ============================================================================

#[test]
fn test_nesting_limit() {
    let settings = CompilerSettings {
        max_nesting_depth: 2,
        ..CompilerSettings::default()
    };
    let statement: Statement = Select::new()
        .select(SelectItem::new(var("a")))
        .from(FromItem::new("Artist").alias("a"))
        .filter(
            path_expr("a.artistName")
                .eq(lit_str("x"))
                .and(path_expr("a.shortAttribute").gt(lit_int(1))),
        )
        .into();

    let err = Compiler::new(sample_catalog())
        .with_settings(settings)
        .compile("", &statement)
        .unwrap_err();
    assert_eq!(err, CompileError::NestingTooDeep { limit: 2 });
}

#[test]
fn test_path_length_limit() {
    let settings = CompilerSettings {
        max_path_segments: 3,
        ..CompilerSettings::default()
    };
    let statement: Statement = Select::new()
        .select(SelectItem::new(var("p")))
        .from(FromItem::new("Painting").alias("p"))
        .filter(path_expr("p.toGallery.paintingArray.paintingTitle").eq(lit_str("x")))
        .into();

    let err = Compiler::new(sample_catalog())
        .with_settings(settings)
        .compile("", &statement)
        .unwrap_err();
    assert!(matches!(err, CompileError::PathTooLong { segments: 4, limit: 3, .. }));
}

#[test]
fn test_select_without_from() {
    let err = compile(Select::new().select(SelectItem::new(lit_int(1)))).unwrap_err();
    assert!(matches!(err, CompileError::InvalidStatement(_)));
}

// ============================================================================
// Determinism and serialization
// ============================================================================

fn fetch_query() -> Statement {
    Select::new()
        .select(SelectItem::new(var("a")))
        .select(SelectItem::new(path_expr("a.artistName")))
        .from(
            FromItem::new("Artist")
                .alias("a")
                .join(Join::inner(path("a.paintings")).fetch().alias("p")),
        )
        .filter(path_expr("p.toGallery.galleryName").eq(lit_str("x")))
        .into()
}

#[test]
fn test_compilation_is_deterministic() {
    let compiler = Compiler::new(sample_catalog());
    let first = compiler.compile("", &fetch_query()).unwrap();
    let second = compiler.compile("", &fetch_query()).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.result(), second.result());
}

#[test]
fn test_compile_from_json_document() {
    let json = std::fs::read_to_string(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("demos")
            .join("artist_paintings.json"),
    )
    .unwrap();
    let document: QueryDocument = serde_json::from_str(&json).unwrap();
    let catalog = EntityCatalog::from_file(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("demos")
            .join("art.toml"),
    )
    .unwrap();

    let compiled = Compiler::new(catalog)
        .compile(&document.source, &document.statement)
        .unwrap();
    assert!(compiled.source().starts_with("SELECT a, COUNT(p)"));
    assert_eq!(compiled.root_id(), "a");
    assert_eq!(compiled.expression(), &document.statement);

    let tree = compiled.prefetch_tree().unwrap();
    assert_eq!(tree.non_phantom().len(), 1);
}

#[test]
fn test_compiled_expression_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CompiledExpression>();
    assert_send_sync::<Compiler>();
}
