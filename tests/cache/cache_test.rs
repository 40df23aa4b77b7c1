//! Expression cache tests.

use std::sync::Arc;
use std::thread;

use objql::ast::{lit_str, path_expr, var, ExprExt, FromItem, Select, SelectItem, Statement};
use objql::cache::{CacheError, CacheStats, ExpressionCache};
use objql::compiler::{CompileError, Compiler};
use objql::config::{CacheSettings, CompilerSettings};
use objql::test_utils::sample_catalog;

fn artists_named(name: &str) -> Statement {
    Select::new()
        .select(SelectItem::new(var("a")))
        .from(FromItem::new("Artist").alias("a"))
        .filter(path_expr("a.artistName").eq(lit_str(name)))
        .into()
}

#[test]
fn test_hit_returns_shared_expression() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::new(16);

    let first = cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();
    let second = cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            entries: 1,
        }
    );
}

#[test]
fn test_source_text_keys_the_entry() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::new(16);
    let source = "SELECT a FROM Artist a WHERE a.artistName = 'x'";

    cache.get_or_compile(&compiler, source, &artists_named("x")).unwrap();
    cache.get_or_compile(&compiler, source, &artists_named("x")).unwrap();
    cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_different_statements_are_distinct() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::new(16);

    cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();
    cache.get_or_compile(&compiler, "", &artists_named("y")).unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_settings_are_part_of_the_key() {
    let cache = ExpressionCache::new(16);
    let default = Compiler::new(sample_catalog());
    let strict = Compiler::new(sample_catalog()).with_settings(CompilerSettings {
        max_path_segments: 8,
        ..CompilerSettings::default()
    });

    cache.get_or_compile(&default, "", &artists_named("x")).unwrap();
    cache.get_or_compile(&strict, "", &artists_named("x")).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_full_cache_still_compiles() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::new(1);

    cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();
    let overflow = cache.get_or_compile(&compiler, "", &artists_named("y")).unwrap();

    assert_eq!(overflow.root_id(), "a");
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_disabled_cache_stores_nothing() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::from_settings(&CacheSettings {
        enabled: false,
        capacity: 16,
    });

    cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();
    cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();

    assert!(cache.is_empty());
    assert_eq!(cache.stats(), CacheStats::default());
}

#[test]
fn test_errors_are_not_cached() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::new(16);
    let statement: Statement = Select::new()
        .select(SelectItem::new(var("s")))
        .from(FromItem::new("Sculpture").alias("s"))
        .into();

    let err = cache.get_or_compile(&compiler, "", &statement).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Compile(CompileError::UnmappedAbstractSchemaName(_))
    ));
    assert!(cache.is_empty());
}

#[test]
fn test_clear() {
    let compiler = Compiler::new(sample_catalog());
    let cache = ExpressionCache::new(16);
    cache.get_or_compile(&compiler, "", &artists_named("x")).unwrap();

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_compilation_shares_entries() {
    let compiler = Arc::new(Compiler::new(sample_catalog()));
    let cache = Arc::new(ExpressionCache::new(64));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compiler = Arc::clone(&compiler);
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let name = if i % 2 == 0 { "even" } else { "odd" };
                cache
                    .get_or_compile(&compiler, "", &artists_named(name))
                    .unwrap()
                    .root_id()
                    .to_string()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "a");
    }

    let stats = cache.stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.hits + stats.misses, 8);
}
