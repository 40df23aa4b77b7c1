//! Compiled expression cache.
//!
//! Compilation is a pure function of (statement, catalog), so compiled
//! expressions can be shared freely once built. The cache keeps them in a
//! `DashMap` so any number of threads can compile through it.
//!
//! # Key Format
//!
//! ```text
//! sha256(catalog hash, settings, "src", query text)         when text is known
//! sha256(catalog hash, settings, "ast", statement as JSON)  otherwise
//! ```
//!
//! The cache is bounded: once `capacity` entries exist, further expressions
//! are still compiled and returned but not stored.
//!
//! A cached expression is exactly what [`Compiler::compile`] returned,
//! including its prefetch ownership: of two variables fetching the same
//! relative path only the first gets the prefetched columns.

mod hash;
pub use hash::{compute_hash, hash_parts};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::ast::Statement;
use crate::compiler::{CompileError, CompiledExpression, Compiler};
use crate::config::CacheSettings;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Failed to hash statement: {0}")]
    Hash(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe memo of compiled expressions.
#[derive(Debug)]
pub struct ExpressionCache {
    entries: DashMap<String, Arc<CompiledExpression>>,
    capacity: usize,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ..Self::new(settings.capacity)
        }
    }

    /// Return the cached expression for `statement`, compiling it on a miss.
    pub fn get_or_compile(
        &self,
        compiler: &Compiler,
        source: &str,
        statement: &Statement,
    ) -> CacheResult<Arc<CompiledExpression>> {
        if !self.enabled {
            return Ok(Arc::new(compiler.compile(source, statement)?));
        }

        let key = cache_key(compiler, source, statement)?;
        if let Some(hit) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(target: "objql.cache", key = %key, "cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(compiler.compile(source, statement)?);

        if self.entries.len() >= self.capacity {
            tracing::warn!(
                target: "objql.cache",
                capacity = self.capacity,
                "expression cache full, not caching"
            );
            return Ok(compiled);
        }

        // Another thread may have raced us here; keep whichever landed first.
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

fn cache_key(compiler: &Compiler, source: &str, statement: &Statement) -> CacheResult<String> {
    let catalog = compiler.catalog().content_hash().as_bytes();
    let settings = serde_json::to_string(compiler.settings())?;
    if !source.trim().is_empty() {
        return Ok(hash_parts(&[catalog, settings.as_bytes(), b"src", source.as_bytes()]));
    }
    let json = serde_json::to_string(statement)?;
    Ok(hash_parts(&[catalog, settings.as_bytes(), b"ast", json.as_bytes()]))
}
