// src/crawl/mod.rs
// =============================================================================
// This module walks a directory-listing tree.
//
// Features:
// - Depth-first traversal from the root listing
// - Every listing fetched at most once per run
// - Configurable depth limit
// - Polite crawling with a delay before each entry
// - Safety filtering of every entry before it is followed or queued
//
// Submodules:
// - safety: which entries may be acted on
// - engine: the traversal itself
// =============================================================================

mod engine;
mod safety;

pub use engine::CrawlEngine;
pub use safety::SafetyFilter;
