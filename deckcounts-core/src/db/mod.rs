//! Database layer for deckcounts
//!
//! This module provides the collection store using SQLite with:
//! - Schema migrations
//! - The deck catalog with subtree-summed queue counters
//! - A [`StatsProvider`](crate::stats::StatsProvider) over the cards table

pub mod repo;
pub mod schema;

pub use repo::Database;
