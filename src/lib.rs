//! Crawl frontier, resource classification and sitemap aggregation behind the `docsweep` binary.

pub mod classify;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod records;
pub mod repo;
pub mod sitemap;
