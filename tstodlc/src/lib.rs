//! tstodlc - DLC packaging for The Simpsons: Tapped Out servers
//!
//! This library turns content directories into the two-file distribution
//! units the game downloads (a catalog blob `0` and a content archive `1`)
//! and keeps the package indices that announce them in sync.
//!
//! - [`catalog`] encodes and decodes catalog blobs.
//! - [`index`] reads, merges and writes package index documents.
//! - [`pack`] drives a packaging run over input directories.
//! - [`config`] and [`logging`] provide the ambient setup for the CLI.

pub mod catalog;
pub mod config;
mod fsutil;
pub mod index;
pub mod logging;
pub mod pack;
