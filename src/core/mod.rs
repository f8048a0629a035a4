// ─── userdev Core ───
// Artifact virtualization for mod development: declared game and mod
// dependencies are synthesized on first use (download → extract → remap →
// repackage) and served from a local Maven-layout store.
//
// Architecture:
//   core/
//     maven/      Coordinates, POM model, repository download service
//     downloader/ HTTP client, download service trait, raw download cache
//     cache/      Coordinate-keyed artifact store with per-key locks
//     mapping/    Class name tables and the mapping service
//     access/     Access transformer rules and class file flag patching
//     producers/  Declarations, producer chain, vanilla/userdev/deobf
//     session/    Expansion and serving, build facts, properties sink

pub mod access;
pub mod cache;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod mapping;
pub mod maven;
pub mod producers;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
