//! # kumo
//!
//! A source map engine: the mapping store behind a bundler, debugger or
//! error-reporting pipeline.
//!
//! ## Getting Started
//!
//! ```
//! use kumo::SourceMap;
//!
//! let mut map = SourceMap::new();
//! map.add_vlq_mappings("AAAA;AACA,IAAMA", &["app.js"], &[], &["answer"], 0, 0).unwrap();
//!
//! // Positions use 1-based lines and 0-based columns at this surface.
//! let found = map.find_closest_mapping(2, 6).unwrap();
//! assert_eq!(found.original.unwrap().name, Some("answer"));
//!
//! // Snapshot the whole engine for a cross-process cache.
//! let blob = map.to_buffer();
//! let restored = SourceMap::from_buffer(&blob).unwrap();
//! ```
//!
//! ## Overview
//!
//! ### `SourceMap`
//!
//! [SourceMap] owns the sources, contents and names tables plus the
//! line-indexed mapping table. Mappings come in as VLQ strings
//! ([add_vlq_mappings](SourceMap::add_vlq_mappings)), single entries
//! ([add_indexed_mapping](SourceMap::add_indexed_mapping)), snapshot blobs
//! ([add_buffer_mappings](SourceMap::add_buffer_mappings)) or whole other
//! maps ([append_sourcemap](SourceMap::append_sourcemap)), and go out as a
//! VLQ string ([to_vlq](SourceMap::to_vlq)) or a snapshot
//! ([to_buffer](SourceMap::to_buffer)).
//!
//! A map built from one VLQ ingest keeps the input string and re-emits it
//! verbatim until the first structural change, which makes the common
//! parse-then-serialize path of a build pipeline a plain copy.
//!
//! ### `extends`
//!
//! [extends](SourceMap::extends) composes a map with the map of an earlier
//! transform: original positions are re-anchored through the donor's
//! generated-to-original relation, so a minified bundle's map can point all
//! the way back to the pre-transpile sources.
//!
//! ### `Mapping` / `Position`
//!
//! [Mapping] is one entry of the table, 0-based. [ResolvedMapping] is the
//! public lookup result, 1-based lines with source and name resolved to
//! strings.
//!
//! ## Features
//!
//! - `json` (default): Source Map v3 JSON envelope parsing and
//!   serialization ([from_json_slice](SourceMap::from_json_slice),
//!   [write_json](SourceMap::write_json)).

mod error;
mod intern;
mod mapping;
mod mappings;
mod snapshot;
mod sourcemap;
mod splitter;
mod vlq;

pub use error::*;
pub use mapping::*;
pub use mappings::Mappings;
pub use sourcemap::*;
