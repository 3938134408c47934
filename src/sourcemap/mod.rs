mod compose;
#[cfg(feature = "json")]
mod json;

use crate::intern::StringInterner;
use crate::mapping::{
    IndexedMapping, Mapping, OriginalSite, Position, ResolvedMapping, ResolvedSite,
};
use crate::mappings::{Mappings, MappingsDecoder};
use crate::snapshot;
use crate::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::io;
use std::io::Write;

/// The `mappings` side of an engine.
///
/// A map built from a single VLQ ingest keeps the input string untouched:
/// re-emitting it is a copy instead of a full encode, which is where most
/// of the time goes on large unmodified maps. The first structural change
/// materializes the string into the parsed table and the cached form is
/// gone for good.
#[derive(Debug, Clone)]
enum MappingsRepr {
    Raw {
        vlq: String,
        source_ids: Vec<u32>,
        name_ids: Vec<u32>,
    },
    Parsed(Mappings),
}

/// The result of [SourceMap::to_vlq]: the `mappings` string plus the
/// parallel tables of the Source Map v3 data model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlqMap {
    pub mappings: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
}

/// A source map engine.
///
/// Ingests VLQ `mappings` strings, indexed mappings and binary snapshots,
/// keeps everything in a line-indexed table, and re-emits either form.
/// Sources and names are interned: adding a path twice yields the same id.
///
/// An instance is single-threaded; distinct instances are independent.
/// Dropping the map releases everything it owns.
///
/// # Example
/// ```
/// use kumo::SourceMap;
///
/// let mut map = SourceMap::new();
/// map.add_vlq_mappings("AAAA;AACA", &["input.js"], &[], &[], 0, 0).unwrap();
///
/// let found = map.find_closest_mapping(2, 10).unwrap();
/// assert_eq!(found.original.unwrap().source, "input.js");
/// ```
#[derive(Clone)]
pub struct SourceMap {
    sources: StringInterner,
    sources_content: Vec<String>,
    names: StringInterner,
    repr: MappingsRepr,
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceMap {
    /// Creates an empty source map.
    pub fn new() -> Self {
        Self {
            sources: StringInterner::default(),
            sources_content: Vec::new(),
            names: StringInterner::default(),
            repr: MappingsRepr::Parsed(Mappings::default()),
        }
    }

    /// Restores an engine from a snapshot produced by [SourceMap::to_buffer].
    pub fn from_buffer(buf: &[u8]) -> Result<Self> {
        let snapshot = snapshot::read_buffer(buf)?;

        let mut map = Self::new();
        for (idx, source) in snapshot.sources.iter().enumerate() {
            if map.sources.intern(source) != idx as u32 {
                return Err(Error::IncompatibleSnapshot("duplicate source"));
            }
        }
        for (idx, name) in snapshot.names.iter().enumerate() {
            if map.names.intern(name) != idx as u32 {
                return Err(Error::IncompatibleSnapshot("duplicate name"));
            }
        }
        map.sources_content = snapshot.sources_content;
        map.repr = MappingsRepr::Parsed(snapshot.mappings);
        Ok(map)
    }

    /// True until the first source, name or mapping arrives.
    fn is_pristine(&self) -> bool {
        self.sources.is_empty()
            && self.names.is_empty()
            && self.sources_content.is_empty()
            && matches!(&self.repr, MappingsRepr::Parsed(mappings) if mappings.is_empty())
    }

    /// Switches to the parsed table, decoding the cached raw string if one
    /// is still around.
    pub(crate) fn materialize(&mut self) -> &mut Mappings {
        if let MappingsRepr::Raw {
            vlq,
            source_ids,
            name_ids,
        } = &self.repr
        {
            let batch = MappingsDecoder::new(vlq)
                .remap(source_ids, name_ids)
                .decode()
                .unwrap_or_else(|_| unreachable!("raw mappings are validated on ingest"));

            let mut mappings = Mappings::default();
            for mapping in batch {
                mappings.add(mapping);
            }
            self.repr = MappingsRepr::Parsed(mappings);
        }

        let MappingsRepr::Parsed(mappings) = &mut self.repr else {
            unreachable!()
        };
        mappings
    }

    /// The parsed mapping table, in generated order.
    pub fn mappings(&mut self) -> &Mappings {
        self.materialize()
    }
}

impl SourceMap {
    /// Interns a source path, returning its id. Adding a known path returns
    /// the existing id.
    pub fn add_source(&mut self, source: &str) -> u32 {
        self.sources.intern(source)
    }

    pub fn add_sources<S>(&mut self, sources: impl IntoIterator<Item = S>) -> Vec<u32>
    where
        S: AsRef<str>,
    {
        sources
            .into_iter()
            .map(|source| self.sources.intern(source.as_ref()))
            .collect()
    }

    /// Interns a symbol name, returning its id.
    pub fn add_name(&mut self, name: &str) -> u32 {
        self.names.intern(name)
    }

    pub fn add_names<S>(&mut self, names: impl IntoIterator<Item = S>) -> Vec<u32>
    where
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| self.names.intern(name.as_ref()))
            .collect()
    }

    pub fn get_source(&self, id: u32) -> Result<&str> {
        self.sources.get(id).ok_or(Error::SourceOutOfRange(id))
    }

    pub fn get_source_index(&self, source: &str) -> Option<u32> {
        self.sources.index_of(source)
    }

    pub fn get_name(&self, id: u32) -> Result<&str> {
        self.names.get(id).ok_or(Error::NameOutOfRange(id))
    }

    pub fn get_name_index(&self, name: &str) -> Option<u32> {
        self.names.index_of(name)
    }

    pub fn sources(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.sources.iter()
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.names.iter()
    }

    /// Content per source, empty for sources without one.
    pub fn sources_content(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        (0..self.sources.len() as usize)
            .map(|idx| self.sources_content.get(idx).map_or("", String::as_str))
    }

    /// Attaches content to a source, interning the path if it is new.
    /// Overwrites any previous content.
    pub fn set_source_content(&mut self, source: &str, content: &str) {
        let id = self.sources.intern(source);
        self.set_content_by_id(id, content);
    }

    /// Content of `source`: `None` for unknown paths, the empty string for
    /// known paths without content.
    pub fn get_source_content(&self, source: &str) -> Option<&str> {
        let idx = self.sources.index_of(source)? as usize;
        Some(self.sources_content.get(idx).map_or("", String::as_str))
    }

    pub(crate) fn set_content_by_id(&mut self, id: u32, content: &str) {
        let idx = id as usize;
        if self.sources_content.len() <= idx {
            self.sources_content.resize(idx + 1, String::new());
        }
        content.clone_into(&mut self.sources_content[idx]);
    }
}

impl SourceMap {
    /// Appends a batch of VLQ-encoded mappings.
    ///
    /// `sources`/`sources_content`/`names` are the donor map's parallel
    /// tables; ids inside the string are translated to this map's ids as
    /// the donor tables are interned. `line_offset` shifts every donor
    /// line; `column_offset` shifts only the donor's first line, which is
    /// how concatenated generated text lines up.
    ///
    /// On a malformed string no mappings are committed.
    pub fn add_vlq_mappings<S>(
        &mut self,
        mappings: &str,
        sources: &[S],
        sources_content: &[S],
        names: &[S],
        line_offset: u32,
        column_offset: u32,
    ) -> Result<()>
    where
        S: AsRef<str>,
    {
        let pristine = self.is_pristine();

        let source_ids = self.add_sources(sources);
        for (idx, content) in sources_content.iter().enumerate() {
            let content = content.as_ref();
            if content.is_empty() {
                continue;
            }
            if let Some(&id) = source_ids.get(idx) {
                self.set_content_by_id(id, content);
            }
        }
        let name_ids = self.add_names(names);

        if pristine && line_offset == 0 && column_offset == 0 {
            // keep the untouched string; prove it well-formed now so
            // materializing later cannot fail
            MappingsDecoder::new(mappings)
                .remap(&source_ids, &name_ids)
                .validate()?;
            self.repr = MappingsRepr::Raw {
                vlq: mappings.to_owned(),
                source_ids,
                name_ids,
            };
            return Ok(());
        }

        let batch = MappingsDecoder::new(mappings)
            .remap(&source_ids, &name_ids)
            .offset(line_offset, column_offset)
            .decode()?;

        let table = self.materialize();
        for mapping in batch {
            table.add(mapping);
        }
        Ok(())
    }

    /// Appends one mapping given in the public 1-based-line form.
    pub fn add_indexed_mapping(
        &mut self,
        mapping: IndexedMapping<'_>,
        line_offset: u32,
        column_offset: u32,
    ) {
        let line = mapping.generated.line.saturating_sub(1) + line_offset;
        let column = if mapping.generated.line <= 1 {
            mapping.generated.column + column_offset
        } else {
            mapping.generated.column
        };

        let mut entry = Mapping::new(line, column);
        if let (Some(original), Some(source)) = (mapping.original, mapping.source) {
            let source_id = self.sources.intern(source);
            let mut site = OriginalSite::new(
                source_id,
                Position::new(original.line.saturating_sub(1), original.column),
            );
            if let Some(name) = mapping.name {
                site = site.with_name(self.names.intern(name));
            }
            entry = entry.with_original(site);
        }

        self.materialize().add(entry);
    }

    /// Finds the mapping closest at or before the given generated position
    /// (1-based line, 0-based column), with source and name resolved to
    /// strings.
    pub fn find_closest_mapping(&mut self, line: u32, column: u32) -> Option<ResolvedMapping<'_>> {
        let pos = Position::new(line.checked_sub(1)?, column);
        let found = self.materialize().find_closest(pos)?;
        Some(self.resolve(found))
    }

    fn resolve(&self, mapping: Mapping) -> ResolvedMapping<'_> {
        ResolvedMapping {
            generated: Position::new(mapping.generated.line + 1, mapping.generated.column),
            original: mapping.original.map(|site| ResolvedSite {
                position: Position::new(site.position.line + 1, site.position.column),
                source: self.sources.get(site.source).unwrap_or(""),
                name: site.name.and_then(|name| self.names.get(name)),
            }),
        }
    }

    /// Shifts every line at or after `generated_line` (1-based) by
    /// `offset` lines. Mappings already in the landing range are dropped.
    pub fn offset_lines(&mut self, generated_line: u32, offset: i64) -> Result<()> {
        self.materialize()
            .offset_lines(generated_line.saturating_sub(1), offset)
    }

    /// Shifts every mapping of `generated_line` (1-based) at or after
    /// `generated_column` by `offset` columns.
    pub fn offset_columns(
        &mut self,
        generated_line: u32,
        generated_column: u32,
        offset: i64,
    ) -> Result<()> {
        self.materialize()
            .offset_columns(generated_line.saturating_sub(1), generated_column, offset)
    }

    /// Registers `source` with `content` and adds a line-identity mapping
    /// for each of its lines, starting at generated line `line_offset`
    /// (0-based). This is the map of a file copied verbatim into the
    /// bundle.
    pub fn add_empty_map(&mut self, source: &str, content: &str, line_offset: u32) {
        let source_id = self.sources.intern(source);
        self.set_content_by_id(source_id, content);

        let table = self.materialize();
        for (line, _) in content.lines().enumerate() {
            let line = line as u32;
            table.add(
                Mapping::new(line + line_offset, 0).with_original(OriginalSite::new(
                    source_id,
                    Position::new(line, 0),
                )),
            );
        }
    }
}

impl SourceMap {
    /// Writes the `mappings` string. Raw-cached maps copy the cached
    /// string; parsed maps run the encoder.
    pub fn write_vlq<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        match &self.repr {
            MappingsRepr::Raw { vlq, .. } => writer.write_all(vlq.as_bytes()),
            MappingsRepr::Parsed(mappings) => mappings.encode(writer),
        }
    }

    /// Emits the map in the Source Map v3 data model: the `mappings`
    /// string plus the sources, contents and names tables.
    pub fn to_vlq(&self) -> io::Result<VlqMap> {
        let mut out = Vec::with_capacity(1024);
        self.write_vlq(&mut out)?;

        Ok(VlqMap {
            // SAFETY: the encoder and the cached input only ever hold
            // base64 digits and `;`/`,` separators, which are ASCII
            mappings: unsafe { String::from_utf8_unchecked(out) },
            sources: self.sources.to_vec(),
            sources_content: self.sources_content().map(str::to_owned).collect(),
            names: self.names.to_vec(),
        })
    }

    /// Serializes the full engine state into a snapshot blob.
    pub fn to_buffer(&mut self) -> Vec<u8> {
        self.materialize();
        let MappingsRepr::Parsed(mappings) = &self.repr else {
            unreachable!()
        };

        let mut out = Vec::new();
        snapshot::write_buffer(
            self.sources.iter(),
            &self.sources_content,
            self.names.iter(),
            mappings,
            &mut out,
        );
        out
    }
}

impl Debug for SourceMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SourceMap\n")?;
        f.write_str("  sources:\n")?;
        for (idx, source) in self.sources.iter().enumerate() {
            writeln!(f, "    {idx}: {source}")?;
        }
        f.write_str("  names:\n")?;
        for (idx, name) in self.names.iter().enumerate() {
            writeln!(f, "    {idx}: {name}")?;
        }
        match &self.repr {
            MappingsRepr::Raw { vlq, .. } => {
                writeln!(f, "  mappings (raw): {vlq}")?;
            }
            MappingsRepr::Parsed(mappings) => {
                f.write_str("  mappings:\n")?;
                let mut last_line = None;
                for mapping in mappings.iter() {
                    if last_line == Some(mapping.generated.line) {
                        write!(f, ", {mapping:?}")?;
                    } else {
                        if last_line.is_some() {
                            f.write_str("\n")?;
                        }
                        write!(f, "    {mapping:?}")?;
                    }
                    last_line = Some(mapping.generated.line);
                }
                if last_line.is_some() {
                    f.write_str("\n")?;
                }
            }
        }
        Ok(())
    }
}
