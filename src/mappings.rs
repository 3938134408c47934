use crate::mapping::{Mapping, OriginalSite, Position};
use crate::splitter::Splitter;
use crate::vlq;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::io;
use std::io::Write;

/// One generated line's mappings, ordered by generated column.
///
/// Duplicate columns are kept and insertion among equals is stable, so a
/// decoded `mappings` string re-encodes byte-identically even when a
/// producer emitted redundant segments.
#[derive(Debug, Clone, Default)]
pub struct MappingLine {
    pub(crate) entries: Vec<(u32, Option<OriginalSite>)>,
}

impl MappingLine {
    pub(crate) fn add(&mut self, column: u32, original: Option<OriginalSite>) {
        match self.entries.last() {
            Some(&(last_column, _)) if column < last_column => {
                // out-of-order columns happen when offset batches interleave;
                // keep the line sorted with a stable insert
                let idx = self.entries.partition_point(|&(c, _)| c <= column);
                self.entries.insert(idx, (column, original));
            }
            _ => self.entries.push((column, original)),
        }
    }

    /// The greatest entry with column `<= column`, preferring the
    /// last-inserted among equals.
    pub(crate) fn find(&self, column: u32) -> Option<&(u32, Option<OriginalSite>)> {
        let idx = self.entries.partition_point(|&(c, _)| c <= column);
        idx.checked_sub(1).map(|idx| &self.entries[idx])
    }

    pub(crate) fn last(&self) -> Option<&(u32, Option<OriginalSite>)> {
        self.entries.last()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn offset_columns(&mut self, from_column: u32, delta: i64) -> Result<()> {
        let landing = from_column as i64 + delta;
        if landing < 0 {
            return Err(Error::OffsetOutOfRange);
        }
        if delta == 0 || self.entries.is_empty() {
            return Ok(());
        }
        if let Some(&(last_column, _)) = self.entries.last() {
            if last_column >= from_column && last_column as i64 + delta > u32::MAX as i64 {
                return Err(Error::OffsetOutOfRange);
            }
        }

        if delta < 0 {
            // entries already sitting where the shifted range lands get
            // overwritten, same as a line offset
            let landing = landing as u32;
            self.entries
                .retain(|&(c, _)| c < landing || c >= from_column);
        }
        for (column, _) in &mut self.entries {
            if *column >= from_column {
                *column = (*column as i64 + delta) as u32;
            }
        }
        Ok(())
    }
}

/// The engine's mapping table: per-generated-line buckets keyed by line
/// number.
///
/// A BTreeMap keeps lines sorted for emission, makes "greatest non-empty
/// line at or before" queries a range scan, and turns whole-tail line
/// shifts into `split_off` moves.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    lines: BTreeMap<u32, MappingLine>,
}

impl Mappings {
    pub(crate) fn add(&mut self, mapping: Mapping) {
        self.lines
            .entry(mapping.generated.line)
            .or_default()
            .add(mapping.generated.column, mapping.original);
    }

    pub fn len(&self) -> usize {
        self.lines.values().map(|line| line.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.values().all(MappingLine::is_empty)
    }

    /// Iterates every mapping in generated order.
    pub fn iter(&self) -> impl Iterator<Item = Mapping> + '_ {
        self.lines.iter().flat_map(|(&line, bucket)| {
            bucket
                .entries
                .iter()
                .map(move |&(column, original)| Mapping {
                    generated: Position::new(line, column),
                    original,
                })
        })
    }

    pub(crate) fn lines(&self) -> &BTreeMap<u32, MappingLine> {
        &self.lines
    }

    pub(crate) fn lines_mut(&mut self) -> &mut BTreeMap<u32, MappingLine> {
        &mut self.lines
    }

    /// Finds the mapping for a generated position (0-based).
    ///
    /// If an exact match is not found, this returns the closest preceding
    /// mapping: the greatest column at or before `pos.column` on the
    /// greatest non-empty line at or before `pos.line`, descending further
    /// when that line only has later columns. If there are no preceding
    /// mappings, it returns `None`.
    pub fn find_closest(&self, pos: Position) -> Option<Mapping> {
        for (&line, bucket) in self.lines.range(..=pos.line).rev() {
            let entry = if line == pos.line {
                bucket.find(pos.column)
            } else {
                bucket.last()
            };
            if let Some(&(column, original)) = entry {
                return Some(Mapping {
                    generated: Position::new(line, column),
                    original,
                });
            }
        }
        None
    }

    /// Moves every line at or after `from_line` by `delta` lines.
    ///
    /// Lines already occupying the landing range are overwritten. Fails
    /// without modifying anything when the shift would leave `u32` range.
    pub(crate) fn offset_lines(&mut self, from_line: u32, delta: i64) -> Result<()> {
        let landing = from_line as i64 + delta;
        if landing < 0 || landing > u32::MAX as i64 {
            return Err(Error::OffsetOutOfRange);
        }
        if delta == 0 {
            return Ok(());
        }
        if let Some((&max_line, _)) = self.lines.last_key_value() {
            if max_line >= from_line && max_line as i64 + delta > u32::MAX as i64 {
                return Err(Error::OffsetOutOfRange);
            }
        }

        let moved = self.lines.split_off(&from_line);
        if delta < 0 {
            // drop lines the shifted tail will land on
            self.lines.split_off(&(landing as u32));
        }
        for (line, bucket) in moved {
            self.lines.insert((line as i64 + delta) as u32, bucket);
        }
        Ok(())
    }

    /// Moves every mapping of `line` at or after `from_column` by `delta`
    /// columns. Mappings already occupying the landing range are
    /// overwritten.
    pub(crate) fn offset_columns(&mut self, line: u32, from_column: u32, delta: i64) -> Result<()> {
        match self.lines.get_mut(&line) {
            Some(bucket) => bucket.offset_columns(from_column, delta),
            None => Ok(()),
        }
    }
}

impl Mappings {
    /// Emits the table as a Source Map v3 `mappings` string.
    ///
    /// Deterministic: the same table always produces byte-identical output.
    /// Separators are only written ahead of each non-empty line, so the
    /// output never carries trailing semicolons.
    pub(crate) fn encode<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        let mut last_line = 0u32;
        let mut prev_source = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut prev_name = 0i64;

        for (&line, bucket) in &self.lines {
            if bucket.is_empty() {
                continue;
            }

            while last_line < line {
                writer.write_all(b";")?;
                last_line += 1;
            }

            let mut prev_column = 0i64;
            let mut first = true;
            for &(column, original) in &bucket.entries {
                if !first {
                    writer.write_all(b",")?;
                }
                first = false;

                vlq::encode(column as i64 - prev_column, writer)?;
                prev_column = column as i64;

                if let Some(original) = original {
                    vlq::encode(original.source as i64 - prev_source, writer)?;
                    prev_source = original.source as i64;

                    vlq::encode(original.position.line as i64 - prev_original_line, writer)?;
                    prev_original_line = original.position.line as i64;

                    vlq::encode(
                        original.position.column as i64 - prev_original_column,
                        writer,
                    )?;
                    prev_original_column = original.position.column as i64;

                    if let Some(name) = original.name {
                        vlq::encode(name as i64 - prev_name, writer)?;
                        prev_name = name as i64;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Streaming decoder for a Source Map v3 `mappings` string.
///
/// Donor source/name ids are translated through remap slices (donor id →
/// host id, the values returned by interning the donor's tables), and
/// generated positions are shifted by the configured offsets. The column
/// offset only applies to the donor's first line: concatenated generated
/// text continues that line, every later donor line starts its own.
#[derive(Debug)]
pub(crate) struct MappingsDecoder<'a> {
    vlq: &'a str,
    source_ids: &'a [u32],
    name_ids: &'a [u32],
    line_offset: u32,
    column_offset: u32,
}

impl<'a> MappingsDecoder<'a> {
    pub fn new(vlq: &'a str) -> Self {
        Self {
            vlq,
            source_ids: &[],
            name_ids: &[],
            line_offset: 0,
            column_offset: 0,
        }
    }

    pub fn remap(mut self, source_ids: &'a [u32], name_ids: &'a [u32]) -> Self {
        self.source_ids = source_ids;
        self.name_ids = name_ids;
        self
    }

    pub fn offset(mut self, line_offset: u32, column_offset: u32) -> Self {
        self.line_offset = line_offset;
        self.column_offset = column_offset;
        self
    }

    /// Decodes the whole string into a flat batch.
    ///
    /// The batch is the staging buffer: callers merge it into the table only
    /// after the entire string decoded, so a malformed input never leaves
    /// partial mappings behind.
    pub fn decode(&self) -> Result<Vec<Mapping>> {
        let mut batch = Vec::new();
        self.walk(|mapping| batch.push(mapping))?;
        Ok(batch)
    }

    /// Runs the full decode without keeping the mappings.
    ///
    /// Used at raw-cache ingest: the string is proven well-formed up front,
    /// which keeps the later materialization infallible.
    pub fn validate(&self) -> Result<()> {
        self.walk(|_| {})
    }

    fn walk<F>(&self, mut push: F) -> Result<()>
    where
        F: FnMut(Mapping),
    {
        let mut generated_line: u32 = 0;
        let mut generated_column: i64 = 0;
        let mut source: i64 = 0;
        let mut original_line: i64 = 0;
        let mut original_column: i64 = 0;
        let mut name: i64 = 0;

        let mut buf = [0i64; 5];

        for line in Splitter::new(self.vlq, b';') {
            if !line.is_empty() {
                for segment in Splitter::new(line, b',') {
                    let len = vlq::decode_segment(segment, &mut buf)?;

                    generated_column += buf[0];
                    if !(0..=u32::MAX as i64).contains(&generated_column) {
                        return Err(Error::MappingMalformed);
                    }

                    let out_line = generated_line
                        .checked_add(self.line_offset)
                        .ok_or(Error::OffsetOutOfRange)?;
                    let column_offset = if generated_line == 0 {
                        self.column_offset
                    } else {
                        0
                    };
                    let out_column = (generated_column as u32)
                        .checked_add(column_offset)
                        .ok_or(Error::OffsetOutOfRange)?;
                    let mut mapping = Mapping::new(out_line, out_column);

                    if len >= 4 {
                        source += buf[1];
                        original_line += buf[2];
                        original_column += buf[3];
                        if source < 0
                            || !(0..=u32::MAX as i64).contains(&original_line)
                            || !(0..=u32::MAX as i64).contains(&original_column)
                        {
                            return Err(Error::MappingMalformed);
                        }

                        let host_source = *self
                            .source_ids
                            .get(source as usize)
                            .ok_or(Error::SourceOutOfRange(source as u32))?;
                        let mut site = OriginalSite::new(
                            host_source,
                            Position::new(original_line as u32, original_column as u32),
                        );

                        if len == 5 {
                            name += buf[4];
                            if name < 0 {
                                return Err(Error::MappingMalformed);
                            }
                            let host_name = *self
                                .name_ids
                                .get(name as usize)
                                .ok_or(Error::NameOutOfRange(name as u32))?;
                            site = site.with_name(host_name);
                        }

                        mapping = mapping.with_original(site);
                    }

                    push(mapping);
                }
            }

            generated_line += 1;
            generated_column = 0;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Mappings, MappingsDecoder};
    use crate::mapping::{Mapping, Position};
    use crate::Error;

    fn encode_to_string(mappings: &Mappings) -> String {
        let mut out = Vec::new();
        mappings.encode(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_encode_sparse_lines() {
        let mut mappings = Mappings::default();
        mappings.add(Mapping::new(12, 7).with_source_and_name(0, 0, 5, 0));
        mappings.add(Mapping::new(25, 12));
        mappings.add(Mapping::new(15, 9).with_source_and_name(1, 0, 5, 0));

        insta::assert_snapshot!(
            encode_to_string(&mappings),
            @";;;;;;;;;;;;OAAKA;;;SCAAA;;;;;;;;;;Y"
        );
    }

    #[test]
    fn test_decode_remap() {
        let decoder = MappingsDecoder::new(";;;;;;;;;;;;OAAKA;;;SCAAA;;;;;;;;;;Y").remap(&[0, 1], &[0]);
        let batch = decoder.decode().unwrap();

        assert_eq!(
            batch,
            [
                Mapping::new(12, 7).with_source_and_name(0, 0, 5, 0),
                Mapping::new(15, 9).with_source_and_name(1, 0, 5, 0),
                Mapping::new(25, 12),
            ]
        );
    }

    #[test]
    fn test_decode_rejects_bad_references() {
        assert!(matches!(
            MappingsDecoder::new("AAAA").decode(),
            Err(Error::SourceOutOfRange(0))
        ));
        assert!(matches!(
            MappingsDecoder::new("AAAAA").remap(&[0], &[]).decode(),
            Err(Error::NameOutOfRange(0))
        ));
        // delta walks the generated column negative
        assert!(matches!(
            MappingsDecoder::new("D").decode(),
            Err(Error::MappingMalformed)
        ));
        // delta walks the source id negative
        assert!(matches!(
            MappingsDecoder::new("ADAA").remap(&[0], &[]).decode(),
            Err(Error::MappingMalformed)
        ));
    }

    #[test]
    fn test_stable_out_of_order_insert() {
        let mut mappings = Mappings::default();
        mappings.add(Mapping::new(0, 10).with_source(0, 0, 0));
        mappings.add(Mapping::new(0, 4));
        mappings.add(Mapping::new(0, 10).with_source(0, 9, 9));

        let columns: Vec<u32> = mappings.iter().map(|m| m.generated.column).collect();
        assert_eq!(columns, [4, 10, 10]);

        // the later insert at column 10 wins the tie-break
        let found = mappings.find_closest(Position::new(0, 10)).unwrap();
        assert_eq!(found.original.unwrap().position, Position::new(9, 9));
    }

    #[test]
    fn test_find_descends_lines() {
        let mut mappings = Mappings::default();
        mappings.add(Mapping::new(2, 8));
        mappings.add(Mapping::new(5, 3));

        // exact line, later column
        let found = mappings.find_closest(Position::new(5, 100)).unwrap();
        assert_eq!(found.generated, Position::new(5, 3));
        // gap line falls back to the previous line's last mapping
        let found = mappings.find_closest(Position::new(4, 0)).unwrap();
        assert_eq!(found.generated, Position::new(2, 8));
        // query line exists but only has later columns
        let found = mappings.find_closest(Position::new(5, 1)).unwrap();
        assert_eq!(found.generated, Position::new(2, 8));
        // nothing at or before the query
        assert!(mappings.find_closest(Position::new(1, 50)).is_none());
    }

    #[test]
    fn test_offset_lines_overwrites_landing_range() {
        let mut mappings = Mappings::default();
        mappings.add(Mapping::new(1, 0));
        mappings.add(Mapping::new(3, 0).with_source(0, 0, 0));
        mappings.add(Mapping::new(4, 2));

        mappings.offset_lines(3, -2).unwrap();

        let lines: Vec<u32> = mappings.iter().map(|m| m.generated.line).collect();
        assert_eq!(lines, [1, 2]);
        // line 3 landed on line 1, replacing the plain mapping there
        assert!(mappings
            .find_closest(Position::new(1, 0))
            .unwrap()
            .original
            .is_some());

        assert!(matches!(
            mappings.offset_lines(1, -2),
            Err(Error::OffsetOutOfRange)
        ));
    }

    #[test]
    fn test_offset_columns_matches_rebuilt_line() {
        let mut shifted = Mappings::default();
        shifted.add(Mapping::new(12, 7).with_source_and_name(0, 5, 0, 0));
        shifted.add(Mapping::new(15, 9).with_source_and_name(0, 5, 1, 0));
        shifted.add(Mapping::new(12, 2));
        shifted.add(Mapping::new(12, 15).with_source_and_name(0, 5, 0, 0));
        shifted.add(Mapping::new(12, 43));

        shifted.offset_columns(12, 14, -9).unwrap();

        let mut rebuilt = Mappings::default();
        rebuilt.add(Mapping::new(12, 2));
        rebuilt.add(Mapping::new(12, 6).with_source_and_name(0, 5, 0, 0));
        rebuilt.add(Mapping::new(12, 34));
        rebuilt.add(Mapping::new(15, 9).with_source_and_name(0, 5, 1, 0));

        assert_eq!(encode_to_string(&shifted), encode_to_string(&rebuilt));
    }
}
