use crate::mapping::{OriginalSite, Position};
use crate::mappings::Mappings;
use crate::{Error, Result};

// Snapshot layout, all integers little-endian:
//
//   magic "KMAP" | u16 version | u16 reserved
//   u32 sources | u32 names | u32 lines | u32 mappings
//   sources:  (u32 len, bytes) * sources
//   contents: (u32 len, bytes) * sources
//   names:    (u32 len, bytes) * names
//   lines:    (u32 line, u32 count, record * count) * lines
//   record:   u32 column | u32 source | u32 original_line
//           | u32 original_column | u32 name
//
// Absent source/name fields are ABSENT (u32::MAX). A mapping without a
// source stores ABSENT in all four original fields.
const MAGIC: &[u8; 4] = b"KMAP";
const VERSION: u16 = 1;
const ABSENT: u32 = u32::MAX;

/// The decoded content of a snapshot blob, ready to be merged into (or to
/// become) an engine.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: Mappings,
}

pub(crate) fn write_buffer(
    sources: impl ExactSizeIterator<Item = impl AsRef<str>>,
    sources_content: &[String],
    names: impl ExactSizeIterator<Item = impl AsRef<str>>,
    mappings: &Mappings,
    out: &mut Vec<u8>,
) {
    let sources_len = sources.len();
    let lines = mappings.lines();
    let line_count = lines.values().filter(|line| !line.is_empty()).count();

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(sources_len as u32).to_le_bytes());
    out.extend_from_slice(&(names.len() as u32).to_le_bytes());
    out.extend_from_slice(&(line_count as u32).to_le_bytes());
    out.extend_from_slice(&(mappings.len() as u32).to_le_bytes());

    for source in sources {
        write_str(source.as_ref(), out);
    }
    // contents are resized lazily on the engine, missing tail entries are
    // empty strings
    for idx in 0..sources_len {
        write_str(
            sources_content.get(idx).map(String::as_str).unwrap_or(""),
            out,
        );
    }
    for name in names {
        write_str(name.as_ref(), out);
    }

    for (&line, bucket) in lines {
        if bucket.is_empty() {
            continue;
        }
        out.extend_from_slice(&line.to_le_bytes());
        out.extend_from_slice(&(bucket.entries.len() as u32).to_le_bytes());
        for &(column, original) in &bucket.entries {
            out.extend_from_slice(&column.to_le_bytes());
            match original {
                Some(site) => {
                    out.extend_from_slice(&site.source.to_le_bytes());
                    out.extend_from_slice(&site.position.line.to_le_bytes());
                    out.extend_from_slice(&site.position.column.to_le_bytes());
                    out.extend_from_slice(&site.name.unwrap_or(ABSENT).to_le_bytes());
                }
                None => {
                    for _ in 0..4 {
                        out.extend_from_slice(&ABSENT.to_le_bytes());
                    }
                }
            }
        }
    }
}

pub(crate) fn read_buffer(buf: &[u8]) -> Result<Snapshot> {
    let mut reader = Reader::new(buf);

    if reader.take(4)? != MAGIC {
        return Err(Error::IncompatibleSnapshot("bad magic"));
    }
    if reader.read_u16()? != VERSION {
        return Err(Error::IncompatibleSnapshot("unknown schema version"));
    }
    reader.read_u16()?;

    let sources_len = reader.read_u32()?;
    let names_len = reader.read_u32()?;
    let line_count = reader.read_u32()?;
    let mapping_count = reader.read_u32()?;

    let mut snapshot = Snapshot::default();
    snapshot.sources.reserve(sources_len as usize);
    for _ in 0..sources_len {
        snapshot.sources.push(reader.read_str()?.to_owned());
    }
    snapshot.sources_content.reserve(sources_len as usize);
    for _ in 0..sources_len {
        snapshot.sources_content.push(reader.read_str()?.to_owned());
    }
    snapshot.names.reserve(names_len as usize);
    for _ in 0..names_len {
        snapshot.names.push(reader.read_str()?.to_owned());
    }

    let mut read_mappings = 0u64;
    let mut last_line: Option<u32> = None;
    for _ in 0..line_count {
        let line = reader.read_u32()?;
        // line keys are strictly increasing in a well-formed snapshot
        if last_line.is_some_and(|last| line <= last) {
            return Err(Error::IncompatibleSnapshot("unordered lines"));
        }
        last_line = Some(line);

        let count = reader.read_u32()?;
        let bucket = snapshot.mappings.lines_mut().entry(line).or_default();
        bucket.entries.reserve(count as usize);
        for _ in 0..count {
            let column = reader.read_u32()?;
            let source = reader.read_u32()?;
            let original_line = reader.read_u32()?;
            let original_column = reader.read_u32()?;
            let name = reader.read_u32()?;

            let original = if source == ABSENT {
                None
            } else {
                if source >= sources_len {
                    return Err(Error::SourceOutOfRange(source));
                }
                if name != ABSENT && name >= names_len {
                    return Err(Error::NameOutOfRange(name));
                }
                Some(OriginalSite {
                    source,
                    position: Position::new(original_line, original_column),
                    name: (name != ABSENT).then_some(name),
                })
            };
            bucket.add(column, original);
        }
        read_mappings += count as u64;
    }

    if read_mappings != mapping_count as u64 {
        return Err(Error::IncompatibleSnapshot("mapping count mismatch"));
    }

    Ok(snapshot)
}

fn write_str(value: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(Error::truncated_snapshot());
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::IncompatibleSnapshot("invalid utf-8"))
    }
}
