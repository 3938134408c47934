use super::SourceMap;
use crate::{Error, Result};
use simd_json_derive::{Deserialize, Serialize};
use std::io;
use std::io::Write;

#[derive(Debug, simd_json_derive::Deserialize)]
#[simd_json(rename_all = "camelCase")]
struct RawEnvelope<'a> {
    version: Option<u32>,
    sources: Option<Vec<Option<&'a str>>>,
    sources_content: Option<Vec<Option<&'a str>>>,
    names: Option<Vec<&'a str>>,
    mappings: Option<&'a str>,
}

impl SourceMap {
    /// Parses a Source Map v3 JSON envelope.
    ///
    /// The slice is mutable to allow in-place unescaping during parsing.
    /// A freshly parsed, unmodified map keeps its `mappings` string in the
    /// raw cache, so parse-then-emit never pays for a re-encode.
    #[inline]
    pub fn from_json_slice(json: &mut [u8]) -> Result<Self> {
        Self::from_envelope(RawEnvelope::from_slice(json)?)
    }

    /// Parses a Source Map v3 JSON envelope from a string.
    #[inline]
    pub fn from_json(json: &mut str) -> Result<Self> {
        Self::from_envelope(unsafe { RawEnvelope::from_str(json)? })
    }

    fn from_envelope(raw: RawEnvelope<'_>) -> Result<Self> {
        if !matches!(raw.version, Some(3)) {
            return Err(Error::UnsupportedFormat);
        }

        let sources: Vec<&str> = raw
            .sources
            .unwrap_or_default()
            .into_iter()
            .map(|source| source.unwrap_or(""))
            .collect();

        let sources_content: Vec<&str> = match raw.sources_content {
            Some(content) => {
                if content.len() != sources.len() {
                    return Err(Error::MismatchSourcesContent {
                        sources_len: sources.len() as u32,
                        sources_content_len: content.len() as u32,
                    });
                }
                content
                    .into_iter()
                    .map(|content| content.unwrap_or(""))
                    .collect()
            }
            None => Vec::new(),
        };

        let names: Vec<&str> = raw.names.unwrap_or_default();

        let mut map = Self::new();
        map.add_vlq_mappings(
            raw.mappings.unwrap_or_default(),
            &sources,
            &sources_content,
            &names,
            0,
            0,
        )?;
        Ok(map)
    }
}

impl SourceMap {
    /// Writes the map as a Source Map v3 JSON envelope.
    pub fn write_json<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        writer.write_all(br#"{"version":3,"sources":"#)?;
        self.sources.to_vec().json_write(writer)?;

        writer.write_all(br#","sourcesContent":"#)?;
        self.sources_content()
            .map(str::to_owned)
            .collect::<Vec<_>>()
            .json_write(writer)?;

        if !self.names.is_empty() {
            writer.write_all(br#","names":"#)?;
            self.names.to_vec().json_write(writer)?;
        }

        writer.write_all(br#","mappings":""#)?;
        self.write_vlq(writer)?;
        writer.write_all(br#""}"#)
    }

    #[inline]
    pub fn to_json_vec(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(1024);
        self.write_json(&mut out)?;
        Ok(out)
    }

    #[inline]
    pub fn to_json_string(&self) -> io::Result<String> {
        // SAFETY: the writer only emits valid JSON text
        self.to_json_vec()
            .map(|out| unsafe { String::from_utf8_unchecked(out) })
    }
}
