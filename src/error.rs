pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a mapping is malformed")]
    MappingMalformed,
    #[error("incompatible snapshot: {0}")]
    IncompatibleSnapshot(&'static str),
    #[error("source #{0} is out of range")]
    SourceOutOfRange(u32),
    #[error("name #{0} is out of range")]
    NameOutOfRange(u32),
    #[error("offset would move mappings to a negative position")]
    OffsetOutOfRange,

    #[cfg(feature = "json")]
    #[error("unsupported source map format")]
    UnsupportedFormat,
    #[cfg(feature = "json")]
    #[error("source map syntax error: {0}")]
    SyntaxError(#[from] simd_json_derive::de::Error),
    #[cfg(feature = "json")]
    #[error(
        "source map has {sources_len} sources but {sources_content_len} sourcesContent entries"
    )]
    MismatchSourcesContent {
        sources_len: u32,
        sources_content_len: u32,
    },
}

impl Error {
    #[inline]
    pub(crate) const fn truncated_snapshot() -> Self {
        Self::IncompatibleSnapshot("buffer is truncated")
    }
}
