use std::fmt::{Debug, Formatter};

/// A zero-based line and zero-based column in a file.
///
/// # Note
///
/// Inside the engine every position is 0-based and columns count UTF-16
/// code units, matching the `mappings` encoding. The public lookup and
/// indexed-insert surface of [SourceMap](crate::SourceMap) speaks 1-based
/// lines instead (the convention of the predominant JavaScript tooling);
/// the conversion happens only at that boundary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl From<(u32, u32)> for Position {
    fn from((line, column): (u32, u32)) -> Self {
        Self::new(line, column)
    }
}

/// The original side of a mapping: a position in a referenced source file,
/// optionally tagged with a symbol name.
///
/// `source` and `name` are indexes into the owning map's sources and names
/// tables. A name can only exist together with a source; the type makes the
/// reverse unrepresentable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OriginalSite {
    pub source: u32,
    pub position: Position,
    pub name: Option<u32>,
}

impl OriginalSite {
    pub const fn new(source: u32, position: Position) -> Self {
        Self {
            source,
            position,
            name: None,
        }
    }

    pub const fn with_name(mut self, name: u32) -> Self {
        self.name = Some(name);
        self
    }
}

/// One entry of the `mappings` table: a generated position, optionally
/// related back to an [OriginalSite].
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Mapping {
    pub generated: Position,
    pub original: Option<OriginalSite>,
}

impl Mapping {
    #[inline]
    pub const fn new(generated_line: u32, generated_column: u32) -> Self {
        Self {
            generated: Position::new(generated_line, generated_column),
            original: None,
        }
    }

    #[inline]
    pub const fn with_original(mut self, original: OriginalSite) -> Self {
        self.original = Some(original);
        self
    }

    #[inline]
    pub const fn with_source(self, source: u32, line: u32, column: u32) -> Self {
        self.with_original(OriginalSite::new(source, Position::new(line, column)))
    }

    #[inline]
    pub const fn with_source_and_name(
        self,
        source: u32,
        line: u32,
        column: u32,
        name: u32,
    ) -> Self {
        self.with_original(OriginalSite::new(source, Position::new(line, column)).with_name(name))
    }
}

impl Debug for Mapping {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.generated.line, self.generated.column)?;
        if let Some(original) = &self.original {
            write!(
                f,
                " -> {}:{}:{}",
                original.source, original.position.line, original.position.column,
            )?;
            if let Some(name) = original.name {
                write!(f, " ({name})")?;
            }
        }
        Ok(())
    }
}

/// A mapping in the public 1-based-line form, accepted by
/// [SourceMap::add_indexed_mapping](crate::SourceMap::add_indexed_mapping).
///
/// `generated.line` and `original.line` start at 1. A `name` without a
/// `source`, or an `original` without a `source` (and vice versa), degrade
/// to a generated-only mapping.
#[derive(Debug, Clone, Copy)]
pub struct IndexedMapping<'a> {
    pub generated: Position,
    pub original: Option<Position>,
    pub source: Option<&'a str>,
    pub name: Option<&'a str>,
}

/// A mapping resolved at the public edge: 1-based lines, source and name
/// looked up to strings.
///
/// Returned by
/// [SourceMap::find_closest_mapping](crate::SourceMap::find_closest_mapping);
/// the borrows point into the map's intern tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMapping<'a> {
    pub generated: Position,
    pub original: Option<ResolvedSite<'a>>,
}

/// The original side of a [ResolvedMapping].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSite<'a> {
    pub position: Position,
    pub source: &'a str,
    pub name: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::{Mapping, OriginalSite, Position};

    #[test]
    fn test_mapping_debug() {
        let plain = Mapping::new(3, 14);
        insta::assert_snapshot!(format!("{plain:?}"), @"3:14");

        let sourced = plain.with_source(0, 5, 2);
        insta::assert_snapshot!(format!("{sourced:?}"), @"3:14 -> 0:5:2");

        let named = plain.with_source_and_name(1, 9, 0, 4);
        insta::assert_snapshot!(format!("{named:?}"), @"3:14 -> 1:9:0 (4)");

        assert_eq!(
            named.original,
            Some(OriginalSite::new(1, Position::new(9, 0)).with_name(4))
        );
    }
}
