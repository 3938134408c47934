use super::{MappingsRepr, SourceMap};
use crate::mapping::{Mapping, OriginalSite};
use crate::snapshot;
use crate::Result;

/// Translates a donor mapping into host ids and shifts its generated
/// position. The column offset only touches the donor's first line.
fn remap_shift(
    mapping: Mapping,
    source_ids: &[u32],
    name_ids: &[u32],
    line_offset: u32,
    column_offset: u32,
) -> Mapping {
    let column = if mapping.generated.line == 0 {
        mapping.generated.column + column_offset
    } else {
        mapping.generated.column
    };
    let mut out = Mapping::new(mapping.generated.line + line_offset, column);

    if let Some(site) = mapping.original {
        let mut new_site = OriginalSite::new(source_ids[site.source as usize], site.position);
        if let Some(name) = site.name {
            new_site = new_site.with_name(name_ids[name as usize]);
        }
        out = out.with_original(new_site);
    }
    out
}

impl SourceMap {
    /// Appends every mapping of `donor`, shifted by the offsets, interning
    /// the donor's sources, contents and names into this map.
    pub fn append_sourcemap(
        &mut self,
        donor: &mut SourceMap,
        line_offset: u32,
        column_offset: u32,
    ) {
        donor.materialize();

        let source_ids: Vec<u32> = donor
            .sources
            .iter()
            .map(|source| self.sources.intern(source))
            .collect();
        for (donor_id, &host_id) in source_ids.iter().enumerate() {
            if let Some(content) = donor.sources_content.get(donor_id) {
                if !content.is_empty() {
                    self.set_content_by_id(host_id, content);
                }
            }
        }
        let name_ids: Vec<u32> = donor
            .names
            .iter()
            .map(|name| self.names.intern(name))
            .collect();

        let MappingsRepr::Parsed(donor_table) = &donor.repr else {
            unreachable!()
        };
        let table = self.materialize();
        for mapping in donor_table.iter() {
            table.add(remap_shift(
                mapping,
                &source_ids,
                &name_ids,
                line_offset,
                column_offset,
            ));
        }
    }

    /// Appends the mappings of a snapshot blob, shifted by the offsets,
    /// interning the donor's sources, contents and names.
    pub fn add_buffer_mappings(
        &mut self,
        buf: &[u8],
        line_offset: u32,
        column_offset: u32,
    ) -> Result<()> {
        let donor = snapshot::read_buffer(buf)?;

        let source_ids: Vec<u32> = donor
            .sources
            .iter()
            .map(|source| self.sources.intern(source))
            .collect();
        for (donor_id, &host_id) in source_ids.iter().enumerate() {
            let content = &donor.sources_content[donor_id];
            if !content.is_empty() {
                self.set_content_by_id(host_id, content);
            }
        }
        let name_ids: Vec<u32> = donor
            .names
            .iter()
            .map(|name| self.names.intern(name))
            .collect();

        let table = self.materialize();
        for mapping in donor.mappings.iter() {
            table.add(remap_shift(
                mapping,
                &source_ids,
                &name_ids,
                line_offset,
                column_offset,
            ));
        }
        Ok(())
    }

    /// Re-anchors this map's original positions through `donor`, a map of
    /// an earlier transform whose generated text this map's originals
    /// refer to.
    ///
    /// Every mapping with an original side is looked up in `donor` at that
    /// original position; when the donor knows an original for it, the
    /// mapping's source, original position and (if the donor has one) name
    /// are replaced and the donor's source content is carried over.
    /// Generated positions never change, and mappings the donor cannot
    /// improve are left alone.
    pub fn extends(&mut self, donor: &mut SourceMap) {
        donor.materialize();
        self.materialize();

        let MappingsRepr::Parsed(donor_table) = &donor.repr else {
            unreachable!()
        };
        let MappingsRepr::Parsed(table) = &mut self.repr else {
            unreachable!()
        };

        for bucket in table.lines_mut().values_mut() {
            for (_, slot) in &mut bucket.entries {
                let Some(site) = slot else { continue };
                let Some(donor_mapping) = donor_table.find_closest(site.position) else {
                    continue;
                };
                let Some(donor_site) = donor_mapping.original else {
                    continue;
                };
                let Some(source_path) = donor.sources.get(donor_site.source) else {
                    continue;
                };

                let source_id = self.sources.intern(source_path);

                let donor_content = donor
                    .sources_content
                    .get(donor_site.source as usize)
                    .map_or("", String::as_str);
                if !donor_content.is_empty() {
                    let idx = source_id as usize;
                    if self.sources_content.len() <= idx {
                        self.sources_content.resize(idx + 1, String::new());
                    }
                    if self.sources_content[idx].is_empty() {
                        donor_content.clone_into(&mut self.sources_content[idx]);
                    }
                }

                let name = donor_site
                    .name
                    .and_then(|name| donor.names.get(name))
                    .map(|name| self.names.intern(name))
                    .or(site.name);

                *site = OriginalSite {
                    source: source_id,
                    position: donor_site.position,
                    name,
                };
            }
        }
    }

    /// [extends](SourceMap::extends) with the donor given as a snapshot
    /// blob.
    pub fn extends_buffer(&mut self, buf: &[u8]) -> Result<()> {
        let mut donor = SourceMap::from_buffer(buf)?;
        self.extends(&mut donor);
        Ok(())
    }
}
