use kumo::{IndexedMapping, Position, SourceMap};

fn indexed<'a>(
    generated: (u32, u32),
    original: (u32, u32),
    source: &'a str,
    name: Option<&'a str>,
) -> IndexedMapping<'a> {
    IndexedMapping {
        generated: Position::new(generated.0, generated.1),
        original: Some(Position::new(original.0, original.1)),
        source: Some(source),
        name,
    }
}

#[test]
fn test_extends_reanchors_originals() {
    // host: generated (1,0) -> mid.js internal (5,2), i.e. 1-based (6,2)
    let mut host = SourceMap::new();
    host.add_indexed_mapping(indexed((1, 0), (6, 2), "mid.js", None), 0, 0);

    // donor: generated internal (5,2) -> src.coffee internal (9,0)
    let mut donor = SourceMap::new();
    donor.add_indexed_mapping(indexed((6, 2), (10, 0), "src.coffee", None), 0, 0);
    donor.set_source_content("src.coffee", "animate = (garden) ->");

    host.extends(&mut donor);

    let found = host.find_closest_mapping(1, 0).unwrap();
    // the generated side never moves
    assert_eq!(found.generated, Position::new(1, 0));
    let original = found.original.unwrap();
    assert_eq!(original.source, "src.coffee");
    assert_eq!(original.position, Position::new(10, 0));

    // the donor's content came along
    assert_eq!(
        host.get_source_content("src.coffee"),
        Some("animate = (garden) ->")
    );
}

#[test]
fn test_extends_uses_closest_donor_mapping() {
    let mut host = SourceMap::new();
    host.add_indexed_mapping(indexed((1, 0), (3, 9), "mid.js", None), 0, 0);

    // nearest donor mapping at or before internal (2,9) is (2,4)
    let mut donor = SourceMap::new();
    donor.add_indexed_mapping(indexed((3, 4), (8, 1), "src.coffee", None), 0, 0);
    donor.add_indexed_mapping(indexed((3, 12), (9, 5), "other.coffee", None), 0, 0);

    host.extends(&mut donor);

    let original = host.find_closest_mapping(1, 0).unwrap().original.unwrap();
    assert_eq!(original.source, "src.coffee");
    assert_eq!(original.position, Position::new(8, 1));
}

#[test]
fn test_extends_keeps_host_name_when_donor_has_none() {
    let mut host = SourceMap::new();
    host.add_indexed_mapping(indexed((1, 0), (2, 0), "mid.js", Some("animate")), 0, 0);
    host.add_indexed_mapping(indexed((2, 0), (3, 0), "mid.js", Some("plant")), 0, 0);

    let mut donor = SourceMap::new();
    donor.add_indexed_mapping(indexed((2, 0), (7, 3), "src.coffee", None), 0, 0);
    donor.add_indexed_mapping(indexed((3, 0), (8, 0), "src.coffee", Some("plantSeeds")), 0, 0);

    host.extends(&mut donor);

    // donor had no name: the host's survives
    let first = host.find_closest_mapping(1, 0).unwrap().original.unwrap();
    assert_eq!(first.name, Some("animate"));
    assert_eq!(first.position, Position::new(7, 3));

    // donor had a name: it wins
    let second = host.find_closest_mapping(2, 0).unwrap().original.unwrap();
    assert_eq!(second.name, Some("plantSeeds"));
}

#[test]
fn test_extends_leaves_unmatched_mappings_alone() {
    let mut host = SourceMap::new();
    host.add_indexed_mapping(indexed((1, 0), (1, 0), "mid.js", None), 0, 0);
    host.add_indexed_mapping(
        IndexedMapping {
            generated: Position::new(2, 0),
            original: None,
            source: None,
            name: None,
        },
        0,
        0,
    );

    // donor has nothing at or before the host's original (1,0)
    let mut donor = SourceMap::new();
    donor.add_indexed_mapping(indexed((9, 0), (1, 0), "src.coffee", None), 0, 0);

    host.extends(&mut donor);

    let untouched = host.find_closest_mapping(1, 0).unwrap().original.unwrap();
    assert_eq!(untouched.source, "mid.js");
    assert!(host.find_closest_mapping(2, 0).unwrap().original.is_none());
    // nothing was promoted, so the donor's source was never interned
    assert_eq!(host.get_source_index("src.coffee"), None);
}

#[test]
fn test_extends_buffer() {
    let mut host = SourceMap::new();
    host.add_indexed_mapping(indexed((1, 5), (1, 2), "mid.js", None), 0, 0);

    let mut donor = SourceMap::new();
    donor.add_indexed_mapping(indexed((1, 0), (4, 7), "src.coffee", None), 0, 0);
    let blob = donor.to_buffer();

    host.extends_buffer(&blob).unwrap();

    let original = host.find_closest_mapping(1, 5).unwrap().original.unwrap();
    assert_eq!(original.source, "src.coffee");
    assert_eq!(original.position, Position::new(4, 7));
}
