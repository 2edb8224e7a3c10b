//! End-to-end merge scenarios through the public engine API.

use compound_schema_core::{
    Cardinality, DescriptorArena, DescriptorSet, EnumType, Family, MergedKind, PropertyType,
    RecordDescriptor, ScalarKind, Sort,
};
use compound_schema_engine::{
    build_report, merge_families, GroupingPolicy, MergeConfig, MergeOptions, PropertyRule,
};

/// Three-family merge: SINGLE, forced-optional SINGLE, and missing must
/// come out OPTIONAL; adding a LIST variant must absorb to LIST.
#[test]
fn three_way_cardinality_merge_is_conservative() {
    let mut arena = DescriptorArena::new();
    let single = arena.insert(RecordDescriptor::branch("V1").with_property(
        "foo",
        Cardinality::Single,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    let forced = arena.insert(RecordDescriptor::branch("V2").with_property(
        "foo",
        Cardinality::Single,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    let missing = arena.insert(RecordDescriptor::branch("V3"));

    let mut config = MergeConfig::default();
    config.force_optional.push(PropertyRule {
        record: "V2".to_string(),
        property: "foo".to_string(),
    });
    let options = config.compile().unwrap();

    let families = [
        Family::new("a", [single]),
        Family::new("b", [forced]),
        Family::new("c", [missing]),
    ];
    let outcome = merge_families(&arena, &families, &options).unwrap();
    let root = &outcome.compounds[outcome.roots[0]];
    assert_eq!(root.properties["foo"].cardinality, Cardinality::Optional);

    // A fourth variant declaring LIST dominates every other state.
    let list = arena.insert(RecordDescriptor::branch("V4").with_property(
        "foo",
        Cardinality::List,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    let families = [
        Family::new("a", [single]),
        Family::new("b", [forced]),
        Family::new("c", [missing]),
        Family::new("d", [list]),
    ];
    let outcome = merge_families(&arena, &families, &options).unwrap();
    let root = &outcome.compounds[outcome.roots[0]];
    assert_eq!(root.properties["foo"].cardinality, Cardinality::List);
}

/// Shape-aligned grouping pairs records by name across unordered
/// families, and nested branches merge recursively.
#[test]
fn shape_aligned_families_merge_nested_branches() {
    let mut arena = DescriptorArena::new();
    let address_a = arena.insert(RecordDescriptor::branch("Address").with_property(
        "street",
        Cardinality::Single,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    let person_a = arena.insert(
        RecordDescriptor::branch("Person")
            .with_property(
                "name",
                Cardinality::Single,
                PropertyType::Scalar(ScalarKind::Str),
            )
            .with_property("addr", Cardinality::Single, PropertyType::Branch(address_a)),
    );
    let address_b = arena.insert(RecordDescriptor::branch("ADDRESS").with_property(
        "zip",
        Cardinality::Single,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    let person_b = arena.insert(
        RecordDescriptor::branch("PERSON")
            .with_property(
                "name",
                Cardinality::Single,
                PropertyType::Scalar(ScalarKind::Str),
            )
            .with_property("addr", Cardinality::Single, PropertyType::Branch(address_b)),
    );

    let config = MergeConfig {
        grouping: GroupingPolicy::ShapeAligned,
        ..Default::default()
    };
    let options = config.compile().unwrap();

    // Families list their records in different orders on purpose.
    let families = [
        Family::new("a", [person_a, address_a]),
        Family::new("b", [address_b, person_b]),
    ];
    let outcome = merge_families(&arena, &families, &options).unwrap();

    let person = outcome
        .roots
        .iter()
        .map(|&id| &outcome.compounds[id])
        .find(|compound| compound.name == "Person")
        .expect("person root");
    let MergedKind::Branch(addr_id) = person.properties["addr"].kind else {
        panic!("addr should merge as a branch");
    };
    let addr = &outcome.compounds[addr_id];
    assert_eq!(addr.sort, Sort::Branch);
    // Both variants' nested properties survive the union.
    assert!(addr.properties.contains_key("street"));
    assert!(addr.properties.contains_key("zip"));
    assert_eq!(
        addr.properties["street"].cardinality,
        Cardinality::Optional
    );

    // The nested group and the top-level Address group are the same
    // merged compound, not two copies.
    let address_root = outcome
        .roots
        .iter()
        .copied()
        .find(|&id| outcome.compounds[id].name == "Address")
        .expect("address root");
    assert_eq!(address_root, addr_id);
}

/// Enumerated leaves unify across families; the report hash is stable.
#[test]
fn enum_leaves_unify_and_report_is_deterministic() {
    let mut arena = DescriptorArena::new();
    let a = arena.insert(RecordDescriptor::leaf(
        "ColorA",
        PropertyType::Enum(EnumType::new("ColorA", ["darkRed", "blue"])),
    ));
    let b = arena.insert(RecordDescriptor::leaf(
        "ColorB",
        PropertyType::Enum(EnumType::new("ColorB", ["DARK_RED", "green"])),
    ));
    let families = [Family::new("a", [a]), Family::new("b", [b])];

    let outcome = merge_families(&arena, &families, &MergeOptions::default()).unwrap();
    let root = &outcome.compounds[outcome.roots[0]];
    assert_eq!(root.sort, Sort::Leaf);

    let MergedKind::Enum(unified) = &root.leaf_value().unwrap().kind else {
        panic!("leaf value should be a unified enum");
    };
    let displays: Vec<&str> = unified
        .constants
        .iter()
        .map(|constant| constant.display.as_str())
        .collect();
    assert_eq!(displays, vec!["DARK_RED", "BLUE", "GREEN"]);

    let first = build_report(&outcome, "1.0.0", "t0").unwrap();
    let again = merge_families(&arena, &families, &MergeOptions::default()).unwrap();
    let second = build_report(&again, "1.0.0", "t1").unwrap();
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(first.leaf_count, 1);
}

/// A serialized descriptor set round-trips and merges identically.
#[test]
fn descriptor_sets_round_trip_through_serde() {
    let mut set = DescriptorSet::new("1.0.0", "2026-08-01T00:00:00Z");
    let a = set.arena.insert(RecordDescriptor::branch("Person").with_property(
        "name",
        Cardinality::Single,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    set.families.push(Family::new("a", [a]));

    let json = serde_json::to_string(&set).unwrap();
    let back: DescriptorSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);

    let options = MergeOptions::default();
    let first = merge_families(&set.arena, &set.families, &options).unwrap();
    let second = merge_families(&back.arena, &back.families, &options).unwrap();
    assert_eq!(first, second);
}
