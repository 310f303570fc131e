//! End-to-end tests: text in, library linking, geometry out

mod common;

use libldr::export::{
    BufferType, COMPLEMENT_INDEX, COMPLEMENT_SENTINEL, ExportParams, GeometryExporter, StudMode,
};
use libldr::library::UnlinkPolicy;
use libldr::{Color, Link, ModelMultipart};
use nalgebra::Matrix4;

fn identity_params() -> ExportParams {
    ExportParams::new().with_root_transform(Matrix4::identity())
}

#[test]
fn test_square_stud_is_eight_complement_segments() {
    common::init_tracing();
    let mut library = common::brick_library(UnlinkPolicy::ALL);
    let mut mm =
        ModelMultipart::from_reader("1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat\n".as_bytes(), "s.ldr")
            .unwrap();
    let stats = library.link(&mut mm).unwrap();
    assert_eq!(stats.resolved, 1);
    assert!(stats.unresolved.is_empty());

    let params = ExportParams::new().with_stud_mode(StudMode::Square);
    let mut exporter = GeometryExporter::for_multipart(&mm, Some(&library), params);
    assert_eq!(exporter.count(BufferType::Lines), 16);
    assert_eq!(exporter.count(BufferType::Quads), 0);
    assert!(exporter.is_color_ambiguous());
    assert_eq!(exporter.color_index(BufferType::Lines), &[COMPLEMENT_INDEX; 8]);
    assert!(
        exporter
            .get_color_array(BufferType::Lines)
            .iter()
            .all(|&c| c == COMPLEMENT_SENTINEL)
    );

    let blue = Color::new(1).entity().complement_f32();
    let colored = exporter.get_precolored_array(BufferType::Lines, Color::new(1));
    assert_eq!(colored.len(), 16 * 4);
    for rgba in colored.chunks_exact(4) {
        assert_eq!(rgba, &blue);
    }
}

#[test]
fn test_case_variants_share_one_cache_entry() {
    let mut library = common::brick_library(UnlinkPolicy::ALL);
    let text = "1 4 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat\n1 4 20 0 0 1 0 0 0 1 0 0 0 1 STUD.DAT\n";
    let mut mm = ModelMultipart::from_reader(text.as_bytes(), "pair.ldr").unwrap();
    library.link(&mut mm).unwrap();

    let links: Vec<Link> = mm.main().references().map(|r| r.link).collect();
    assert!(matches!(links[0], Link::Library(_)));
    assert_eq!(links[0], links[1]);
    assert_eq!(library.refcount("Stud.Dat"), Some(2));
    assert_eq!(library.entry_count(), 1);
}

#[test]
fn test_brick_links_nested_primitives() {
    let mut library = common::brick_library(UnlinkPolicy::ALL);
    let mut mm =
        ModelMultipart::from_reader("1 4 0 -24 0 1 0 0 0 1 0 0 0 1 3001.dat\n".as_bytes(), "b.ldr")
            .unwrap();
    let stats = library.link(&mut mm).unwrap();
    assert_eq!(stats.resolved, 3);
    assert_eq!(library.refcount("3001.dat"), Some(1));
    assert_eq!(library.refcount("stud.dat"), Some(2));

    let exporter = GeometryExporter::for_multipart(&mm, Some(&library), identity_params());
    // brick top plus two stud tops
    assert_eq!(exporter.count(BufferType::Quads), 12);
    let red = Color::new(4).entity();
    for rgba in exporter.get_color_array(BufferType::Quads).chunks_exact(4) {
        assert_eq!(rgba, &red.rgba_f32());
    }
    assert!(
        exporter
            .color_index(BufferType::Quads)
            .iter()
            .all(|&i| i == red.packed_rgba())
    );
    let bbox = exporter.bounding_box();
    assert_eq!(bbox.min.y, -24.0);
    assert_eq!(bbox.max.x, 40.0);
}

#[test]
fn test_stud_mode_switch_requires_update() {
    let mut library = common::brick_library(UnlinkPolicy::ALL);
    let mut mm =
        ModelMultipart::from_reader("1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n".as_bytes(), "b.ldr")
            .unwrap();
    library.link(&mut mm).unwrap();

    let mut exporter = GeometryExporter::for_multipart(&mm, Some(&library), identity_params());
    assert_eq!(exporter.count(BufferType::Lines), 0);

    let line_mode = identity_params().with_stud_mode(StudMode::Line);
    assert!(exporter.is_update_required(&line_mode));
    exporter.update_with(line_mode.clone());
    assert!(!exporter.is_update_required(&line_mode));
    // two studs, two segments each
    assert_eq!(exporter.count(BufferType::Lines), 8);
    assert_eq!(exporter.count(BufferType::Quads), 4);
}

#[test]
fn test_unlink_evicts_whole_tree() {
    let mut library = common::brick_library(UnlinkPolicy::ALL);
    let mut mm =
        ModelMultipart::from_reader("1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n".as_bytes(), "b.ldr")
            .unwrap();
    library.link(&mut mm).unwrap();
    assert_eq!(library.entry_count(), 2);

    assert_eq!(library.unlink(&mut mm), 1);
    assert_eq!(library.entry_count(), 0);
    assert!(library.find("stud.dat").is_none());
    assert!(mm.main().references().all(|r| r.link == Link::Unresolved));
}

#[test]
fn test_multipart_submodels_link_locally() {
    let text = "\
0 FILE car.ldr
1 16 0 0 0 1 0 0 0 1 0 0 0 1 wheel.ldr
1 16 0 0 40 1 0 0 0 1 0 0 0 1 Wheel.ldr

0 FILE wheel.ldr
1 0 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat
";
    let mut library = common::brick_library(UnlinkPolicy::ALL);
    let mut mm = ModelMultipart::from_reader(text.as_bytes(), "car.ldr").unwrap();
    let stats = library.link(&mut mm).unwrap();
    // submodel links are local; only the stud goes through the library
    assert_eq!(stats.resolved, 1);
    assert!(mm.main().references().all(|r| r.link == Link::Submodel(1)));
    // the submodel is shared, so the stud is only acquired once
    assert_eq!(library.refcount("stud.dat"), Some(1));

    let exporter = GeometryExporter::for_multipart(&mm, Some(&library), identity_params());
    assert_eq!(exporter.count(BufferType::Quads), 8);
    // black comes from the submodel's own reference
    let black = Color::new(0).entity().rgba_f32();
    assert_eq!(&exporter.get_color_array(BufferType::Quads)[0..4], &black);
}

#[test]
fn test_text_round_trip_through_writer() {
    let text = "0 Brick 2 x 4\n0 Name: 3001.dat\n0 BFC CERTIFY CCW\n4 16 -40 0 -20 40 0 -20 40 0 20 -40 0 20\n0 STEP\n";
    let mm = ModelMultipart::from_reader(text.as_bytes(), "3001.dat").unwrap();
    let mut out = Vec::new();
    mm.to_writer(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), text);
}
