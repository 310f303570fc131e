//! Winding and normal consistency of exported geometry

use libldr::export::{BufferType, ExportParams, GeometryExporter};
use libldr::parser::load_from_str;
use nalgebra::{Matrix4, Vector3};

const IDENTITY: &str = "1 0 0 0 1 0 0 0 1";
const MIRROR_X: &str = "-1 0 0 0 1 0 0 0 1";
const MIRROR_Z_ROTATED: &str = "0 0 1 0 1 0 1 0 0";

fn identity_params() -> ExportParams {
    ExportParams::new().with_root_transform(Matrix4::identity())
}

/// Chain of submodels, one reference per level, ending in `tail`
fn chain(matrices: &[&str], tail: &str) -> String {
    let mut text = String::new();
    for (i, m) in matrices.iter().enumerate() {
        text.push_str(&format!("0 FILE m{}.ldr\n1 16 0 0 0 {} m{}.ldr\n", i, m, i + 1));
    }
    text.push_str(&format!("0 FILE m{}.ldr\n{}", matrices.len(), tail));
    text
}

fn export_triangles(text: &str, params: ExportParams) -> (Vec<f32>, Vec<f32>) {
    let mm = load_from_str(text, "m0.ldr").unwrap();
    let exporter = GeometryExporter::for_multipart(&mm, None, params);
    (
        exporter.vertex_array(BufferType::Triangles).to_vec(),
        exporter.normal_array(BufferType::Triangles).unwrap().to_vec(),
    )
}

/// Face normal implied by the emitted vertex order
fn orientation(v: &[f32]) -> Vector3<f32> {
    let p = |i: usize| Vector3::new(v[i * 3], v[i * 3 + 1], v[i * 3 + 2]);
    (p(1) - p(0)).cross(&(p(2) - p(0)))
}

const CCW_TRIANGLE: &str = "0 BFC CERTIFY CCW\n3 4 0 0 0 1 0 0 0 1 0\n";

#[test]
fn test_even_mirrors_keep_vertex_order() {
    let (base, _) = export_triangles(&chain(&[], CCW_TRIANGLE), identity_params());
    assert_eq!(base, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

    for depth in [2, 4] {
        let matrices = vec![MIRROR_X; depth];
        let (v, _) = export_triangles(&chain(&matrices, CCW_TRIANGLE), identity_params());
        assert_eq!(v, base, "depth {}", depth);
    }
}

#[test]
fn test_odd_mirrors_flip_vertex_order() {
    for depth in [1, 3] {
        let matrices = vec![MIRROR_X; depth];
        let (v, _) = export_triangles(&chain(&matrices, CCW_TRIANGLE), identity_params());
        // mirrored positions, emitted in reverse
        assert_eq!(v, vec![0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0], "depth {}", depth);
    }
}

#[test]
fn test_identity_levels_do_not_count() {
    let (base, _) = export_triangles(&chain(&[], CCW_TRIANGLE), identity_params());
    let (v, _) = export_triangles(
        &chain(&[IDENTITY, MIRROR_X, IDENTITY, MIRROR_X], CCW_TRIANGLE),
        identity_params(),
    );
    assert_eq!(v, base);
}

#[test]
fn test_front_face_and_normal_agree_through_any_chain() {
    let cases: [&[&str]; 5] = [
        &[],
        &[MIRROR_X],
        &[MIRROR_Z_ROTATED],
        &[MIRROR_X, MIRROR_Z_ROTATED],
        &[MIRROR_Z_ROTATED, IDENTITY, MIRROR_X, MIRROR_X],
    ];
    for matrices in cases {
        let (v, n) = export_triangles(&chain(matrices, CCW_TRIANGLE), identity_params());
        let face = orientation(&v).normalize();
        let normal = Vector3::new(n[0], n[1], n[2]);
        assert!((face - normal).norm() < 1e-5, "{:?}: {} vs {}", matrices, face, normal);
        // every vertex carries the primitive normal
        assert_eq!(&n[0..3], &n[6..9]);
    }
}

#[test]
fn test_default_root_transform_counts_as_mirror() {
    let (v, n) = export_triangles(&chain(&[], CCW_TRIANGLE), ExportParams::new());
    assert_eq!(v, vec![0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(&n[0..3], &[0.0, 0.0, 1.0]);
}

#[test]
fn test_invertnext_cancels_a_mirror() {
    let text = format!(
        "0 FILE m0.ldr\n0 BFC INVERTNEXT\n1 16 0 0 0 {} m1.ldr\n0 FILE m1.ldr\n{}",
        MIRROR_X, CCW_TRIANGLE
    );
    let (v, _) = export_triangles(&text, identity_params());
    assert_eq!(v, vec![0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_cw_part_under_mirror_is_kept() {
    let cw = "0 BFC CERTIFY CW\n3 4 0 0 0 1 0 0 0 1 0\n";
    let (v, _) = export_triangles(&chain(&[MIRROR_X], cw), identity_params());
    assert_eq!(v, vec![0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_winding_switch_inside_a_model() {
    let text = "0 BFC CERTIFY CCW\n3 4 0 0 0 1 0 0 0 1 0\n0 BFC CW\n3 4 0 0 0 1 0 0 0 1 0\n";
    let (v, _) = export_triangles(text, identity_params());
    assert_eq!(&v[0..9], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(&v[9..18], &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_quads_follow_the_same_rules() {
    let quad = "0 BFC CERTIFY CCW\n4 4 0 0 0 1 0 0 1 1 0 0 1 0\n";
    let mm = load_from_str(&chain(&[MIRROR_X], quad), "m0.ldr").unwrap();
    let exporter = GeometryExporter::for_multipart(&mm, None, identity_params());
    assert_eq!(
        exporter.vertex_array(BufferType::Quads),
        &[0.0, 1.0, 0.0, -1.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    );
    let n = exporter.normal_array(BufferType::Quads).unwrap();
    assert_eq!(&n[0..3], &[0.0, 0.0, 1.0]);
}
