/// Round-trip properties across both STL encodings
use std::io::{BufReader, Cursor};

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use stlview_core::stl::{decode, encode, sniff};
use stlview_core::{load, save, Mesh, StlFormat, Triangle};

fn component() -> impl Strategy<Value = f32> {
    prop_oneof![
        -1.0e3f32..1.0e3,
        -1.0f32..1.0,
        any::<f32>().prop_filter("finite", |v| v.is_finite()),
    ]
}

fn triangle() -> impl Strategy<Value = Triangle> {
    proptest::array::uniform12(component()).prop_map(|c| {
        Triangle::new(
            Vector3::new(c[0], c[1], c[2]),
            Point3::new(c[3], c[4], c[5]),
            Point3::new(c[6], c[7], c[8]),
            Point3::new(c[9], c[10], c[11]),
        )
    })
}

fn mesh() -> impl Strategy<Value = Mesh> {
    ("[a-z][a-z0-9_]{0,12}", prop::collection::vec(triangle(), 1..40)).prop_map(
        |(name, triangles)| {
            let mut mesh = Mesh::named(&name);
            mesh.triangles = triangles;
            mesh
        },
    )
}

fn reencode(mesh: &Mesh, format: StlFormat) -> Mesh {
    let mut bytes = Vec::new();
    encode(mesh, &mut bytes, format).unwrap();
    decode(Cursor::new(bytes)).unwrap()
}

proptest! {
    #[test]
    fn test_both_formats_reproduce_every_component(mesh in mesh()) {
        let from_ascii = reencode(&mesh, StlFormat::Ascii);
        let from_binary = reencode(&mesh, StlFormat::Binary);

        prop_assert_eq!(&from_ascii.triangles, &mesh.triangles);
        prop_assert_eq!(&from_binary.triangles, &mesh.triangles);
        prop_assert_eq!(from_ascii.name, mesh.name);
    }
}

#[test]
fn test_ascii_then_binary_file_chain() {
    let dir = tempfile::tempdir().unwrap();
    let ascii_path = dir.path().join("terrain_ascii.stl");
    let binary_path = dir.path().join("terrain_binary.stl");
    let original = stlview_core::generate::oriented_terrain(30, 20);

    save(&original, &ascii_path, StlFormat::Ascii).unwrap();
    let via_ascii = load(&ascii_path).unwrap();
    save(&via_ascii, &binary_path, StlFormat::Binary).unwrap();
    let via_binary = load(&binary_path).unwrap();

    assert_eq!(via_ascii.name, "oriented_terrain");
    assert_eq!(via_binary.triangle_count(), original.triangle_count());
    for (a, b) in original.triangles.iter().zip(&via_binary.triangles) {
        assert!((a.normal - b.normal).amax() <= 1e-6);
        for (p, q) in a.vertices.iter().zip(&b.vertices) {
            assert!((p - q).amax() <= 1e-6);
        }
    }
}

#[test]
fn test_binary_header_starting_with_solid_is_not_text() {
    // Binary files may legitimately start with "solid" in their header
    let mut bytes = Vec::new();
    encode(&Mesh::cube(1.0), &mut bytes, StlFormat::Binary).unwrap();
    bytes[..16].copy_from_slice(b"solid exported \n");

    let mut reader = BufReader::new(Cursor::new(&bytes[..]));
    assert_eq!(sniff(&mut reader, bytes.len() as u64).unwrap(), StlFormat::Binary);

    let mesh = decode(Cursor::new(bytes)).unwrap();
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.name, stlview_core::DEFAULT_SOLID_NAME);
}

#[test]
fn test_ascii_source_decodes_as_text() {
    let mut bytes = Vec::new();
    encode(&Mesh::cube(2.0), &mut bytes, StlFormat::Ascii).unwrap();

    let mut reader = BufReader::new(Cursor::new(&bytes[..]));
    assert_eq!(sniff(&mut reader, bytes.len() as u64).unwrap(), StlFormat::Ascii);

    let mesh = decode(Cursor::new(bytes)).unwrap();
    assert_eq!(mesh.name, "cube");
    assert_eq!(mesh.triangles, Mesh::cube(2.0).triangles);
}
