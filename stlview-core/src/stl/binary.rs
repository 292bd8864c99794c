/// Binary STL decoding and encoding
use std::io::{Read, Write};

use nalgebra::{Point3, Vector3};
use tracing::debug;

use super::error::{StlError, StlResult};
use super::{binary_file_size, COUNT_SIZE, HEADER_SIZE, RECORD_SIZE};
use crate::geometry::{Mesh, Triangle};

/// Parse the header-plus-count block and validate it against the file size.
///
/// Returns the triangle count.
pub(crate) fn check_header(header: &[u8; HEADER_SIZE + COUNT_SIZE], len: u64) -> StlResult<u32> {
    let count = u32::from_le_bytes([
        header[HEADER_SIZE],
        header[HEADER_SIZE + 1],
        header[HEADER_SIZE + 2],
        header[HEADER_SIZE + 3],
    ]);

    if count == 0 {
        return Err(StlError::decode("no triangle data"));
    }

    // Strict equality catches both truncation and trailing bytes
    let expected = binary_file_size(count);
    if len != expected {
        return Err(StlError::decode(format!(
            "invalid file size: {count} triangles require {expected} bytes, found {len}"
        )));
    }

    Ok(count)
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn read_point(buf: &[u8], offset: usize) -> Point3<f32> {
    Point3::new(
        read_f32(buf, offset),
        read_f32(buf, offset + 4),
        read_f32(buf, offset + 8),
    )
}

/// Decode one 50-byte record: normal, three vertices, attribute (discarded)
pub(crate) fn decode_record(record: &[u8; RECORD_SIZE]) -> Triangle {
    let normal = Vector3::new(read_f32(record, 0), read_f32(record, 4), read_f32(record, 8));
    Triangle::new(
        normal,
        read_point(record, 12),
        read_point(record, 24),
        read_point(record, 36),
    )
}

/// Encode one triangle as a 50-byte record with a zero attribute
pub(crate) fn encode_record(triangle: &Triangle) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    let components = triangle
        .normal
        .iter()
        .chain(triangle.vertices.iter().flat_map(|v| v.coords.iter()));
    for (chunk, value) in record.chunks_exact_mut(4).zip(components) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    record
}

/// Header and count block for `count` triangles
pub(crate) fn encode_header(count: u32) -> [u8; HEADER_SIZE + COUNT_SIZE] {
    let mut header = [0u8; HEADER_SIZE + COUNT_SIZE];
    header[HEADER_SIZE..].copy_from_slice(&count.to_le_bytes());
    header
}

/// Triangle count of a mesh as stored in the binary count field
pub(crate) fn stored_count(mesh: &Mesh) -> StlResult<u32> {
    u32::try_from(mesh.triangle_count())
        .map_err(|_| StlError::encode("mesh has more triangles than binary STL can store"))
}

fn truncated(index: u32, err: std::io::Error) -> StlError {
    StlError::decode_with(format!("truncated data at triangle {index}"), err)
}

/// Decode a binary STL positioned at its first byte, `len` bytes long
pub fn decode<R: Read>(mut reader: R, len: u64) -> StlResult<Mesh> {
    let mut header = [0u8; HEADER_SIZE + COUNT_SIZE];
    reader.read_exact(&mut header).map_err(|e| {
        StlError::decode_with(format!("file too small to be a valid STL ({len} bytes)"), e)
    })?;
    let count = check_header(&header, len)?;
    debug!(count, "decoding binary STL");

    let mut mesh = Mesh::with_capacity(count as usize);
    let mut record = [0u8; RECORD_SIZE];
    for index in 0..count {
        reader
            .read_exact(&mut record)
            .map_err(|e| truncated(index, e))?;
        mesh.add_triangle(decode_record(&record));
    }

    Ok(mesh)
}

/// Encode a mesh as binary STL
pub fn encode<W: Write>(mesh: &Mesh, mut writer: W) -> StlResult<()> {
    let count = stored_count(mesh)?;
    let write_err = |e: std::io::Error| StlError::encode_with("failed to write binary STL", e);

    writer.write_all(&encode_header(count)).map_err(write_err)?;
    for triangle in &mesh.triangles {
        writer
            .write_all(&encode_record(triangle))
            .map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_with_count(count: u32, records: usize) -> Vec<u8> {
        let mut data = encode_header(count).to_vec();
        data.resize(data.len() + records * RECORD_SIZE, 0);
        data
    }

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        // Set triangle count to 0
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let result = decode(&data[..], data.len() as u64);
        let err = result.unwrap_err();
        assert!(matches!(err, StlError::Decode { .. }));
        assert!(err.to_string().contains("no triangle data"));
    }

    #[test]
    fn test_size_mismatch_truncated() {
        let data = binary_with_count(2, 1);
        let err = decode(&data[..], data.len() as u64).unwrap_err();
        assert!(err.to_string().contains("invalid file size"));
    }

    #[test]
    fn test_size_mismatch_trailing_bytes() {
        let mut data = binary_with_count(1, 1);
        data.extend_from_slice(b"extra");
        let err = decode(&data[..], data.len() as u64).unwrap_err();
        assert!(err.to_string().contains("invalid file size"));
    }

    #[test]
    fn test_too_small() {
        let data = [0u8; 40];
        let err = decode(&data[..], data.len() as u64).unwrap_err();
        assert!(matches!(err, StlError::Decode { cause: Some(_), .. }));
    }

    #[test]
    fn test_record_layout() {
        let triangle = Triangle::new(
            Vector3::new(1.0, 2.0, 3.0),
            Point3::new(4.0, 5.0, 6.0),
            Point3::new(7.0, 8.0, 9.0),
            Point3::new(10.0, 11.0, 12.0),
        );
        let record = encode_record(&triangle);

        assert_eq!(&record[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&record[12..16], &4.0f32.to_le_bytes());
        assert_eq!(&record[44..48], &12.0f32.to_le_bytes());
        assert_eq!(&record[48..50], &[0, 0]);
        assert_eq!(decode_record(&record), triangle);
    }

    #[test]
    fn test_attribute_bytes_ignored() {
        let mut data = binary_with_count(1, 1);
        let last = data.len() - 1;
        data[last] = 0xAB;
        data[last - 1] = 0xCD;
        let mesh = decode(&data[..], data.len() as u64).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_encode_layout() {
        let mesh = Mesh::cube(1.0);
        let mut bytes = Vec::new();
        encode(&mesh, &mut bytes).unwrap();

        assert_eq!(bytes.len() as u64, binary_file_size(12));
        assert!(bytes[..HEADER_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&bytes[80..84], &12u32.to_le_bytes());
    }
}
