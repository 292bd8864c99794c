/// ASCII STL decoding and encoding
use std::io::{BufRead, Write};

use nalgebra::{Point3, Vector3};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::space1,
    combinator::{eof, map, rest},
    sequence::{pair, preceded, terminated},
    IResult,
};
use tracing::{debug, warn};

use super::error::{StlError, StlResult};
use crate::geometry::{Mesh, Triangle, DEFAULT_SOLID_NAME};

/// A trimmed input line, classified by its leading keyword
#[derive(Debug, PartialEq)]
enum Line<'a> {
    Solid(&'a str),
    FacetNormal(&'a str),
    Vertex(&'a str),
    Other,
}

/// Keyword followed by whitespace or the end of the line
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), alt((space1, eof)))
}

fn solid(input: &str) -> IResult<&str, Line<'_>> {
    map(preceded(keyword("solid"), rest), Line::Solid)(input)
}

fn facet_normal(input: &str) -> IResult<&str, Line<'_>> {
    map(
        preceded(pair(terminated(tag("facet"), space1), keyword("normal")), rest),
        Line::FacetNormal,
    )(input)
}

fn vertex(input: &str) -> IResult<&str, Line<'_>> {
    map(preceded(keyword("vertex"), rest), Line::Vertex)(input)
}

fn classify(line: &str) -> Line<'_> {
    alt((solid, facet_normal, vertex))(line)
        .map(|(_, line)| line)
        .unwrap_or(Line::Other)
}

/// Incremental line-by-line decoder, shared by blocking and async loads
pub(crate) struct AsciiDecoder {
    mesh: Mesh,
    normal: Vector3<f32>,
    vertices: [Point3<f32>; 3],
    slot: usize,
    line_number: usize,
}

impl AsciiDecoder {
    pub(crate) fn new() -> Self {
        Self {
            mesh: Mesh::new(),
            normal: Vector3::zeros(),
            vertices: [Point3::origin(); 3],
            slot: 0,
            line_number: 0,
        }
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    pub(crate) fn feed_line(&mut self, raw: &str) -> StlResult<()> {
        self.line_number += 1;
        let line = raw.trim();

        match classify(line) {
            Line::Solid(name) => self.mesh.set_name(name),
            Line::FacetNormal(args) => {
                let [x, y, z] = self.parse_vector(args, line)?;
                if self.slot != 0 {
                    warn!(
                        line = self.line_number,
                        vertices = self.slot,
                        "discarding incomplete facet"
                    );
                }
                self.normal = Vector3::new(x, y, z);
                self.slot = 0;
            }
            Line::Vertex(args) => {
                let [x, y, z] = self.parse_vector(args, line)?;
                self.vertices[self.slot] = Point3::new(x, y, z);
                self.slot += 1;
                if self.slot == 3 {
                    let [v0, v1, v2] = self.vertices;
                    self.mesh.add_triangle(Triangle::new(self.normal, v0, v1, v2));
                    self.normal = Vector3::zeros();
                    self.slot = 0;
                }
            }
            Line::Other => {}
        }

        Ok(())
    }

    fn parse_vector(&self, args: &str, line: &str) -> StlResult<[f32; 3]> {
        let mut tokens = args.split_whitespace();
        let mut values = [0.0f32; 3];
        for value in &mut values {
            let token = tokens.next().ok_or_else(|| {
                StlError::decode(format!(
                    "line {}: expected 3 numeric values in '{line}'",
                    self.line_number
                ))
            })?;
            *value = token.parse().map_err(|e| {
                StlError::decode_with(
                    format!("line {}: invalid number '{token}' in '{line}'", self.line_number),
                    e,
                )
            })?;
        }
        Ok(values)
    }

    pub(crate) fn finish(self) -> StlResult<Mesh> {
        if self.slot != 0 {
            warn!(vertices = self.slot, "discarding incomplete facet at end of file");
        }
        if self.mesh.is_empty() {
            return Err(StlError::decode("no valid triangle data found"));
        }
        debug!(
            lines = self.line_number,
            triangles = self.mesh.triangle_count(),
            "decoded ASCII STL"
        );
        Ok(self.mesh)
    }
}

/// Decode an ASCII STL from a line-oriented reader
pub fn decode<R: BufRead>(reader: R) -> StlResult<Mesh> {
    let mut decoder = AsciiDecoder::new();
    for line in reader.lines() {
        let line = line.map_err(|e| StlError::decode_with("failed to read line", e))?;
        decoder.feed_line(&line)?;
    }
    decoder.finish()
}

/// Format a component so that parsing it back yields the identical `f32`.
///
/// Uses the shortest round-trip representation, in exponent form for very
/// large or very small magnitudes.
pub(crate) fn format_component(value: f32) -> String {
    let magnitude = value.abs();
    if value == 0.0 || !value.is_finite() || (1e-5..1e9).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

fn format_triple(x: f32, y: f32, z: f32) -> String {
    format!(
        "{} {} {}",
        format_component(x),
        format_component(y),
        format_component(z)
    )
}

/// Name written on the `solid`/`endsolid` lines
fn solid_name(mesh: &Mesh) -> &str {
    let name = mesh.name.lines().next().unwrap_or("").trim();
    if name.is_empty() {
        DEFAULT_SOLID_NAME
    } else {
        name
    }
}

fn facet_lines(triangle: &Triangle) -> [String; 7] {
    let n = triangle.normal;
    let [v0, v1, v2] = triangle.vertices;
    [
        format!("  facet normal {}", format_triple(n.x, n.y, n.z)),
        "    outer loop".to_string(),
        format!("      vertex {}", format_triple(v0.x, v0.y, v0.z)),
        format!("      vertex {}", format_triple(v1.x, v1.y, v1.z)),
        format!("      vertex {}", format_triple(v2.x, v2.y, v2.z)),
        "    endloop".to_string(),
        "  endfacet".to_string(),
    ]
}

/// Number of lines [`lines`] yields for `mesh`
pub(crate) fn line_count(mesh: &Mesh) -> u64 {
    2 + 7 * mesh.triangle_count() as u64
}

/// Every output line of the ASCII encoding, without terminators
pub(crate) fn lines(mesh: &Mesh) -> impl Iterator<Item = String> + '_ {
    let name = solid_name(mesh);
    std::iter::once(format!("solid {name}"))
        .chain(mesh.triangles.iter().flat_map(facet_lines))
        .chain(std::iter::once(format!("endsolid {name}")))
}

/// Encode a mesh as ASCII STL
pub fn encode<W: Write>(mesh: &Mesh, mut writer: W) -> StlResult<()> {
    let write_err = |e: std::io::Error| StlError::encode_with("failed to write ASCII STL", e);
    for line in lines(mesh) {
        writeln!(writer, "{line}").map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn decode_str(text: &str) -> StlResult<Mesh> {
        decode(BufReader::new(text.as_bytes()))
    }

    #[test]
    fn test_single_facet() {
        let text = "solid t\n facet normal 1 0 0\n outer loop\n vertex 0 0 0\n vertex 0 1 0\n vertex 0 0 1\n endloop\n endfacet\n endsolid t";
        let mesh = decode_str(text).unwrap();

        assert_eq!(mesh.name, "t");
        assert_eq!(mesh.triangle_count(), 1);
        let t = &mesh.triangles[0];
        assert_eq!(t.normal, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(t.vertices[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(t.vertices[1], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(t.vertices[2], Point3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("solid part 1"), Line::Solid("part 1"));
        assert_eq!(classify("solid"), Line::Solid(""));
        assert_eq!(classify("facet  normal 0 0 1"), Line::FacetNormal("0 0 1"));
        assert_eq!(classify("vertex\t1 2 3"), Line::Vertex("1 2 3"));
        assert_eq!(classify("endsolid part"), Line::Other);
        assert_eq!(classify("solidworks"), Line::Other);
        assert_eq!(classify("SOLID x"), Line::Other);
    }

    #[test]
    fn test_missing_name_uses_placeholder() {
        let text = "solid\nfacet normal 0 0 1\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\n";
        let mesh = decode_str(text).unwrap();
        assert_eq!(mesh.name, DEFAULT_SOLID_NAME);
    }

    #[test]
    fn test_permissive_grammar() {
        // No loop/facet terminators, no footer, unknown lines, CRLF endings
        let text = "solid odd\r\ncolor 1 0 0\r\n\r\nfacet normal 0 0 1\r\nvertex 0 0 0\r\nvertex 1 0 0\r\nvertex 0 1 0\r\nfacet normal 0 0 -1\r\nvertex 0 0 0\r\nvertex 0 1 0\r\nvertex 1 0 0 extra\r\n";
        let mesh = decode_str(text).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangles[1].normal, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(mesh.triangles[1].vertices[2], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_incomplete_facet_is_discarded() {
        let text = "solid s\nfacet normal 1 0 0\nvertex 9 9 9\nfacet normal 0 1 0\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\n";
        let mesh = decode_str(text).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.triangles[0].normal, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(mesh.triangles[0].vertices[0], Point3::origin());
    }

    #[test]
    fn test_too_few_values() {
        let text = "solid s\nfacet normal 0 0 1\nvertex 1 2\n";
        let err = decode_str(text).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("vertex 1 2"), "{message}");
    }

    #[test]
    fn test_non_numeric_value() {
        let text = "solid s\nfacet normal 0 0 1\nvertex 1 2 abc\n";
        let err = decode_str(text).unwrap_err();
        assert!(matches!(
            err,
            StlError::Decode {
                cause: Some(crate::stl::Cause::ParseFloat(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_no_triangles() {
        let err = decode_str("solid empty\nendsolid empty\n").unwrap_err();
        assert!(err.to_string().contains("no valid triangle data found"));
    }

    #[test]
    fn test_format_component_roundtrips() {
        for value in [
            0.0f32,
            -0.0,
            1.0,
            -2.5,
            0.1,
            1.0e-7,
            3.402_823_5e38,
            f32::MIN_POSITIVE,
            123_456_790.0,
            0.333_333_34,
        ] {
            let text = format_component(value);
            let parsed: f32 = text.parse().unwrap();
            assert_eq!(parsed.to_bits(), value.to_bits(), "{value} -> {text}");
        }
        assert_eq!(format_component(1.0), "1");
        assert_eq!(format_component(1.0e-7), "1e-7");
    }

    #[test]
    fn test_encode_layout() {
        let mut mesh = Mesh::named("demo");
        mesh.add_triangle(Triangle::new(
            Vector3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.5, 0.0),
        ));
        let mut bytes = Vec::new();
        encode(&mesh, &mut bytes).unwrap();

        let expected = "solid demo\n  facet normal 0 0 1\n    outer loop\n      vertex 0 0 0\n      vertex 1 0 0\n      vertex 0 1.5 0\n    endloop\n  endfacet\nendsolid demo\n";
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
        assert_eq!(line_count(&mesh), 9);
    }
}
