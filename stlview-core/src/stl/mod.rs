/// STL file codec for binary and ASCII formats
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info};

use crate::geometry::Mesh;

/// ASCII variant:
///
/// ```text
/// solid name
///   facet normal ni nj nk
///     outer loop
///       vertex v1x v1y v1z
///       vertex v2x v2y v2z
///       vertex v3x v3y v3z
///     endloop
///   endfacet
/// endsolid name
/// ```
pub mod ascii;
/// Binary variant:
///
/// ```text
/// UINT8[80]    header (ignored)
/// UINT32       triangle count N, little-endian
/// N records of
///     REAL32[3]  normal
///     REAL32[3]  vertex 1
///     REAL32[3]  vertex 2
///     REAL32[3]  vertex 3
///     UINT16     attribute byte count (ignored)
/// ```
pub mod binary;
mod error;
mod progress;
mod sniff;
mod streaming;

pub use error::{Cause, StlError, StlResult};
pub use progress::{CancelFlag, Progress, ProgressObserver};
pub use sniff::{sniff, sniff_async};
pub use streaming::{load_async, load_async_with_format, save_async};

/// Binary header size in bytes
pub const HEADER_SIZE: usize = 80;

/// Size of the little-endian triangle count following the header
pub const COUNT_SIZE: usize = 4;

/// Size of one binary triangle record (normal + 3 vertices + attribute)
pub const RECORD_SIZE: usize = 50;

/// Read/write buffer capacity for file-backed operations
pub const BUFFER_SIZE: usize = 64 * 1024;

/// The two wire encodings sharing the `.stl` extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StlFormat {
    Ascii,
    Binary,
}

impl std::fmt::Display for StlFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ascii => f.write_str("ascii"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

impl std::str::FromStr for StlFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" | "text" => Ok(Self::Ascii),
            "binary" | "bin" => Ok(Self::Binary),
            other => Err(format!("unknown STL format '{other}' (expected ascii or binary)")),
        }
    }
}

/// Exact size of a binary file holding `count` triangles
pub fn binary_file_size(count: u32) -> u64 {
    (HEADER_SIZE + COUNT_SIZE) as u64 + RECORD_SIZE as u64 * u64::from(count)
}

/// Load a mesh from an STL file, detecting ASCII vs binary by content.
pub fn load(path: impl AsRef<Path>) -> StlResult<Mesh> {
    let path = path.as_ref();
    let (file, len) = open_for_decode(path)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let format = sniff(&mut reader, len)?;
    let mesh = match format {
        StlFormat::Ascii => ascii::decode(reader)?,
        StlFormat::Binary => binary::decode(reader, len)?,
    };

    info!(
        path = %path.display(),
        %format,
        triangles = mesh.triangle_count(),
        "loaded STL"
    );
    Ok(mesh)
}

/// Detect the format variant of an STL file without decoding it
pub fn detect_format(path: impl AsRef<Path>) -> StlResult<StlFormat> {
    let (file, len) = open_for_decode(path.as_ref())?;
    sniff(&mut BufReader::new(file), len)
}

/// Decode an in-memory or otherwise seekable STL source, read from its start
pub fn decode<R: Read + Seek>(mut source: R) -> StlResult<Mesh> {
    let measure_err =
        |e: std::io::Error| StlError::decode_with("failed to determine source length", e);
    let len = source.seek(SeekFrom::End(0)).map_err(measure_err)?;
    source.seek(SeekFrom::Start(0)).map_err(measure_err)?;

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source);
    match sniff(&mut reader, len)? {
        StlFormat::Ascii => ascii::decode(reader),
        StlFormat::Binary => binary::decode(reader, len),
    }
}

/// Save a mesh to an STL file in the requested format.
///
/// The file is written to a temporary sibling and moved into place once
/// complete, so `path` never holds a partial file.
pub fn save(mesh: &Mesh, path: impl AsRef<Path>, format: StlFormat) -> StlResult<()> {
    let path = path.as_ref();
    check_save_args(mesh, path)?;

    let (file, temp_path) = create_temp_sibling(path)?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
    encode(mesh, &mut writer, format)?;
    let file = writer
        .into_inner()
        .map_err(|e| StlError::encode_with("failed to flush output", e.into_error()))?;
    drop(file);
    persist(temp_path, path)?;

    info!(
        path = %path.display(),
        %format,
        triangles = mesh.triangle_count(),
        "saved STL"
    );
    Ok(())
}

/// Encode a mesh into any writer
pub fn encode<W: Write>(mesh: &Mesh, writer: W, format: StlFormat) -> StlResult<()> {
    if mesh.is_empty() {
        return Err(empty_mesh_error());
    }
    match format {
        StlFormat::Ascii => ascii::encode(mesh, writer),
        StlFormat::Binary => binary::encode(mesh, writer),
    }
}

fn empty_mesh_error() -> StlError {
    StlError::encode("mesh contains no triangles")
}

fn check_path(path: &Path) -> StlResult<()> {
    if path.as_os_str().is_empty() {
        return Err(StlError::InvalidArgument("path must not be empty"));
    }
    Ok(())
}

pub(crate) fn check_save_args(mesh: &Mesh, path: &Path) -> StlResult<()> {
    check_path(path)?;
    if mesh.is_empty() {
        return Err(empty_mesh_error());
    }
    Ok(())
}

fn map_open_error(path: &Path, err: std::io::Error) -> StlError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StlError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        StlError::decode_with(format!("failed to open {}", path.display()), err)
    }
}

fn open_for_decode(path: &Path) -> StlResult<(File, u64)> {
    check_path(path)?;
    let file = File::open(path).map_err(|e| map_open_error(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| StlError::decode_with("failed to read file metadata", e))?
        .len();
    debug!(path = %path.display(), len, "opened STL for decoding");
    Ok((file, len))
}

pub(crate) async fn open_for_decode_async(path: &Path) -> StlResult<(tokio::fs::File, u64)> {
    check_path(path)?;
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| map_open_error(path, e))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| StlError::decode_with("failed to read file metadata", e))?
        .len();
    debug!(path = %path.display(), len, "opened STL for decoding");
    Ok((file, len))
}

/// Create a uniquely named temporary file next to `path`
pub(crate) fn create_temp_sibling(path: &Path) -> StlResult<(File, TempPath)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".stlview-")
        .suffix(".partial")
        .tempfile_in(&dir)
        .map_err(|e| {
            StlError::encode_with(format!("failed to create file in {}", dir.display()), e)
        })?;
    Ok(NamedTempFile::into_parts(temp))
}

/// Move a completed temporary file over `path`
pub(crate) fn persist(temp_path: TempPath, path: &Path) -> StlResult<()> {
    temp_path.persist(path).map_err(|e| {
        StlError::encode_with(format!("failed to write {}", path.display()), e.error)
    })?;
    Ok(())
}
