/// Async load and save with progress reporting and cooperative cancellation
use std::path::Path;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite,
    AsyncWriteExt, BufReader, BufWriter,
};
use tracing::{debug, info};

use super::ascii::{self, AsciiDecoder};
use super::binary;
use super::error::{StlError, StlResult};
use super::progress::{CancelFlag, Checkpoint, ProgressObserver};
use super::sniff::sniff_async;
use super::{
    check_save_args, create_temp_sibling, open_for_decode_async, persist, StlFormat, BUFFER_SIZE,
    COUNT_SIZE, HEADER_SIZE, RECORD_SIZE,
};
use crate::geometry::Mesh;

/// Lines between progress reports for ASCII load and save
const ASCII_PROGRESS_INTERVAL: u64 = 100;

/// Records between progress reports for binary load
const BINARY_LOAD_PROGRESS_INTERVAL: u64 = 1;

/// Records between progress reports for binary save
const BINARY_SAVE_PROGRESS_INTERVAL: u64 = 1000;

/// Load a mesh asynchronously, reporting progress and honouring `cancel`.
///
/// Cancellation is checked before every line or record; when observed the
/// file is closed and `StlError::Cancelled` is returned. On success the last
/// progress observation is always 100.
pub async fn load_async(
    path: impl AsRef<Path>,
    progress: Option<&dyn ProgressObserver>,
    cancel: Option<&CancelFlag>,
) -> StlResult<Mesh> {
    let (mesh, _) = load_async_with_format(path, progress, cancel).await?;
    Ok(mesh)
}

/// [`load_async`], also returning the format the file was detected as
pub async fn load_async_with_format(
    path: impl AsRef<Path>,
    progress: Option<&dyn ProgressObserver>,
    cancel: Option<&CancelFlag>,
) -> StlResult<(Mesh, StlFormat)> {
    let path = path.as_ref();
    let mut checkpoint = Checkpoint::new(progress, cancel);
    checkpoint.check()?;

    let (file, len) = open_for_decode_async(path).await?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let format = sniff_async(&mut reader, len).await?;
    let mesh = match format {
        StlFormat::Ascii => decode_ascii(&mut reader, &mut checkpoint).await?,
        StlFormat::Binary => decode_binary(&mut reader, len, &mut checkpoint).await?,
    };

    checkpoint.finish(format!("Loaded {} triangles", mesh.triangle_count()));
    info!(
        path = %path.display(),
        %format,
        triangles = mesh.triangle_count(),
        "loaded STL"
    );
    Ok((mesh, format))
}

/// Count line terminators, then rewind. Cancellable, not reported.
async fn count_lines<R>(reader: &mut R, checkpoint: &Checkpoint<'_>) -> StlResult<u64>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let read_err = |e: std::io::Error| StlError::decode_with("failed to count lines", e);
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut newlines = 0u64;
    let mut last = None;

    loop {
        checkpoint.check()?;
        let read = reader.read(&mut buf).await.map_err(read_err)?;
        if read == 0 {
            break;
        }
        newlines += buf[..read].iter().filter(|&&b| b == b'\n').count() as u64;
        last = Some(buf[read - 1]);
    }
    reader
        .seek(std::io::SeekFrom::Start(0))
        .await
        .map_err(read_err)?;

    // An unterminated final line still counts
    let total = match last {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    };
    Ok(total)
}

async fn decode_ascii<R>(reader: &mut R, checkpoint: &mut Checkpoint<'_>) -> StlResult<Mesh>
where
    R: AsyncBufRead + AsyncSeek + Unpin,
{
    let total = count_lines(reader, checkpoint).await?;
    debug!(lines = total, "decoding ASCII STL");

    let mut decoder = AsciiDecoder::new();
    let mut lines = reader.lines();
    let mut index = 0u64;
    loop {
        checkpoint.check()?;
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| StlError::decode_with("failed to read line", e))?
        else {
            break;
        };
        if index % ASCII_PROGRESS_INTERVAL == 0 {
            checkpoint.report(index, total, || {
                format!("Reading ASCII STL: {} triangles", decoder.triangle_count())
            });
        }
        decoder.feed_line(&line)?;
        index += 1;
    }

    decoder.finish()
}

async fn decode_binary<R>(
    reader: &mut R,
    len: u64,
    checkpoint: &mut Checkpoint<'_>,
) -> StlResult<Mesh>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE + COUNT_SIZE];
    reader.read_exact(&mut header).await.map_err(|e| {
        StlError::decode_with(format!("file too small to be a valid STL ({len} bytes)"), e)
    })?;
    let count = binary::check_header(&header, len)?;
    debug!(count, "decoding binary STL");

    let total = u64::from(count);
    let mut mesh = Mesh::with_capacity(count as usize);
    for index in 0..count {
        checkpoint.check()?;
        // Each record gets its own buffer, so a short read cannot bleed into the next
        let mut record = [0u8; RECORD_SIZE];
        reader.read_exact(&mut record).await.map_err(|e| {
            StlError::decode_with(format!("truncated data at triangle {index}"), e)
        })?;
        mesh.add_triangle(binary::decode_record(&record));

        if u64::from(index) % BINARY_LOAD_PROGRESS_INTERVAL == 0 {
            checkpoint.report(u64::from(index) + 1, total, || {
                format!("Reading binary STL: {} of {count} triangles", index + 1)
            });
        }
    }

    Ok(mesh)
}

/// Save a mesh asynchronously, reporting progress and honouring `cancel`.
///
/// Output goes to a temporary sibling of `path` that is only moved into
/// place after the final byte is flushed; cancellation or failure removes
/// it, leaving any previous file at `path` untouched.
pub async fn save_async(
    mesh: &Mesh,
    path: impl AsRef<Path>,
    format: StlFormat,
    progress: Option<&dyn ProgressObserver>,
    cancel: Option<&CancelFlag>,
) -> StlResult<()> {
    let path = path.as_ref();
    check_save_args(mesh, path)?;
    let mut checkpoint = Checkpoint::new(progress, cancel);
    checkpoint.check()?;

    let (file, temp_path) = create_temp_sibling(path)?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, tokio::fs::File::from_std(file));
    match format {
        StlFormat::Ascii => encode_ascii(mesh, &mut writer, &mut checkpoint).await?,
        StlFormat::Binary => encode_binary(mesh, &mut writer, &mut checkpoint).await?,
    }
    writer
        .shutdown()
        .await
        .map_err(|e| StlError::encode_with("failed to flush output", e))?;
    drop(writer);

    checkpoint.check()?;
    persist(temp_path, path)?;

    checkpoint.finish(format!("Saved {} triangles", mesh.triangle_count()));
    info!(
        path = %path.display(),
        %format,
        triangles = mesh.triangle_count(),
        "saved STL"
    );
    Ok(())
}

fn write_err(e: std::io::Error) -> StlError {
    StlError::encode_with("failed to write STL", e)
}

async fn encode_ascii<W>(
    mesh: &Mesh,
    writer: &mut W,
    checkpoint: &mut Checkpoint<'_>,
) -> StlResult<()>
where
    W: AsyncWrite + Unpin,
{
    let total = ascii::line_count(mesh);
    for (index, mut line) in ascii::lines(mesh).enumerate() {
        checkpoint.check()?;
        let index = index as u64;
        if index % ASCII_PROGRESS_INTERVAL == 0 {
            checkpoint.report(index, total, || {
                // Seven lines per facet after the `solid` line
                let written = index.saturating_sub(1) / 7;
                format!("Writing ASCII STL: {written} triangles")
            });
        }
        line.push('\n');
        writer.write_all(line.as_bytes()).await.map_err(write_err)?;
    }
    Ok(())
}

async fn encode_binary<W>(
    mesh: &Mesh,
    writer: &mut W,
    checkpoint: &mut Checkpoint<'_>,
) -> StlResult<()>
where
    W: AsyncWrite + Unpin,
{
    let count = binary::stored_count(mesh)?;
    writer
        .write_all(&binary::encode_header(count))
        .await
        .map_err(write_err)?;

    let total = u64::from(count);
    for (index, triangle) in mesh.triangles.iter().enumerate() {
        checkpoint.check()?;
        let index = index as u64;
        if index % BINARY_SAVE_PROGRESS_INTERVAL == 0 {
            checkpoint.report(index, total, || {
                format!("Writing binary STL: {index} of {count} triangles")
            });
        }
        writer
            .write_all(&binary::encode_record(triangle))
            .await
            .map_err(write_err)?;
    }
    Ok(())
}
