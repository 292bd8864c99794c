/// ASCII/binary format detection
use std::io::{BufRead, Read, Seek, SeekFrom};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::debug;

use super::error::{StlError, StlResult};
use super::{StlFormat, COUNT_SIZE, HEADER_SIZE};

/// Longest line inspected while sniffing; anything longer is not STL text
const SNIFF_LINE_LIMIT: u64 = 64 * 1024;

/// Line-by-line classifier shared by the blocking and async drivers
#[derive(Debug, Default)]
struct LineSniffer {
    seen_solid: bool,
}

impl LineSniffer {
    /// Feed one raw line. Returns a verdict once one can be made.
    fn feed(&mut self, line: &[u8]) -> Option<StlFormat> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return None;
        }

        if !self.seen_solid {
            if starts_with_ignore_case(line, b"solid") {
                self.seen_solid = true;
                return None;
            }
            return Some(StlFormat::Binary);
        }

        if starts_with_ignore_case(line, b"facet normal") {
            Some(StlFormat::Ascii)
        } else {
            Some(StlFormat::Binary)
        }
    }

    /// Verdict when the source ends before a decision was reached
    fn finish(self) -> StlFormat {
        StlFormat::Binary
    }
}

fn starts_with_ignore_case(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn too_short(len: u64) -> bool {
    len < (HEADER_SIZE + COUNT_SIZE) as u64
}

fn sniff_error(err: std::io::Error) -> StlError {
    StlError::decode_with("failed to read file while detecting format", err)
}

/// Detect the format variant of `reader`, whose total length is `len`.
///
/// The reader is rewound to the start before returning.
pub fn sniff<R: BufRead + Seek>(reader: &mut R, len: u64) -> StlResult<StlFormat> {
    let format = if too_short(len) {
        StlFormat::Binary
    } else {
        sniff_lines(reader).map_err(sniff_error)?
    };
    reader.seek(SeekFrom::Start(0)).map_err(sniff_error)?;
    debug!(?format, len, "sniffed STL format");
    Ok(format)
}

fn sniff_lines<R: BufRead>(reader: &mut R) -> std::io::Result<StlFormat> {
    let mut sniffer = LineSniffer::default();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.by_ref().take(SNIFF_LINE_LIMIT).read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(sniffer.finish());
        }
        if read as u64 == SNIFF_LINE_LIMIT && line.last() != Some(&b'\n') {
            return Ok(StlFormat::Binary);
        }
        if let Some(format) = sniffer.feed(&line) {
            return Ok(format);
        }
    }
}

/// Async counterpart of [`sniff`]
pub async fn sniff_async<R>(reader: &mut R, len: u64) -> StlResult<StlFormat>
where
    R: AsyncBufRead + AsyncSeek + Unpin,
{
    let format = if too_short(len) {
        StlFormat::Binary
    } else {
        sniff_lines_async(reader).await.map_err(sniff_error)?
    };
    reader.seek(SeekFrom::Start(0)).await.map_err(sniff_error)?;
    debug!(?format, len, "sniffed STL format");
    Ok(format)
}

async fn sniff_lines_async<R>(reader: &mut R) -> std::io::Result<StlFormat>
where
    R: AsyncBufRead + Unpin,
{
    let mut sniffer = LineSniffer::default();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = (&mut *reader)
            .take(SNIFF_LINE_LIMIT)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            return Ok(sniffer.finish());
        }
        if read as u64 == SNIFF_LINE_LIMIT && line.last() != Some(&b'\n') {
            return Ok(StlFormat::Binary);
        }
        if let Some(format) = sniffer.feed(&line) {
            return Ok(format);
        }
    }
}
