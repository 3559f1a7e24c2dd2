//! Line framing for server-sent events

use std::io;
use std::pin::Pin;

use futures::StreamExt;
use tokio_stream::Stream;
use tokio_util::{
    bytes::Bytes,
    codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead},
    io::StreamReader,
};

use crate::{
    client::ByteStream,
    error::{Error, Result},
};

/// Prefix marking an event payload line
pub const DATA_PREFIX: &str = "data: ";

/// Longest line accepted before the stream is abandoned
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Decoded lines of a response body
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Split a chunked body into lines.
///
/// A line or multibyte character split across chunks is decoded once, whole.
/// Invalid UTF-8 is replaced rather than rejected, a trailing `\r` is dropped,
/// and an unterminated tail is flushed when the body closes.
pub fn lines(bytes: ByteStream) -> LineStream {
    let reader = StreamReader::new(
        bytes.map(|chunk| chunk.map(Bytes::from).map_err(io::Error::other)),
    );
    let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), MAX_LINE_LENGTH);

    Box::pin(FramedRead::new(reader, codec).map(|frame| match frame {
        Ok(frame) => Ok(decode_line(&frame)),
        Err(e) => Err(read_error(e)),
    }))
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Recover the body's own error from the reader, if it was one
fn read_error(e: AnyDelimiterCodecError) -> Error {
    let text = e.to_string();
    let inner = match e {
        AnyDelimiterCodecError::Io(e) => e.into_inner(),
        AnyDelimiterCodecError::MaxChunkLengthExceeded => None,
    };
    match inner.map(|inner| inner.downcast::<Error>()) {
        Some(Ok(error)) => *error,
        _ => Error::Stream(format!("Unreadable event stream: {}", text)),
    }
}

/// Payload of a `data:` line, or None for comments, ids and blank lines
pub fn event_data(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
}
