// Framing - Length-delimited frames over raw byte streams
//
// Connections are plain byte pipes, so every encoded message travels inside a
// 4-byte big-endian length prefix. A single read may carry several frames and
// a frame may be split across reads; the codec buffers until a frame is whole.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Default upper bound on a single frame
pub const DEFAULT_MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Build the frame codec shared by readers and writers
pub fn frame_codec(max_frame_len: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_frame_len)
        .new_codec()
}

/// Wrap the read half of a connection
pub fn framed_reader<R>(reader: R, max_frame_len: usize) -> FramedRead<R, LengthDelimitedCodec>
where
    R: AsyncRead,
{
    FramedRead::new(reader, frame_codec(max_frame_len))
}

/// Wrap the write half of a connection
pub fn framed_writer<W>(writer: W, max_frame_len: usize) -> FramedWrite<W, LengthDelimitedCodec>
where
    W: AsyncWrite,
{
    FramedWrite::new(writer, frame_codec(max_frame_len))
}
