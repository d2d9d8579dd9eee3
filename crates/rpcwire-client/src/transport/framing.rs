//! Message framing over byte streams
//!
//! `Lines` terminates each message with `\n` and is only safe for payloads that
//! never contain a newline (compact JSON). `LengthDelimited` prefixes each
//! message with a 4-byte big-endian length and carries arbitrary bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rpcwire_core::config::Framing;
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Upper bound for a single message in either mode
pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

#[derive(Debug)]
pub enum FrameCodec {
    Lines { next_index: usize },
    LengthDelimited(LengthDelimitedCodec),
}

impl FrameCodec {
    pub fn new(framing: Framing) -> Self {
        match framing {
            Framing::Lines => FrameCodec::Lines { next_index: 0 },
            Framing::LengthDelimited => FrameCodec::LengthDelimited(
                LengthDelimitedCodec::builder()
                    .length_field_length(4)
                    .max_frame_length(MAX_FRAME_LENGTH)
                    .new_codec(),
            ),
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            FrameCodec::Lines { .. } => Framing::Lines,
            FrameCodec::LengthDelimited(_) => Framing::LengthDelimited,
        }
    }
}

fn frame_too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "frame exceeds maximum length")
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, io::Error> {
        match self {
            FrameCodec::Lines { next_index } => {
                loop {
                    // resume the scan where the previous call stopped
                    let Some(offset) = src[*next_index..].iter().position(|b| *b == b'\n') else {
                        *next_index = src.len();
                        if src.len() > MAX_FRAME_LENGTH {
                            return Err(frame_too_long());
                        }
                        return Ok(None);
                    };

                    let end = *next_index + offset;
                    *next_index = 0;
                    let mut line = src.split_to(end + 1);
                    line.truncate(end);
                    if line.last() == Some(&b'\r') {
                        line.truncate(end - 1);
                    }

                    // blank lines between messages are skipped
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(line.to_vec()));
                }
            }
            FrameCodec::LengthDelimited(codec) => {
                Ok(codec.decode(src)?.map(|frame| frame.to_vec()))
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, io::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => match self {
                // a final message without a trailing newline
                FrameCodec::Lines { next_index } if !src.is_empty() => {
                    *next_index = 0;
                    let line = src.split_to(src.len());
                    if line.iter().all(u8::is_ascii_whitespace) {
                        Ok(None)
                    } else {
                        Ok(Some(line.to_vec()))
                    }
                }
                FrameCodec::Lines { .. } => Ok(None),
                FrameCodec::LengthDelimited(_) if src.has_remaining() => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "bytes remaining on stream",
                )),
                FrameCodec::LengthDelimited(_) => Ok(None),
            },
        }
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), io::Error> {
        match self {
            FrameCodec::Lines { .. } => {
                if item.contains(&b'\n') {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "message contains a newline and cannot be line framed",
                    ));
                }
                if item.len() > MAX_FRAME_LENGTH {
                    return Err(frame_too_long());
                }
                dst.reserve(item.len() + 1);
                dst.put_slice(&item);
                dst.put_u8(b'\n');
                Ok(())
            }
            FrameCodec::LengthDelimited(codec) => codec.encode(Bytes::from(item), dst),
        }
    }
}
