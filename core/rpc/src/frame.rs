//! Stream framing.
//!
//! Streamed bodies are sequences of length-delimited records (4-byte
//! big-endian length). A file-transfer record starts with a tag byte,
//! `0x01` for the header frame and `0x02` for a data frame, followed by the
//! raw bytes. Listing records carry one JSON item each.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

const TAG_HEADER: u8 = 0x01;
const TAG_DATA: u8 = 0x02;

/// Largest record accepted on the wire.
pub const MAX_RECORD_LENGTH: usize = 16 * 1024 * 1024;

/// One unit of a file transfer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// File metadata; first and only once.
    Header(Bytes),
    /// A slice of file content.
    Data(Bytes),
}

impl Frame {
    pub fn is_header(&self) -> bool {
        matches!(self, Frame::Header(_))
    }
}

fn length_delimited() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_RECORD_LENGTH)
        .new_codec()
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Codec for [`Frame`] records.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            inner: length_delimited(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        let Some(mut record) = self.inner.decode(src)? else {
            return Ok(None);
        };
        if record.is_empty() {
            return Err(invalid_data("empty frame record"));
        }

        let tag = record.split_to(1)[0];
        let body = record.freeze();
        match tag {
            TAG_HEADER => Ok(Some(Frame::Header(body))),
            TAG_DATA => Ok(Some(Frame::Data(body))),
            other => Err(invalid_data(format!("unknown frame tag 0x{:02x}", other))),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> io::Result<()> {
        let (tag, body) = match frame {
            Frame::Header(body) => (TAG_HEADER, body),
            Frame::Data(body) => (TAG_DATA, body),
        };
        let mut record = BytesMut::with_capacity(1 + body.len());
        record.put_u8(tag);
        record.extend_from_slice(&body);
        self.inner.encode(record.freeze(), dst)
    }
}

/// Codec for length-delimited JSON items.
#[derive(Debug)]
pub struct JsonCodec<T> {
    inner: LengthDelimitedCodec,
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: length_delimited(),
            _item: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Decoder for JsonCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<T>> {
        match self.inner.decode(src)? {
            Some(record) => serde_json::from_slice(&record)
                .map(Some)
                .map_err(|e| invalid_data(e.to_string())),
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> io::Result<()> {
        let json = serde_json::to_vec(&item).map_err(|e| invalid_data(e.to_string()))?;
        self.inner.encode(Bytes::from(json), dst)
    }
}

/// Encode a single item into its own buffer, ready to hand to a body stream.
pub fn encode_one<C, I>(codec: &mut C, item: I) -> io::Result<Bytes>
where
    C: Encoder<I, Error = io::Error>,
{
    let mut buf = BytesMut::new();
    codec.encode(item, &mut buf)?;
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ResourceInfo;
    use lockbox_common::ResourceId;

    #[test]
    fn test_frames_decode_across_partial_reads() {
        let mut codec = FrameCodec::new();
        let mut wire = BytesMut::new();
        codec
            .encode(Frame::Header(Bytes::from_static(b"meta")), &mut wire)
            .unwrap();
        codec
            .encode(Frame::Data(Bytes::from_static(b"payload")), &mut wire)
            .unwrap();

        // Feed one byte at a time.
        let mut src = BytesMut::new();
        let mut out = Vec::new();
        for byte in wire.iter() {
            src.put_u8(*byte);
            while let Some(frame) = codec.decode(&mut src).unwrap() {
                out.push(frame);
            }
        }
        assert_eq!(
            out,
            vec![
                Frame::Header(Bytes::from_static(b"meta")),
                Frame::Data(Bytes::from_static(b"payload")),
            ]
        );
    }

    #[test]
    fn test_empty_header_is_valid() {
        let mut codec = FrameCodec::new();
        let bytes = encode_one(&mut codec, Frame::Header(Bytes::new())).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 1, TAG_HEADER]);

        let mut src = BytesMut::from(&bytes[..]);
        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Frame::Header(Bytes::new()))
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut src = BytesMut::from(&[0u8, 0, 0, 2, 0x07, 0xff][..]);
        let err = FrameCodec::new().decode(&mut src).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_empty_record_rejected() {
        let mut src = BytesMut::from(&[0u8, 0, 0, 0][..]);
        assert!(FrameCodec::new().decode(&mut src).is_err());
    }

    #[test]
    fn test_json_items() {
        let item = ResourceInfo {
            id: ResourceId::generate(),
            meta: b"work".to_vec(),
        };
        let mut codec = JsonCodec::<ResourceInfo>::new();
        let bytes = encode_one(&mut codec, item.clone()).unwrap();

        let mut src = BytesMut::from(&bytes[..]);
        assert_eq!(codec.decode(&mut src).unwrap(), Some(item));
        assert_eq!(codec.decode(&mut src).unwrap(), None);
    }
}
