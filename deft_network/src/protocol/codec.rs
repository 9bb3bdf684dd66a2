//! 分隔符编解码器
//!
//! 把与 [`Tokenizer`](crate::buffer::Tokenizer) 相同的分帧规则适配到
//! `tokio_util::codec`，供需要在 Framed 流上复用分帧逻辑的调用方使用。
//! 解码出的帧包含分隔符。

use crate::buffer::tokenizer::scan;
use bytes::{Bytes, BytesMut};
use deft_core::DeftError;
use tokio_util::codec::{Decoder, Encoder};

/// 分隔符编解码器
#[derive(Debug, Clone)]
pub struct DelimiterCodec {
    delimiter: Bytes,
    /// 已确认无匹配的前缀长度
    next_index: usize,
    /// 单帧最大长度（含分隔符）
    max_length: Option<usize>,
}

impl DelimiterCodec {
    /// 创建编解码器，空分隔符返回 [`DeftError::InvalidDelimiter`]
    pub fn new(delimiter: impl Into<Bytes>) -> Result<Self, DeftError> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(DeftError::InvalidDelimiter);
        }
        Ok(Self {
            delimiter,
            next_index: 0,
            max_length: None,
        })
    }

    /// 限制单帧长度，超过时解码返回 [`DeftError::ResourceExhausted`]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }
}

impl Decoder for DelimiterCodec {
    type Item = Bytes;
    type Error = DeftError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match scan(src, self.next_index, &self.delimiter) {
            Ok(pos) => {
                let end = pos + self.delimiter.len();
                if let Some(limit) = self.max_length.filter(|&limit| end > limit) {
                    return Err(DeftError::ResourceExhausted { requested: end, limit });
                }
                self.next_index = 0;
                Ok(Some(src.split_to(end).freeze()))
            }
            Err(resume) => {
                if let Some(limit) = self.max_length.filter(|&limit| src.len() > limit) {
                    return Err(DeftError::ResourceExhausted {
                        requested: src.len(),
                        limit,
                    });
                }
                self.next_index = resume;
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for DelimiterCodec {
    type Error = DeftError;

    /// 写出数据并补上分隔符；数据已以分隔符结尾时原样写出
    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + self.delimiter.len());
        dst.extend_from_slice(&item);
        if !item.ends_with(&self.delimiter) {
            dst.extend_from_slice(&self.delimiter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_delimiter_rejected() {
        assert!(matches!(
            DelimiterCodec::new(Bytes::new()),
            Err(DeftError::InvalidDelimiter)
        ));
    }

    #[test]
    fn test_decode_frames_in_order() {
        let mut codec = DelimiterCodec::new(Bytes::from_static(b"\r\n")).unwrap();
        let mut src = BytesMut::from(&b"GET /\r\nHost: a\r\ntail"[..]);

        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), Bytes::from_static(b"GET /\r\n"));
        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), Bytes::from_static(b"Host: a\r\n"));
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(&src[..], b"tail");
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        let mut codec = DelimiterCodec::new(Bytes::from_static(b"\r\n")).unwrap();
        let mut src = BytesMut::from(&b"abc\r"[..]);
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend_from_slice(b"\nrest");
        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), Bytes::from_static(b"abc\r\n"));
    }

    #[test]
    fn test_max_length() {
        let mut codec = DelimiterCodec::new(Bytes::from_static(b"\n"))
            .unwrap()
            .with_max_length(4);
        let mut src = BytesMut::from(&b"toolong"[..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(DeftError::ResourceExhausted { requested: 7, limit: 4 })
        ));

        let mut src = BytesMut::from(&b"ok\n"[..]);
        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), Bytes::from_static(b"ok\n"));
    }

    #[test]
    fn test_encode_appends_delimiter_once() {
        let mut codec = DelimiterCodec::new(Bytes::from_static(b"\n")).unwrap();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(b"a"), &mut dst).unwrap();
        codec.encode(Bytes::from_static(b"b\n"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"a\nb\n");
    }
}
