//! Minimal Thrift binary-protocol encoding.
//!
//! The cluster's RPC service speaks the framed Thrift binary protocol. The
//! driver only ever issues a fixed set of calls, so this module implements
//! just what those calls need: message envelopes, struct field headers,
//! scalar/string/container encoding, and a generic skipper so unknown
//! response fields never break decoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Thrift wire type tags.
pub(crate) mod ttype {
    pub const STOP: u8 = 0;
    pub const BOOL: u8 = 2;
    pub const BYTE: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const I16: u8 = 6;
    pub const I32: u8 = 8;
    pub const I64: u8 = 10;
    pub const STRING: u8 = 11;
    pub const STRUCT: u8 = 12;
    pub const MAP: u8 = 13;
    pub const SET: u8 = 14;
    pub const LIST: u8 = 15;
}

/// Thrift message types.
pub(crate) mod message {
    pub const CALL: i32 = 1;
    pub const REPLY: i32 = 2;
    pub const EXCEPTION: i32 = 3;
}

const VERSION_1: u32 = 0x8001_0000;

/// Encoder for one outgoing message body.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: BytesMut::with_capacity(256) }
    }

    pub fn message_begin(&mut self, name: &str, message_type: i32, seq_id: i32) {
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        self.buf.put_i32((VERSION_1 | message_type as u32) as i32);
        self.string(name);
        self.buf.put_i32(seq_id);
    }

    pub fn field_begin(&mut self, field_type: u8, id: i16) {
        self.buf.put_u8(field_type);
        self.buf.put_i16(id);
    }

    pub fn field_stop(&mut self) {
        self.buf.put_u8(ttype::STOP);
    }

    pub fn i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn string(&mut self, value: &str) {
        self.binary(value.as_bytes());
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn binary(&mut self, value: &[u8]) {
        self.buf.put_i32(value.len() as i32);
        self.buf.put_slice(value);
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn list_begin(&mut self, elem_type: u8, len: usize) {
        self.buf.put_u8(elem_type);
        self.buf.put_i32(len as i32);
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn map_begin(&mut self, key_type: u8, value_type: u8, len: usize) {
        self.buf.put_u8(key_type);
        self.buf.put_u8(value_type);
        self.buf.put_i32(len as i32);
    }

    /// Finish the body and prepend the 4-byte frame length.
    #[allow(clippy::cast_possible_truncation)]
    pub fn into_frame(self) -> Bytes {
        let body = self.buf;
        let mut framed = BytesMut::with_capacity(body.len() + 4);
        framed.put_u32(body.len() as u32);
        framed.put_slice(&body);
        framed.freeze()
    }
}

/// Decoder over one received frame body.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::protocol("truncated frame"));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn binary(&mut self) -> Result<Bytes> {
        let len = self.i32()?;
        let len = usize::try_from(len).map_err(|_| Error::protocol("negative length"))?;
        self.need(len)?;
        let raw = Bytes::copy_from_slice(&self.buf[..len]);
        self.buf.advance(len);
        Ok(raw)
    }

    pub fn string(&mut self) -> Result<String> {
        let raw = self.binary()?;
        String::from_utf8(raw.to_vec()).map_err(|_| Error::protocol("invalid utf-8 string"))
    }

    /// Read a message envelope, returning `(name, message_type, seq_id)`.
    pub fn message_begin(&mut self) -> Result<(String, i32, i32)> {
        let head = self.i32()?;
        #[allow(clippy::cast_sign_loss)]
        let head = head as u32;
        if head & 0xffff_0000 != VERSION_1 {
            return Err(Error::protocol("bad protocol version in reply"));
        }
        #[allow(clippy::cast_possible_wrap)]
        let message_type = (head & 0xff) as i32;
        let name = self.string()?;
        let seq_id = self.i32()?;
        Ok((name, message_type, seq_id))
    }

    /// Read a field header. `None` marks the stop field.
    pub fn field_begin(&mut self) -> Result<Option<(u8, i16)>> {
        let field_type = self.u8()?;
        if field_type == ttype::STOP {
            return Ok(None);
        }
        let id = self.i16()?;
        Ok(Some((field_type, id)))
    }

    pub fn list_begin(&mut self) -> Result<(u8, usize)> {
        let elem_type = self.u8()?;
        let len = self.i32()?;
        let len = usize::try_from(len).map_err(|_| Error::protocol("negative list length"))?;
        Ok((elem_type, len))
    }

    pub fn map_begin(&mut self) -> Result<(u8, u8, usize)> {
        let key_type = self.u8()?;
        let value_type = self.u8()?;
        let len = self.i32()?;
        let len = usize::try_from(len).map_err(|_| Error::protocol("negative map length"))?;
        Ok((key_type, value_type, len))
    }

    /// Skip one value of the given wire type, recursively for containers.
    pub fn skip(&mut self, field_type: u8) -> Result<()> {
        match field_type {
            ttype::BOOL | ttype::BYTE => {
                self.u8()?;
            }
            ttype::I16 => {
                self.i16()?;
            }
            ttype::I32 => {
                self.i32()?;
            }
            ttype::I64 | ttype::DOUBLE => {
                self.i64()?;
            }
            ttype::STRING => {
                self.binary()?;
            }
            ttype::STRUCT => {
                while let Some((inner_type, _)) = self.field_begin()? {
                    self.skip(inner_type)?;
                }
            }
            ttype::MAP => {
                let (key_type, value_type, len) = self.map_begin()?;
                for _ in 0..len {
                    self.skip(key_type)?;
                    self.skip(value_type)?;
                }
            }
            ttype::SET | ttype::LIST => {
                let (elem_type, len) = self.list_begin()?;
                for _ in 0..len {
                    self.skip(elem_type)?;
                }
            }
            other => {
                return Err(Error::protocol(format!("unknown wire type {other}")));
            }
        }
        Ok(())
    }
}
