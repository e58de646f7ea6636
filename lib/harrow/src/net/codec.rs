//! Little-endian payload codec used for every hand-encoded message body.
//!
//! Writers fail with `Overflow` instead of growing: payload buffers come
//! from the packet pool and are sized up front from `byte_size()`.

use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CodecError {
    /// Read past the end of the payload.
    Underflow,
    /// Write past the end of the destination buffer.
    Overflow,
    /// String bytes were not valid UTF-8.
    BadUtf8,
}

pub type CodecResult<T> = Result<T, CodecError>;

pub struct PayloadWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

macro_rules! put_primitive {
    ($name:ident, $ty:ty, $write:ident, $size:expr) => {
        #[inline]
        pub fn $name(&mut self, value: $ty) -> CodecResult<()> {
            self.ensure($size)?;
            LittleEndian::$write(&mut self.buf[self.pos..self.pos + $size], value);
            self.pos += $size;
            Ok(())
        }
    };
}

impl<'a> PayloadWriter<'a> {
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> PayloadWriter<'a> {
        PayloadWriter { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn ensure(&self, len: usize) -> CodecResult<()> {
        if self.pos + len > self.buf.len() {
            return Err(CodecError::Overflow);
        }
        Ok(())
    }

    #[inline]
    pub fn put_u8(&mut self, value: u8) -> CodecResult<()> {
        self.ensure(1)?;
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    put_primitive!(put_u16, u16, write_u16, 2);
    put_primitive!(put_u32, u32, write_u32, 4);
    put_primitive!(put_u64, u64, write_u64, 8);
    put_primitive!(put_i32, i32, write_i32, 4);
    put_primitive!(put_i64, i64, write_i64, 8);
    put_primitive!(put_f32, f32, write_f32, 4);
    put_primitive!(put_f64, f64, write_f64, 8);

    /// u16 length prefix followed by the UTF-8 bytes.
    pub fn put_str(&mut self, value: &str) -> CodecResult<()> {
        if value.len() > u16::MAX as usize {
            return Err(CodecError::Overflow);
        }
        self.put_u16(value.len() as u16)?;
        self.put_bytes(value.as_bytes())
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> CodecResult<()> {
        self.ensure(value.len())?;
        self.buf[self.pos..self.pos + value.len()].copy_from_slice(value);
        self.pos += value.len();
        Ok(())
    }
}

pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! get_primitive {
    ($name:ident, $ty:ty, $read:ident, $size:expr) => {
        #[inline]
        pub fn $name(&mut self) -> CodecResult<$ty> {
            self.ensure($size)?;
            let value = LittleEndian::$read(&self.buf[self.pos..self.pos + $size]);
            self.pos += $size;
            Ok(value)
        }
    };
}

impl<'a> PayloadReader<'a> {
    #[inline]
    pub fn new(buf: &'a [u8]) -> PayloadReader<'a> {
        PayloadReader { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn ensure(&self, len: usize) -> CodecResult<()> {
        if self.pos + len > self.buf.len() {
            return Err(CodecError::Underflow);
        }
        Ok(())
    }

    #[inline]
    pub fn get_u8(&mut self) -> CodecResult<u8> {
        self.ensure(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    get_primitive!(get_u16, u16, read_u16, 2);
    get_primitive!(get_u32, u32, read_u32, 4);
    get_primitive!(get_u64, u64, read_u64, 8);
    get_primitive!(get_i32, i32, read_i32, 4);
    get_primitive!(get_i64, i64, read_i64, 8);
    get_primitive!(get_f32, f32, read_f32, 4);
    get_primitive!(get_f64, f64, read_f64, 8);

    pub fn get_str(&mut self) -> CodecResult<String> {
        let len = self.get_u16()? as usize;
        let bytes = self.get_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::BadUtf8)
    }

    pub fn get_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}
