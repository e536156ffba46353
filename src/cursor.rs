//! Positioned reads over raw class-file bytes.
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use std::fmt;

/// Byte order applied to multi-byte numeric reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Raised when a read or seek would leave the underlying buffer. The cursor
/// position is unspecified afterwards; callers abandon the cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CursorError {
    pub position: usize,
    pub wanted: usize,
    pub size: usize,
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "read of {} byte(s) at position {} past end of buffer ({} byte(s) total)",
            self.wanted, self.position, self.size
        )
    }
}

impl std::error::Error for CursorError {}

/// Read head over an immutable byte buffer.
///
/// Single-byte reads are endianness-agnostic; `read_bytes` always copies in
/// source order.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Cursor<'a> {
        Cursor {
            data,
            position: 0,
            endian,
        }
    }

    /// Current read position in bytes from the start of the buffer.
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Total size of the underlying buffer.
    pub const fn size(&self) -> usize {
        self.data.len()
    }

    pub const fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Moves the read position to an absolute offset; `position == size` is
    /// legal and leaves the cursor at end-of-buffer.
    pub fn set_position(&mut self, position: usize) -> Result<(), CursorError> {
        if position > self.data.len() {
            return Err(CursorError {
                position,
                wanted: 0,
                size: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CursorError> {
        let end = self.position.checked_add(count).ok_or(CursorError {
            position: self.position,
            wanted: count,
            size: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(CursorError {
                position: self.position,
                wanted: count,
                size: self.data.len(),
            });
        }
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Borrows the next `count` bytes verbatim, in source order.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CursorError> {
        self.take(count)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CursorError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        let bytes = self.take(2)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u16(bytes),
            Endian::Little => LittleEndian::read_u16(bytes),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16, CursorError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        let bytes = self.take(4)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u32(bytes),
            Endian::Little => LittleEndian::read_u32(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, CursorError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        let bytes = self.take(8)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u64(bytes),
            Endian::Little => LittleEndian::read_u64(bytes),
        })
    }

    pub fn read_i64(&mut self) -> Result<i64, CursorError> {
        Ok(self.read_u64()? as i64)
    }

    /// Reads the bit pattern of a 32-bit unsigned integer as an IEEE-754
    /// float.
    pub fn read_f32(&mut self) -> Result<f32, CursorError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CursorError> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}
