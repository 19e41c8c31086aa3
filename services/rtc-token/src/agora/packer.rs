//! Little-endian binary packing used by the RTC token format.
//!
//! Strings and byte fields are prefixed with a `u16` length, maps with a
//! `u16` entry count followed by `(u16 key, u32 value)` pairs in key order.

use super::SigningError;
use std::collections::BTreeMap;

/// Append-only packer.
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    /// Create an empty packer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `u16`.
    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a `u32`.
    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a length-prefixed byte field.
    ///
    /// # Errors
    ///
    /// Fails when `bytes` is longer than `u16::MAX`.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, SigningError> {
        let len = u16::try_from(bytes.len()).map_err(|_| SigningError::FieldTooLong(bytes.len()))?;
        self.put_u16(len);
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    /// Append a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Fails when the string is longer than `u16::MAX` bytes.
    pub fn put_string(&mut self, value: &str) -> Result<&mut Self, SigningError> {
        self.put_bytes(value.as_bytes())
    }

    /// Append a counted `u16 -> u32` map.
    ///
    /// # Errors
    ///
    /// Fails when the map has more than `u16::MAX` entries.
    pub fn put_u32_map(&mut self, map: &BTreeMap<u16, u32>) -> Result<&mut Self, SigningError> {
        let len = u16::try_from(map.len()).map_err(|_| SigningError::FieldTooLong(map.len()))?;
        self.put_u16(len);
        for (key, value) in map {
            self.put_u16(*key).put_u32(*value);
        }
        Ok(self)
    }

    /// Append raw bytes without a prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Finish packing.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over packed bytes.
#[derive(Debug)]
pub struct Unpacker<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    /// Start reading at the beginning of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SigningError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| SigningError::Malformed(format!("truncated at offset {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a `u16`.
    pub fn get_u16(&mut self) -> Result<u16, SigningError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a `u32`.
    pub fn get_u32(&mut self) -> Result<u32, SigningError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a length-prefixed byte field.
    pub fn get_bytes(&mut self) -> Result<&'a [u8], SigningError> {
        let len = self.get_u16()?;
        self.take(usize::from(len))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String, SigningError> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SigningError::Malformed("string field is not valid UTF-8".to_string()))
    }

    /// Read a counted `u16 -> u32` map.
    pub fn get_u32_map(&mut self) -> Result<BTreeMap<u16, u32>, SigningError> {
        let len = self.get_u16()?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = self.get_u16()?;
            let value = self.get_u32()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), SigningError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(SigningError::Malformed(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )))
        }
    }
}
