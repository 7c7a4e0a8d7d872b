//! Bounds-checked cursor over a single datagram payload.
//!
//! All multi-byte integers in the wire format are little-endian. Text fields
//! are fixed-width byte slices: strict UTF-8, trailing NUL padding stripped.

use crate::{MarshalError, Result};

/// Sequential reader over one raw frame.
///
/// Every read is bounds-checked and reports the frame kind and offset on
/// failure. Frames are classified by exact length before decoding, so a
/// truncated read indicates a layout bug rather than a short datagram.
pub struct PacketCursor<'a> {
    data: &'a [u8],
    pos: usize,
    frame: &'static str,
}

impl<'a> PacketCursor<'a> {
    pub fn new(data: &'a [u8], frame: &'static str) -> Self {
        Self { data, pos: 0, frame }
    }

    /// Current read offset within the frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Jump to an absolute offset.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(self.truncated(offset.saturating_sub(self.pos)));
        }
        self.pos = offset;
        Ok(())
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    #[inline]
    pub fn i8(&mut self) -> Result<i8> {
        self.u8().map(|v| v as i8)
    }

    #[inline]
    pub fn u16_le(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    #[inline]
    pub fn i16_le(&mut self) -> Result<i16> {
        self.u16_le().map(|v| v as i16)
    }

    #[inline]
    pub fn f32_le(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a fixed-width NUL-padded UTF-8 string field.
    ///
    /// Trailing NUL bytes are padding, not truncation; embedded NULs are also
    /// dropped to match the wire producer's behavior.
    pub fn fixed_string(&mut self, width: usize, field: &'static str) -> Result<String> {
        let offset = self.pos;
        let bytes = self.take(width)?;
        let text = std::str::from_utf8(bytes).map_err(|source| MarshalError::InvalidText {
            frame: self.frame,
            field,
            offset,
            source,
        })?;
        Ok(text.chars().filter(|&c| c != '\0').collect())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).ok_or_else(|| self.truncated(count))?;
        if end > self.data.len() {
            return Err(self.truncated(count));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn truncated(&self, wanted: usize) -> MarshalError {
        MarshalError::Truncated { frame: self.frame, offset: self.pos, wanted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let data = [0x34, 0x12, 0x07, 0x00, 0x00, 0xF6, 0xC2];
        let mut cursor = PacketCursor::new(&data, "test");
        assert_eq!(cursor.u16_le().unwrap(), 0x1234);
        assert_eq!(cursor.u8().unwrap(), 7);
        assert_eq!(cursor.f32_le().unwrap(), -123.0);
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn reads_negative_i16() {
        let data = [0xFF, 0xFF];
        let mut cursor = PacketCursor::new(&data, "test");
        assert_eq!(cursor.i16_le().unwrap(), -1);
    }

    #[test]
    fn strips_nul_padding_from_strings() {
        let mut data = [0u8; 8];
        data[..3].copy_from_slice(b"Kai");
        let mut cursor = PacketCursor::new(&data, "test");
        assert_eq!(cursor.fixed_string(8, "name").unwrap(), "Kai");
    }

    #[test]
    fn invalid_utf8_reports_field_and_offset() {
        let data = [0x41, 0xFF, 0xFE, 0x00];
        let mut cursor = PacketCursor::new(&data, "roster");
        let err = cursor.fixed_string(4, "name").unwrap_err();
        match err {
            MarshalError::InvalidText { frame, field, offset, .. } => {
                assert_eq!(frame, "roster");
                assert_eq!(field, "name");
                assert_eq!(offset, 0);
            }
            other => panic!("expected InvalidText, got {other:?}"),
        }
    }

    #[test]
    fn out_of_bounds_read_is_truncated() {
        let data = [0u8; 2];
        let mut cursor = PacketCursor::new(&data, "test");
        assert!(matches!(cursor.f32_le(), Err(MarshalError::Truncated { wanted: 4, .. })));
    }

    #[test]
    fn seek_past_end_fails() {
        let data = [0u8; 4];
        let mut cursor = PacketCursor::new(&data, "test");
        assert!(cursor.seek(4).is_ok());
        assert!(cursor.seek(5).is_err());
    }
}
