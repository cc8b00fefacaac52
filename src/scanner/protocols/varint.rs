use super::ProtocolError;

const SEGMENT_BITS: u8 = 0b0111_1111;
const CONTINUE_BIT: u8 = 0b1000_0000;

/// Write `value` as a VarInt. Negative numbers aren't zigzagged, so they
/// always take 5 bytes.
pub fn write_varint(writer: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !(SEGMENT_BITS as u32) == 0 {
            writer.push(value as u8);
            return;
        }
        writer.push((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        value >>= 7;
    }
}

/// Incremental VarInt decoder, fed one byte at a time so it works the same
/// for sockets and in-memory buffers.
#[derive(Debug, Default)]
pub struct VarIntDecoder {
    value: i32,
    position: u32,
}

impl VarIntDecoder {
    /// Returns `Ok(Some(value))` once the final byte has been pushed.
    pub fn push(&mut self, byte: u8) -> Result<Option<i32>, ProtocolError> {
        self.value |= ((byte & SEGMENT_BITS) as i32) << self.position;
        if byte & CONTINUE_BIT == 0 {
            return Ok(Some(self.value));
        }

        self.position += 7;
        if self.position >= 32 {
            return Err(ProtocolError::VarIntTooLarge);
        }
        Ok(None)
    }
}

/// Read a VarInt from the front of `buf`, advancing it past the bytes that
/// were consumed.
pub fn read_varint_from(buf: &mut &[u8]) -> Result<i32, ProtocolError> {
    let mut decoder = VarIntDecoder::default();
    loop {
        let (&byte, rest) = buf
            .split_first()
            .ok_or(ProtocolError::UnexpectedEndOfStream)?;
        *buf = rest;
        if let Some(value) = decoder.push(byte)? {
            return Ok(value);
        }
    }
}
