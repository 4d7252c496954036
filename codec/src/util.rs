//! Codec utility functions

use crate::error::Error;
use bytes::Buf;

/// Checks that at least `len` bytes remain in the buffer.
#[inline]
pub fn at_least<B: Buf>(buf: &mut B, len: usize) -> Result<(), Error> {
    if buf.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    Ok(())
}

/// Converts a collection length to its 4-byte wire prefix.
///
/// Panics if the length does not fit in a `u32`.
#[inline]
pub fn length_prefix(len: usize) -> u32 {
    u32::try_from(len).expect("collection length exceeds u32")
}

/// Reads a 4-byte length prefix.
#[inline]
pub fn read_length<B: Buf>(buf: &mut B) -> Result<usize, Error> {
    at_least(buf, 4)?;
    let len = buf.get_u32_le();
    usize::try_from(len).map_err(|_| Error::InvalidLength(len as usize))
}
