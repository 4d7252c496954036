//! Leverage common functionality across the serialization engine.

pub mod pool;
pub use pool::{Arena, ArenaConfig, ArenaError, ArenaRegistry, Block, Pooled};

/// Converts bytes to a hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        hex.push(DIGITS[(byte >> 4) as usize] as char);
        hex.push(DIGITS[(byte & 0x0f) as usize] as char);
    }
    hex
}

/// Converts a hexadecimal string to bytes.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| match hex.get(i..i + 2) {
            Some(pair) => u8::from_str_radix(pair, 16).ok(),
            None => None,
        })
        .collect()
}

/// Builds a [`std::num::NonZeroUsize`] from a constant, panicking (at compile time when used in a
/// const context) if the value is zero.
#[macro_export]
macro_rules! NZUsize {
    ($val:expr) => {
        match ::std::num::NonZeroUsize::new($val) {
            Some(v) => v,
            None => panic!("value must be non-zero"),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        // Test case 0: empty bytes
        let b = &[];
        let h = hex(b);
        assert_eq!(h, "");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Test case 1: single byte
        let b = &[0x01];
        let h = hex(b);
        assert_eq!(h, "01");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Test case 2: multiple bytes
        let b = &[0x01, 0x02, 0xab];
        let h = hex(b);
        assert_eq!(h, "0102ab");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Test case 3: odd number of characters
        assert!(from_hex("0102030").is_none());

        // Test case 4: invalid hexadecimal character
        assert!(from_hex("01g3").is_none());

        // Test case 5: multi-byte character must not panic
        assert!(from_hex("é1").is_none());
    }

    #[test]
    fn test_nz_usize() {
        const FOUR: std::num::NonZeroUsize = NZUsize!(4);
        assert_eq!(FOUR.get(), 4);
    }

    #[test]
    #[should_panic(expected = "value must be non-zero")]
    fn test_nz_usize_zero() {
        let zero = 0;
        let _ = NZUsize!(zero);
    }
}
