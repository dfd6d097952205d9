//! Shared plumbing for the 32-byte identifier newtypes.

use crate::TypesError;

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub(crate) fn decode_hex32(s: &str) -> Result<[u8; 32], TypesError> {
    if s.len() != 64 {
        return Err(TypesError::InvalidLength {
            expected: 64,
            actual: s.len(),
        });
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = nibble(chunk[0]).ok_or_else(|| TypesError::InvalidHex(s.to_string()))?;
        let lo = nibble(chunk[1]).ok_or_else(|| TypesError::InvalidHex(s.to_string()))?;
        out[i] = (hi << 4) | lo;
    }
    Ok(out)
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Implements the common API of a 32-byte identifier: `ZERO`, `new`,
/// `as_bytes`, `is_zero`, hex decoding, and a short `Debug` / full hex `Display`.
macro_rules! bytes32_newtype {
    ($name:ident) => {
        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Parse from 64 hex characters.
            pub fn decode_hex(s: &str) -> Result<Self, $crate::TypesError> {
                $crate::bytes::decode_hex32(s).map(Self)
            }

            pub fn encode_hex(&self) -> String {
                $crate::bytes::encode_hex(&self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                for b in &self.0[..4] {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, "\u{2026})")
            }
        }
    };
}

pub(crate) use bytes32_newtype;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = [0xabu8; 32];
        let encoded = encode_hex(&bytes);
        assert_eq!(encoded.len(), 64);
        assert_eq!(decode_hex32(&encoded).unwrap(), bytes);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            decode_hex32("abcd"),
            Err(TypesError::InvalidLength { expected: 64, actual: 4 })
        ));
        let bad = "zz".repeat(32);
        assert!(matches!(decode_hex32(&bad), Err(TypesError::InvalidHex(_))));
    }
}
