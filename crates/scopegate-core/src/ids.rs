//! Strong identifier types.
//!
//! Every entity is addressed by a 12-byte opaque identifier, rendered as
//! 24 lowercase hex characters. All identifiers are newtypes so a `SpaceId`
//! can never be passed where an `AreaId` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Length of an identifier in bytes.
pub const ID_LEN: usize = 12;

/// Length of an identifier's hex rendering.
pub const ID_HEX_LEN: usize = ID_LEN * 2;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; ID_LEN]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(rand::random())
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from a 24-character hex string.
            ///
            /// Uppercase hex, surrounding whitespace and any other length are
            /// rejected so malformed input never reaches a store lookup.
            pub fn parse(s: &str) -> Result<Self, CoreError> {
                let malformed = || CoreError::MalformedId {
                    kind: $label,
                    value: s.to_string(),
                };
                if s.len() != ID_HEX_LEN
                    || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
                {
                    return Err(malformed());
                }
                let bytes = hex::decode(s).map_err(|_| malformed())?;
                Self::try_from(bytes.as_slice()).map_err(|_| malformed())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_hex()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; ID_LEN] = slice.try_into().map_err(|_| CoreError::MalformedId {
                    kind: $label,
                    value: hex::encode(slice),
                })?;
                Ok(Self(arr))
            }
        }
    };
}

define_id!(
    /// Identifies a user. Users live outside this engine; only their id is seen.
    UserId,
    "user"
);
define_id!(
    /// Identifies a group of users.
    GroupId,
    "group"
);
define_id!(
    /// Identifies an organization, the optional parent of spaces and groups.
    OrganizationId,
    "organization"
);
define_id!(
    /// Identifies a space.
    SpaceId,
    "space"
);
define_id!(
    /// Identifies an area inside a space.
    AreaId,
    "area"
);
define_id!(
    /// Identifies a page or a document. Both kinds share one id space.
    ResourceId,
    "resource"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let id = SpaceId::from_bytes([0x4a; ID_LEN]);
        assert_eq!(id.to_hex(), "4a4a4a4a4a4a4a4a4a4a4a4a");
        assert_eq!(SpaceId::parse(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("abc").is_err());
        assert!(UserId::parse("4A4A4A4A4A4A4A4A4A4A4A4A").is_err());
        assert!(UserId::parse(" 4a4a4a4a4a4a4a4a4a4a4a4a").is_err());
        assert!(UserId::parse("zz4a4a4a4a4a4a4a4a4a4a4a").is_err());
        assert!(UserId::parse("4a4a4a4a4a4a4a4a4a4a4a4a4a").is_err());

        let err = AreaId::parse("nope").unwrap_err();
        assert!(matches!(err, CoreError::MalformedId { kind: "area", .. }));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(ResourceId::generate(), ResourceId::generate());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = GroupId::from_bytes([0x01; ID_LEN]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"010101010101010101010101\"");
        let back: GroupId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<GroupId>("\"xyz\"").is_err());
    }

    #[test]
    fn test_debug_names_the_kind() {
        let id = AreaId::from_bytes([0xcd; ID_LEN]);
        assert!(format!("{:?}", id).starts_with("AreaId("));
    }
}
