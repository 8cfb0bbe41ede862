//! Macros for defining typed address and ID types.

/// Macro to define a typed on-chain address.
///
/// This generates a newtype wrapper around the canonical base58 string with:
/// - `parse()` that rejects anything not decoding to exactly 32 bytes
/// - `from_bytes()` to build an address from a raw public key
/// - `Display`, `FromStr`, `Serialize` and `Deserialize` implementations
/// - `Ord` and `Hash` so addresses can key ordered maps
///
/// # Example
///
/// ```ignore
/// define_address!(VoteAccount, "vote account");
///
/// let vote: VoteAccount = "Vote111111111111111111111111111111111111111".parse()?;
/// ```
#[macro_export]
macro_rules! define_address {
    ($name:ident, $kind:literal) => {
        #[doc = concat!("A base58 ", $kind, " address.")]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Human-readable kind of address, used in diagnostics.
            pub const KIND: &'static str = $kind;

            /// Parses an address from its base58 form.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let bytes = $crate::bs58::decode(trimmed).into_vec().map_err(|e| {
                    $crate::IdError::InvalidBase58 {
                        input: trimmed.to_string(),
                        reason: e.to_string(),
                    }
                })?;

                if bytes.len() != $crate::ADDRESS_LEN {
                    return Err($crate::IdError::InvalidLength {
                        input: trimmed.to_string(),
                        expected: $crate::ADDRESS_LEN,
                        actual: bytes.len(),
                    });
                }

                Ok(Self(trimmed.to_string()))
            }

            /// Builds an address from a raw 32-byte public key.
            #[must_use]
            pub fn from_bytes(bytes: &[u8; $crate::ADDRESS_LEN]) -> Self {
                Self($crate::bs58::encode(bytes).into_string())
            }

            /// Returns the canonical base58 string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a shortened form (`abcd…wxyz`) for narrow table columns.
            #[must_use]
            pub fn short(&self) -> String {
                let s = self.0.as_str();
                if s.len() <= 12 {
                    return s.to_string();
                }
                format!("{}…{}", &s[..4], &s[s.len() - 4..])
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Macro to define a typed ID with a specific prefix.
///
/// IDs have the format `{prefix}_{ulid}` and sort by creation time.
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        /// A typed, time-ordered ID.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::Ulid);

        impl $name {
            /// The prefix for this ID type.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new ID with a fresh ULID.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::Ulid::new())
            }

            /// Returns the timestamp portion of the ULID in milliseconds.
            #[must_use]
            pub fn timestamp_ms(&self) -> u64 {
                self.0.timestamp_ms()
            }

            /// Parses an ID from a string in the format `{prefix}_{ulid}`.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let Some((prefix, ulid_str)) = s.split_once('_') else {
                    return Err($crate::IdError::MissingSeparator);
                };

                if prefix != Self::PREFIX {
                    return Err($crate::IdError::InvalidPrefix {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }

                ulid_str
                    .parse::<$crate::Ulid>()
                    .map(Self)
                    .map_err(|e| $crate::IdError::InvalidUlid(e.to_string()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
