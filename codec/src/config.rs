//! Configuration for decoding and for the JSON bridge.

use crate::case::KeyCase;

/// Encoding used for the leaf payloads of a [crate::Dict].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// Fixed-width little-endian bytes.
    Binary,
    /// Human-readable text.
    #[default]
    Text,
}

/// Behavior when a field is absent while decoding a [crate::Dict].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingKey {
    /// Log a warning and keep the field's default value.
    Lenient,
    /// Fail with [crate::Error::MissingKey].
    #[default]
    Strict,
}

/// Configuration for decoding values out of a [crate::Dict].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Handling of absent fields.
    pub missing: MissingKey,
    /// Transform applied to field names before they are looked up.
    pub key_case: KeyCase,
}

impl DecodeConfig {
    /// Substitutes defaults for absent fields (e.g. loading hand-written configuration).
    pub const fn lenient() -> Self {
        Self {
            missing: MissingKey::Lenient,
            key_case: KeyCase::Identity,
        }
    }

    /// Fails on absent fields (e.g. decoding data produced by another instance).
    pub const fn strict() -> Self {
        Self {
            missing: MissingKey::Strict,
            key_case: KeyCase::Identity,
        }
    }

    /// Returns a copy using `key_case` for field names.
    pub const fn with_key_case(mut self, key_case: KeyCase) -> Self {
        self.key_case = key_case;
        self
    }
}

/// Configuration for converting values to and from JSON text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonConfig {
    /// Emit indented output.
    pub pretty: bool,
    /// Transform applied symmetrically to object field names.
    pub key_case: KeyCase,
    /// Handling of absent fields when parsing.
    pub missing: MissingKey,
}

impl JsonConfig {
    /// Indented output with untransformed keys.
    pub const fn pretty() -> Self {
        Self {
            pretty: true,
            key_case: KeyCase::Identity,
            missing: MissingKey::Strict,
        }
    }

    /// Compact output with untransformed keys.
    pub const fn compact() -> Self {
        Self {
            pretty: false,
            key_case: KeyCase::Identity,
            missing: MissingKey::Strict,
        }
    }

    /// Returns the matching configuration for decoding parsed trees.
    pub const fn decode_config(&self) -> DecodeConfig {
        DecodeConfig {
            missing: self.missing,
            key_case: self.key_case,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(DecodeConfig::default(), DecodeConfig::strict());
        assert_eq!(Format::default(), Format::Text);

        let config = JsonConfig {
            missing: MissingKey::Lenient,
            key_case: KeyCase::Camel,
            ..JsonConfig::pretty()
        };
        assert_eq!(
            config.decode_config(),
            DecodeConfig::lenient().with_key_case(KeyCase::Camel)
        );
    }
}
