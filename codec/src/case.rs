//! Field-name casing applied at the JSON boundary.
//!
//! Field names are `snake_case` in Rust. [KeyCase::Camel] maps them to `camelCase` on the way out,
//! and decoding looks each field up under the same external name. The mapping is only used for
//! names it can invert exactly; anything else is rejected with [Error::InvalidKey].

use crate::error::Error;
use std::borrow::Cow;

/// Casing transform for object field names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KeyCase {
    /// Names are used as written.
    #[default]
    Identity,
    /// `snake_case` internally, `camelCase` externally.
    Camel,
}

impl KeyCase {
    /// Converts an internal field name to its external form.
    pub fn to_external<'a>(&self, name: &'a str) -> Result<Cow<'a, str>, Error> {
        match self {
            Self::Identity => Ok(Cow::Borrowed(name)),
            Self::Camel => snake_to_camel(name).map(Cow::Owned),
        }
    }

    /// Converts an external field name to its internal form.
    #[cfg(test)]
    pub(crate) fn to_internal<'a>(&self, name: &'a str) -> Result<Cow<'a, str>, Error> {
        match self {
            Self::Identity => Ok(Cow::Borrowed(name)),
            Self::Camel => camel_to_snake(name).map(Cow::Owned),
        }
    }
}

fn invalid(name: &str) -> Error {
    Error::InvalidKey(name.to_owned())
}

// Accepts names where every underscore separates two segments and is followed by a lowercase
// ASCII letter, and no uppercase ASCII letter appears.
fn snake_to_camel(name: &str) -> Result<String, Error> {
    if name.starts_with('_') || name.ends_with('_') {
        return Err(invalid(name));
    }
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        match c {
            '_' => match chars.next() {
                Some(next) if next.is_ascii_lowercase() => out.push(next.to_ascii_uppercase()),
                _ => return Err(invalid(name)),
            },
            c if c.is_ascii_uppercase() => return Err(invalid(name)),
            c => out.push(c),
        }
    }
    Ok(out)
}

// Accepts names without underscores whose first character is not an uppercase ASCII letter.
#[cfg(test)]
fn camel_to_snake(name: &str) -> Result<String, Error> {
    if name.contains('_') || name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Err(invalid(name));
    }
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("id", "id"; "single segment")]
    #[test_case("user_name", "userName"; "two segments")]
    #[test_case("max_free_blocks", "maxFreeBlocks"; "three segments")]
    #[test_case("user_i_d", "userID"; "single letter segments")]
    #[test_case("v2_count", "v2Count"; "digits")]
    fn test_round_trip(snake: &str, camel: &str) {
        let case = KeyCase::Camel;
        assert_eq!(case.to_external(snake).unwrap(), camel);
        assert_eq!(case.to_internal(camel).unwrap(), snake);
    }

    #[test_case("_leading"; "leading underscore")]
    #[test_case("trailing_"; "trailing underscore")]
    #[test_case("double__underscore"; "consecutive underscores")]
    #[test_case("digit_1"; "underscore before digit")]
    #[test_case("Upper"; "uppercase")]
    fn test_rejects_non_invertible_snake(name: &str) {
        assert!(matches!(
            KeyCase::Camel.to_external(name),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test_case("has_underscore"; "underscore")]
    #[test_case("Leading"; "leading uppercase")]
    fn test_rejects_non_invertible_camel(name: &str) {
        assert!(matches!(
            KeyCase::Camel.to_internal(name),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_identity_borrows() {
        assert!(matches!(
            KeyCase::Identity.to_external("any_Thing__"),
            Ok(Cow::Borrowed("any_Thing__"))
        ));
    }
}
