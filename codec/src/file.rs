//! File-level entry points.
//!
//! Binary files hold exactly one encoded value with no header. JSON documents are produced from
//! a text-format [Dict] of the value and parsed back through one.

use crate::{
    config::{Format, JsonConfig},
    dict::Dict,
    error::Error,
    json,
    tree::{to_dict, FromDict, ToDict},
    Decode, Encode,
};
use std::{fs, path::Path};
use tracing::debug;

/// Writes the binary encoding of `value` to `path`, replacing any existing file.
pub fn save_binary<T: Encode + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<(), Error> {
    let path = path.as_ref();
    let encoded = value.encode();
    fs::write(path, &encoded)?;
    debug!(path = %path.display(), bytes = encoded.len(), "saved binary");
    Ok(())
}

/// Reads a value written by [save_binary] into `value`.
///
/// `value` is left untouched if the file cannot be read or decoded.
pub fn load_binary<T: Decode>(path: impl AsRef<Path>, value: &mut T) -> Result<(), Error> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    *value = T::decode(&bytes[..])?;
    debug!(path = %path.display(), bytes = bytes.len(), "loaded binary");
    Ok(())
}

/// Writes the binary form of `dict` to `path`.
pub fn save_dict(path: impl AsRef<Path>, dict: &Dict) -> Result<(), Error> {
    save_binary(path, dict)
}

/// Reads a tree written by [save_dict].
pub fn load_dict(path: impl AsRef<Path>) -> Result<Dict, Error> {
    let mut dict = Dict::new();
    load_binary(path, &mut dict)?;
    Ok(dict)
}

/// Renders `value` as JSON.
pub fn data_to_string<T: ToDict + ?Sized>(value: &T, pretty: bool) -> Result<String, Error> {
    let config = JsonConfig {
        pretty,
        ..JsonConfig::default()
    };
    data_to_string_with(value, &config)
}

/// Renders `value` as JSON using `config`.
pub fn data_to_string_with<T: ToDict + ?Sized>(
    value: &T,
    config: &JsonConfig,
) -> Result<String, Error> {
    let dict = to_dict(value, Format::Text);
    json::to_string(&dict, config)
}

/// Parses `json` into `value`, failing on absent keys.
///
/// `value` is left untouched on error.
pub fn string_to_data<T: FromDict>(json: &str, value: &mut T) -> Result<(), Error> {
    string_to_data_with(json, value, &JsonConfig::default())
}

/// Parses `json` into `value` using `config`.
pub fn string_to_data_with<T: FromDict>(
    json: &str,
    value: &mut T,
    config: &JsonConfig,
) -> Result<(), Error> {
    let dict = json::from_str(json)?;
    *value = T::from_dict(&dict, &config.decode_config())?;
    Ok(())
}
