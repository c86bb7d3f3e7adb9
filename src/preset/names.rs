//! Name rules for collections, titles and keys.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{StoreError, StoreResult};

/// File extension of collection documents.
pub const COLLECTION_EXT: &str = "toml";

static COLLECTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.\-]*$").expect("static regex"));

/// Canonical collection name, or `NotFound` when the name can never refer to
/// a collection file. A trailing `.toml` is accepted and stripped.
pub fn collection_name(name: &str) -> StoreResult<String> {
    let stem = name
        .strip_suffix(&format!(".{COLLECTION_EXT}"))
        .unwrap_or(name);

    if stem.len() > 200 || stem.contains("..") || !COLLECTION_NAME.is_match(stem) {
        return Err(StoreError::not_found(format!("collection '{name}'")));
    }
    Ok(stem.to_string())
}

/// Titles and keys: non-empty, no control characters.
pub fn entry_name(kind: &'static str, name: &str) -> StoreResult<()> {
    if name.is_empty() || name.chars().any(char::is_control) {
        return Err(StoreError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}
