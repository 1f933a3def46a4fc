//! Naming of shared-store keys.
//!
//! Counter keys and flag nodes are both derived from one fixed prefix plus the
//! product id, so every process in the cluster addresses the same entries:
//!
//! ```text
//! counter key : {prefix}:{id}      e.g. product_stock:17   value "3"
//! flag node   : /{prefix}/{id}     e.g. /product_stock/17  value "true"
//! ```

use crate::types::ProductId;

/// Default prefix for counter keys and flag nodes.
pub const DEFAULT_PREFIX: &str = "product_stock";

/// Derives counter keys and flag paths from a shared prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space with the given prefix.
    ///
    /// Leading and trailing `/` are stripped so the flag path stays well formed.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// The prefix in use.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the shared stock counter for a product.
    #[must_use]
    pub fn counter_key(&self, product_id: ProductId) -> String {
        format!("{}:{product_id}", self.prefix)
    }

    /// Path of the sold-out flag node for a product.
    #[must_use]
    pub fn flag_path(&self, product_id: ProductId) -> String {
        format!("/{}/{product_id}", self.prefix)
    }

    /// Parent node under which all flag nodes live.
    #[must_use]
    pub fn flag_root(&self) -> String {
        format!("/{}", self.prefix)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Encode a sold-out flag value as stored on the node.
#[must_use]
pub const fn encode_flag(sold_out: bool) -> &'static str {
    if sold_out { "true" } else { "false" }
}

/// Decode a stored flag value. Anything but `"true"`/`"false"` is `None`.
#[must_use]
pub fn decode_flag(raw: &[u8]) -> Option<bool> {
    match std::str::from_utf8(raw).ok()?.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
