//! Wire format of queued sales.

use chrono::{DateTime, Utc};
use flash_sale_core::ProductId;
use serde::{Deserialize, Serialize};

/// One admitted sale waiting to be written to the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeMessage {
    /// Product sold
    pub product_id: ProductId,
    /// When the unit was claimed
    pub claimed_at: DateTime<Utc>,
}

impl SpikeMessage {
    /// A sale of `product_id` claimed now.
    #[must_use]
    pub fn now(product_id: ProductId) -> Self {
        Self {
            product_id,
            claimed_at: Utc::now(),
        }
    }

    /// Message key: the product id, so one product's sales stay on one partition.
    #[must_use]
    pub fn key(&self) -> String {
        self.product_id.to_string()
    }

    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`bincode::Error`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from bincode.
    ///
    /// # Errors
    ///
    /// Returns [`bincode::Error`] if the payload is not a `SpikeMessage`.
    pub fn decode(payload: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_is_the_bare_product_id() {
        assert_eq!(SpikeMessage::now(ProductId::new(31)).key(), "31");
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(SpikeMessage::decode(&[1, 2]).is_err());
    }

    #[test]
    fn encoded_message_decodes() {
        let message = SpikeMessage::now(ProductId::new(5));
        let decoded = SpikeMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }
}
