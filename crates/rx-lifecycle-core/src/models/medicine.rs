//! Medicine line items attached to a prescription.

use serde::{Deserialize, Serialize};

/// A medicine captured with a prescription, used to prefill the cart on reorder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicineLineItem {
    /// Storefront product ID
    pub product_id: String,
    /// Display name
    pub name: String,
    /// Quantity to add to the cart
    pub quantity: u32,
}

impl MedicineLineItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            quantity,
        }
    }
}
