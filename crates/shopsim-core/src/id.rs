use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a processing resource (machine, inspection station, ...).
    pub struct ServerId;

    /// Identifies a job flowing through the shop.
    pub struct JobId;

    /// Identifies a warehouse store.
    pub struct StoreId;

    /// Identifies an automated guided vehicle.
    pub struct AgvId;
}

/// Identifies a product (SKU) held in warehouse inventory. Cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u32);

/// Identifies a job family (shared routing/demand profile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FamilyId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_equality() {
        assert_eq!(ProductId(0), ProductId(0));
        assert_ne!(ProductId(0), ProductId(1));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ProductId(0), "casting");
        map.insert(ProductId(1), "bracket");
        assert_eq!(map[&ProductId(0)], "casting");
    }
}
