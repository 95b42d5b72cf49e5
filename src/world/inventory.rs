/// Slot-bounded inventories with stack-size-aware accounting.
///
/// The model mirrors the host engine: an inventory has a fixed number of
/// slots, each slot holds one item kind up to that item's stack size.
/// `insert` returns the accepted count so callers can spill the remainder.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::prototypes::PrototypeCatalog;

/// Symbolic or literal item count accepted by inventory transfer actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackCount {
    Exact(u32),
    Max,
    FullStack,
    HalfStack,
}

impl StackCount {
    /// Parse the wire form: a number, or one of the `"MAX"`,
    /// `"FULL-STACK"`, `"HALF-STACK"` literals.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                let n = n.as_u64()?;
                u32::try_from(n).ok().map(StackCount::Exact)
            }
            serde_json::Value::String(s) => match s.as_str() {
                "MAX" => Some(StackCount::Max),
                "FULL-STACK" => Some(StackCount::FullStack),
                "HALF-STACK" => Some(StackCount::HalfStack),
                _ => None,
            },
            _ => None,
        }
    }

    /// Resolve against the item's stack size and the count actually
    /// available on the giving side.
    pub fn resolve(self, stack_size: u32, available: u32) -> u32 {
        match self {
            StackCount::Exact(n) => n,
            StackCount::Max => available,
            StackCount::FullStack => stack_size,
            StackCount::HalfStack => (stack_size / 2).max(1),
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        match self {
            StackCount::Exact(n) => serde_json::json!(n),
            StackCount::Max => serde_json::json!("MAX"),
            StackCount::FullStack => serde_json::json!("FULL-STACK"),
            StackCount::HalfStack => serde_json::json!("HALF-STACK"),
        }
    }
}

/// One requested transfer, as decoded from an `item_stack` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStackRequest {
    pub name: String,
    pub count: StackCount,
}

/// The inventory kinds an entity may expose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    Chest,
    Fuel,
    BurntResult,
    Input,
    Output,
    Modules,
    Ammo,
    Trunk,
    Cargo,
}

impl InventoryKind {
    pub const ALL: [InventoryKind; 9] = [
        InventoryKind::Chest,
        InventoryKind::Fuel,
        InventoryKind::BurntResult,
        InventoryKind::Input,
        InventoryKind::Output,
        InventoryKind::Modules,
        InventoryKind::Ammo,
        InventoryKind::Trunk,
        InventoryKind::Cargo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InventoryKind::Chest => "chest",
            InventoryKind::Fuel => "fuel",
            InventoryKind::BurntResult => "burnt_result",
            InventoryKind::Input => "input",
            InventoryKind::Output => "output",
            InventoryKind::Modules => "modules",
            InventoryKind::Ammo => "ammo",
            InventoryKind::Trunk => "trunk",
            InventoryKind::Cargo => "cargo",
        }
    }
}

/// A slot-bounded item container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: u32,
    items: BTreeMap<String, u32>,
}

impl Inventory {
    pub fn new(slots: u32) -> Self {
        Self {
            slots,
            items: BTreeMap::new(),
        }
    }

    pub fn count_of(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Non-empty contents in deterministic (name-sorted) order.
    pub fn contents(&self) -> &BTreeMap<String, u32> {
        &self.items
    }

    /// Sum of counts across a set of item names. Used by the mining delta
    /// accounting.
    pub fn total_of<'a, I: IntoIterator<Item = &'a str>>(&self, names: I) -> u32 {
        names.into_iter().map(|n| self.count_of(n)).sum()
    }

    fn slots_used(&self, catalog: &PrototypeCatalog) -> u32 {
        self.items
            .iter()
            .map(|(name, count)| count.div_ceil(catalog.stack_size(name)))
            .sum()
    }

    /// How many of `item` would fit right now.
    pub fn space_for(&self, item: &str, catalog: &PrototypeCatalog) -> u32 {
        let stack = catalog.stack_size(item);
        let used = self.slots_used(catalog);
        let free_slots = self.slots.saturating_sub(used);
        // Room left in the item's own partially-filled top stack.
        let have = self.count_of(item);
        let partial = if have % stack == 0 { 0 } else { stack - have % stack };
        partial + free_slots * stack
    }

    /// Insert up to `count`, returning how many were accepted.
    pub fn insert(&mut self, item: &str, count: u32, catalog: &PrototypeCatalog) -> u32 {
        let accepted = count.min(self.space_for(item, catalog));
        if accepted > 0 {
            *self.items.entry(item.to_string()).or_insert(0) += accepted;
        }
        accepted
    }

    /// Remove up to `count`, returning how many were actually removed.
    pub fn remove(&mut self, item: &str, count: u32) -> u32 {
        match self.items.get_mut(item) {
            Some(have) => {
                let removed = count.min(*have);
                *have -= removed;
                if *have == 0 {
                    self.items.remove(item);
                }
                removed
            }
            None => 0,
        }
    }

    /// Whether every `(item, count)` pair is present.
    pub fn has_all(&self, needs: &[(String, u32)]) -> bool {
        needs.iter().all(|(item, count)| self.count_of(item) >= *count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PrototypeCatalog {
        PrototypeCatalog::default()
    }

    #[test]
    fn test_insert_respects_slot_capacity() {
        let catalog = catalog();
        let mut inv = Inventory::new(2); // 2 slots of iron-plate = 200
        assert_eq!(inv.insert("iron-plate", 150, &catalog), 150);
        assert_eq!(inv.insert("iron-plate", 100, &catalog), 50);
        assert_eq!(inv.count_of("iron-plate"), 200);
    }

    #[test]
    fn test_partial_stack_still_accepts() {
        let catalog = catalog();
        let mut inv = Inventory::new(1);
        assert_eq!(inv.insert("iron-ore", 30, &catalog), 30); // stack 50
        assert_eq!(inv.insert("iron-ore", 30, &catalog), 20);
        // Slot is full now; a second item kind has nowhere to go.
        assert_eq!(inv.insert("coal", 1, &catalog), 0);
    }

    #[test]
    fn test_remove_clears_empty_entries() {
        let catalog = catalog();
        let mut inv = Inventory::new(4);
        inv.insert("coal", 10, &catalog);
        assert_eq!(inv.remove("coal", 25), 10);
        assert!(inv.is_empty());
    }

    #[test]
    fn test_stack_count_parsing() {
        assert_eq!(
            StackCount::from_json(&serde_json::json!(5)),
            Some(StackCount::Exact(5))
        );
        assert_eq!(
            StackCount::from_json(&serde_json::json!("MAX")),
            Some(StackCount::Max)
        );
        assert_eq!(
            StackCount::from_json(&serde_json::json!("HALF-STACK")),
            Some(StackCount::HalfStack)
        );
        assert_eq!(StackCount::from_json(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_stack_count_resolution() {
        assert_eq!(StackCount::Max.resolve(50, 37), 37);
        assert_eq!(StackCount::FullStack.resolve(50, 999), 50);
        assert_eq!(StackCount::HalfStack.resolve(50, 999), 25);
        assert_eq!(StackCount::Exact(7).resolve(50, 999), 7);
    }
}
