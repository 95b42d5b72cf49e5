/// Data-driven entity categorization for the snapshot layer.
///
/// The table maps engine type strings to row categories; extending the
/// snapshot to a new entity family means adding a table entry, not touching
/// the snapshot core.
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Entities,
    Belts,
    Pipes,
    Poles,
    Resources,
    Trees,
    Water,
    EntityStatus,
    Inventory,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Entities => "entities",
            Category::Belts => "belts",
            Category::Pipes => "pipes",
            Category::Poles => "poles",
            Category::Resources => "resources",
            Category::Trees => "trees",
            Category::Water => "water",
            Category::EntityStatus => "entity_status",
            Category::Inventory => "inventory",
        }
    }

    /// Categories refreshed incrementally from action post-run.
    pub const COMPONENT: [Category; 6] = [
        Category::Entities,
        Category::Belts,
        Category::Pipes,
        Category::Poles,
        Category::Resources,
        Category::Trees,
    ];

    /// Fixed CSV headers, declared in the export metadata and never
    /// inferred downstream.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Category::Entities => &[
                "position_x",
                "position_y",
                "entity_name",
                "entity_type",
                "direction",
                "recipe",
                "pickup_x",
                "pickup_y",
                "drop_x",
                "drop_y",
                "pickup_unit",
                "drop_unit",
                "bbox_min_x",
                "bbox_min_y",
                "bbox_max_x",
                "bbox_max_y",
                "unit_id",
            ],
            Category::Belts => &[
                "position_x",
                "position_y",
                "entity_name",
                "direction",
                "line_contents",
                "input_units",
                "output_units",
                "underground_type",
                "paired_unit",
            ],
            Category::Pipes => &[
                "position_x",
                "position_y",
                "entity_name",
                "input_units",
                "output_units",
            ],
            Category::Poles => &["position_x", "position_y", "entity_name", "direction"],
            Category::Resources => &["position_x", "position_y", "resource_name", "amount"],
            Category::Trees => &["position_x", "position_y", "tree_name"],
            Category::Water => &["position_x", "position_y", "tile_name"],
            Category::EntityStatus => &[
                "position_x",
                "position_y",
                "entity_name",
                "status",
                "status_name",
                "health",
                "tick",
            ],
            Category::Inventory => &[
                "position_x",
                "position_y",
                "entity_name",
                "inventory_kind",
                "contents",
            ],
        }
    }
}

lazy_static! {
    /// Engine type string → component category.
    static ref CATEGORY_TABLE: BTreeMap<&'static str, Category> = {
        let mut table = BTreeMap::new();
        for kind in [
            "transport-belt",
            "underground-belt",
            "splitter",
            "loader",
            "loader-1x1",
            "linked-belt",
        ] {
            table.insert(kind, Category::Belts);
        }
        for kind in ["pipe", "pipe-to-ground"] {
            table.insert(kind, Category::Pipes);
        }
        for kind in ["electric-pole", "power-switch", "substation"] {
            table.insert(kind, Category::Poles);
        }
        table.insert("resource", Category::Resources);
        table.insert("tree", Category::Trees);
        table
    };
}

/// Component category for an engine type string. Everything not named in
/// the table (assemblers, furnaces, drills, labs, inserters, chests, ...)
/// lands in `entities`.
pub fn categorize(kind: &str) -> Category {
    CATEGORY_TABLE.get(kind).copied().unwrap_or(Category::Entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_routing() {
        assert_eq!(categorize("transport-belt"), Category::Belts);
        assert_eq!(categorize("linked-belt"), Category::Belts);
        assert_eq!(categorize("pipe-to-ground"), Category::Pipes);
        assert_eq!(categorize("substation"), Category::Poles);
        assert_eq!(categorize("resource"), Category::Resources);
        assert_eq!(categorize("tree"), Category::Trees);
        assert_eq!(categorize("assembling-machine"), Category::Entities);
        assert_eq!(categorize("made-up-kind"), Category::Entities);
    }

    #[test]
    fn test_headers_are_nonempty_and_start_with_position() {
        for category in [
            Category::Entities,
            Category::Belts,
            Category::Pipes,
            Category::Poles,
            Category::Resources,
            Category::Trees,
            Category::Water,
            Category::EntityStatus,
            Category::Inventory,
        ] {
            let headers = category.headers();
            assert!(headers.len() >= 3, "{} too narrow", category.name());
            assert_eq!(headers[0], "position_x");
            assert_eq!(headers[1], "position_y");
        }
    }
}
