/// Prototype catalog: the static data the host engine exposes about
/// entities, items, recipes and technologies.
///
/// The catalog is plain serde data so alternative catalogs can be loaded
/// from RON; the built-in default covers the vanilla names exercised by the
/// action runtime and its tests.
use std::collections::BTreeMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// One product of mining an entity or finishing a craft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub item: String,
    pub count: u32,
}

impl ProductSpec {
    pub fn new<S: Into<String>>(item: S, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}

/// Static description of a placeable/minable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPrototype {
    pub name: String,
    /// Engine type string ("resource", "tree", "transport-belt", ...),
    /// the key the snapshot categorization table dispatches on.
    pub kind: String,
    /// Seconds of hand-mining per swing.
    pub mining_time: f32,
    pub minable_products: Vec<ProductSpec>,
    /// Resources that need a fluid cannot be hand-mined.
    pub requires_fluid: bool,
    /// Whether the entity blocks walking.
    pub collides: bool,
    /// Whether a recipe can be configured on it.
    pub accepts_recipe: bool,
    pub max_health: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPrototype {
    pub name: String,
    pub stack_size: u32,
    /// Entity spawned when the item is placed, if any.
    pub places: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipePrototype {
    pub name: String,
    pub ingredients: Vec<ProductSpec>,
    pub products: Vec<ProductSpec>,
    /// Ticks of hand-crafting per item.
    pub craft_ticks: u32,
    pub enabled_from_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyPrototype {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub unlocks_recipes: Vec<String>,
}

/// Read-only prototype tables, indexed by name.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeCatalog {
    pub entities: BTreeMap<String, EntityPrototype>,
    pub items: BTreeMap<String, ItemPrototype>,
    pub recipes: BTreeMap<String, RecipePrototype>,
    pub technologies: BTreeMap<String, TechnologyPrototype>,
}

impl PrototypeCatalog {
    pub fn entity(&self, name: &str) -> Option<&EntityPrototype> {
        self.entities.get(name)
    }

    pub fn item(&self, name: &str) -> Option<&ItemPrototype> {
        self.items.get(name)
    }

    pub fn recipe(&self, name: &str) -> Option<&RecipePrototype> {
        self.recipes.get(name)
    }

    pub fn technology(&self, name: &str) -> Option<&TechnologyPrototype> {
        self.technologies.get(name)
    }

    pub fn stack_size(&self, item: &str) -> u32 {
        self.items.get(item).map(|i| i.stack_size).unwrap_or(50)
    }

    pub fn is_known_item(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }
}

/// Per-force progression state: which recipes are enabled and what is being
/// researched.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct ForceState {
    pub name: String,
    pub enabled_recipes: std::collections::BTreeSet<String>,
    pub researched: std::collections::BTreeSet<String>,
    pub current_research: Option<String>,
    pub research_progress: f64,
}

impl ForceState {
    pub fn new(catalog: &PrototypeCatalog) -> Self {
        let enabled_recipes = catalog
            .recipes
            .values()
            .filter(|r| r.enabled_from_start)
            .map(|r| r.name.clone())
            .collect();
        Self {
            name: "player".to_string(),
            enabled_recipes,
            researched: Default::default(),
            current_research: None,
            research_progress: 0.0,
        }
    }

    pub fn recipe_enabled(&self, name: &str) -> bool {
        self.enabled_recipes.contains(name)
    }
}

fn entity(
    name: &str,
    kind: &str,
    mining_time: f32,
    products: Vec<ProductSpec>,
    collides: bool,
) -> EntityPrototype {
    EntityPrototype {
        name: name.to_string(),
        kind: kind.to_string(),
        mining_time,
        minable_products: products,
        requires_fluid: false,
        collides,
        accepts_recipe: false,
        max_health: 100.0,
    }
}

fn item(name: &str, stack_size: u32, places: Option<&str>) -> ItemPrototype {
    ItemPrototype {
        name: name.to_string(),
        stack_size,
        places: places.map(str::to_string),
    }
}

fn recipe(
    name: &str,
    ingredients: Vec<ProductSpec>,
    products: Vec<ProductSpec>,
    craft_ticks: u32,
) -> RecipePrototype {
    RecipePrototype {
        name: name.to_string(),
        ingredients,
        products,
        craft_ticks,
        enabled_from_start: true,
    }
}

impl Default for PrototypeCatalog {
    fn default() -> Self {
        let mut entities = BTreeMap::new();
        let mut items = BTreeMap::new();
        let mut recipes = BTreeMap::new();
        let mut technologies = BTreeMap::new();

        // Resources. Ore deposits do not collide so a character can stand on
        // the patch while mining.
        for ore in ["iron-ore", "copper-ore", "coal", "stone"] {
            entities.insert(
                ore.to_string(),
                entity(ore, "resource", 1.0, vec![ProductSpec::new(ore, 1)], false),
            );
            items.insert(ore.to_string(), item(ore, 50, None));
        }
        let mut crude = entity("crude-oil", "resource", 1.0, vec![], false);
        crude.requires_fluid = true;
        entities.insert("crude-oil".to_string(), crude);

        entities.insert(
            "tree-01".to_string(),
            entity(
                "tree-01",
                "tree",
                0.5,
                vec![ProductSpec::new("wood", 4)],
                true,
            ),
        );
        items.insert("wood".to_string(), item("wood", 100, None));

        // Placeable machinery and logistics.
        let placeables: &[(&str, &str)] = &[
            ("transport-belt", "transport-belt"),
            ("underground-belt", "underground-belt"),
            ("splitter", "splitter"),
            ("pipe", "pipe"),
            ("pipe-to-ground", "pipe-to-ground"),
            ("small-electric-pole", "electric-pole"),
            ("substation", "substation"),
            ("power-switch", "power-switch"),
            ("burner-mining-drill", "mining-drill"),
            ("stone-furnace", "furnace"),
            ("assembling-machine-1", "assembling-machine"),
            ("inserter", "inserter"),
            ("wooden-chest", "container"),
            ("lab", "lab"),
        ];
        for (name, kind) in placeables {
            let mut proto = entity(
                name,
                kind,
                0.3,
                vec![ProductSpec::new(*name, 1)],
                true,
            );
            proto.accepts_recipe =
                matches!(*kind, "assembling-machine" | "furnace");
            entities.insert(name.to_string(), proto);
            items.insert(name.to_string(), item(name, 50, Some(name)));
        }

        // Intermediate items.
        items.insert("iron-plate".to_string(), item("iron-plate", 100, None));
        items.insert("copper-plate".to_string(), item("copper-plate", 100, None));
        items.insert(
            "iron-gear-wheel".to_string(),
            item("iron-gear-wheel", 100, None),
        );
        items.insert(
            "copper-cable".to_string(),
            item("copper-cable", 200, None),
        );
        items.insert(
            "electronic-circuit".to_string(),
            item("electronic-circuit", 200, None),
        );
        items.insert(
            "automation-science-pack".to_string(),
            item("automation-science-pack", 200, None),
        );

        recipes.insert(
            "iron-gear-wheel".to_string(),
            recipe(
                "iron-gear-wheel",
                vec![ProductSpec::new("iron-plate", 2)],
                vec![ProductSpec::new("iron-gear-wheel", 1)],
                30,
            ),
        );
        recipes.insert(
            "copper-cable".to_string(),
            recipe(
                "copper-cable",
                vec![ProductSpec::new("copper-plate", 1)],
                vec![ProductSpec::new("copper-cable", 2)],
                30,
            ),
        );
        recipes.insert(
            "electronic-circuit".to_string(),
            recipe(
                "electronic-circuit",
                vec![
                    ProductSpec::new("iron-plate", 1),
                    ProductSpec::new("copper-cable", 3),
                ],
                vec![ProductSpec::new("electronic-circuit", 1)],
                30,
            ),
        );
        recipes.insert(
            "transport-belt".to_string(),
            recipe(
                "transport-belt",
                vec![
                    ProductSpec::new("iron-plate", 1),
                    ProductSpec::new("iron-gear-wheel", 1),
                ],
                vec![ProductSpec::new("transport-belt", 2)],
                30,
            ),
        );
        recipes.insert(
            "automation-science-pack".to_string(),
            recipe(
                "automation-science-pack",
                vec![
                    ProductSpec::new("copper-plate", 1),
                    ProductSpec::new("iron-gear-wheel", 1),
                ],
                vec![ProductSpec::new("automation-science-pack", 1)],
                300,
            ),
        );
        let mut logistics_2 = recipe(
            "fast-transport-belt",
            vec![
                ProductSpec::new("iron-gear-wheel", 5),
                ProductSpec::new("transport-belt", 1),
            ],
            vec![ProductSpec::new("fast-transport-belt", 1)],
            30,
        );
        logistics_2.enabled_from_start = false;
        recipes.insert("fast-transport-belt".to_string(), logistics_2);
        items.insert(
            "fast-transport-belt".to_string(),
            item("fast-transport-belt", 50, None),
        );

        technologies.insert(
            "automation".to_string(),
            TechnologyPrototype {
                name: "automation".to_string(),
                prerequisites: vec![],
                unlocks_recipes: vec![],
            },
        );
        technologies.insert(
            "logistics".to_string(),
            TechnologyPrototype {
                name: "logistics".to_string(),
                prerequisites: vec![],
                unlocks_recipes: vec!["fast-transport-belt".to_string()],
            },
        );
        technologies.insert(
            "logistics-2".to_string(),
            TechnologyPrototype {
                name: "logistics-2".to_string(),
                prerequisites: vec!["logistics".to_string()],
                unlocks_recipes: vec![],
            },
        );

        Self {
            entities,
            items,
            recipes,
            technologies,
        }
    }
}
