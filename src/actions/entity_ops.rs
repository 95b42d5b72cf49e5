/// Entity placement, pickup, configuration and inventory transfer.
use bevy::math::Vec2;
use bevy::prelude::*;
use serde_json::json;

use crate::agents::{resolve_agent, Agent, AgentInventory, AgentPosition};
use crate::errors::{ActionError, ActionResult};
use crate::params::{ParamInstance, ParamKind, ParamSpec};
use crate::types::Direction;
use crate::world::entity_map::{
    remove_placed, spawn_placed, CrafterConfig, EntityInventories, GroundSpills, WorldIndex,
};
use crate::world::inventory::InventoryKind;
use crate::world::PrototypeCatalog;

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![
        Box::new(EntityPlace),
        Box::new(EntityPick),
        Box::new(EntityRecipeSet),
        Box::new(InventorySetItem),
        Box::new(InventoryGetItem),
        Box::new(InventoryView),
    ]
}

fn agent_reach(world: &World, entity: Entity) -> f32 {
    world
        .get::<Agent>(entity)
        .map(|a| a.reach_distance)
        .unwrap_or(crate::agents::DEFAULT_REACH_DISTANCE)
}

/// Resolve the target entity: exact `(position, name)` when a position is
/// given, otherwise the nearest entity of that name within reach.
fn find_target(
    world: &World,
    agent_pos: Vec2,
    reach: f32,
    entity_name: &str,
    position: Option<Vec2>,
) -> ActionResult<(Vec2, Entity)> {
    let index = world.resource::<WorldIndex>();
    match position {
        Some(position) => {
            let entity = index.get(position, entity_name).ok_or_else(|| {
                ActionError::map(
                    "ENTITY_NOT_FOUND",
                    format!("no {} at ({}, {})", entity_name, position.x, position.y),
                )
            })?;
            if agent_pos.distance(position) > reach + 0.1 {
                return Err(ActionError::map(
                    "OUT_OF_REACH",
                    format!("{} is beyond reach {}", entity_name, reach),
                ));
            }
            Ok((position, entity))
        }
        None => index
            .rows_near(agent_pos, reach + 0.1)
            .into_iter()
            .find(|(_, name, _)| name == entity_name)
            .map(|(pos, _, entity)| (pos.to_vec2(), entity))
            .ok_or_else(|| {
                ActionError::map(
                    "ENTITY_NOT_FOUND",
                    format!("no {} within reach", entity_name),
                )
            }),
    }
}

fn parse_inventory_kind(name: &str) -> ActionResult<InventoryKind> {
    InventoryKind::ALL
        .into_iter()
        .find(|k| k.name() == name)
        .ok_or_else(|| {
            ActionError::validation(
                "UNKNOWN_INVENTORY",
                format!("'{}' is not an inventory kind", name),
            )
        })
}

/// First present inventory kind in preference order.
fn pick_kind(
    inventories: &EntityInventories,
    preference: &[InventoryKind],
) -> Option<InventoryKind> {
    preference
        .iter()
        .copied()
        .find(|k| inventories.get(*k).is_some())
}

struct EntityPlace;

impl ActionSpec for EntityPlace {
    fn name(&self) -> &'static str {
        "entity.place"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("entity_name", ParamKind::EntityName)
            .required("position", ParamKind::Position)
            .optional("direction", ParamKind::String, json!("n"))
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let entity_name = params.get_str("entity_name")?.to_string();
        let position = params.get_position("position")?;
        let direction_name = params.get_str("direction")?;
        let direction = Direction::from_name(direction_name).ok_or_else(|| {
            ActionError::validation("BAD_DIRECTION", direction_name)
        })?;

        let agent_entity = resolve_agent(world, agent_id)?;
        let agent_pos = world
            .get::<AgentPosition>(agent_entity)
            .map(|p| p.pos)
            .unwrap_or_default();
        if agent_pos.distance(position) > agent_reach(world, agent_entity) + 0.1 {
            return Err(ActionError::map("OUT_OF_REACH", "placement beyond reach"));
        }

        // The item leaves the hand only if the placement lands.
        let removed = world
            .get_mut::<AgentInventory>(agent_entity)
            .map(|mut inv| inv.0.remove(&entity_name, 1))
            .unwrap_or(0);
        if removed == 0 {
            return Err(ActionError::resource(
                "ITEM_MISSING",
                format!("agent {} holds no {}", agent_id, entity_name),
            ));
        }
        match spawn_placed(world, &entity_name, position, direction) {
            Ok(_) => Ok(RunOutput::sync(json!({
                "entity_name": entity_name,
                "position": {"x": position.x, "y": position.y},
            }))
            .with_agent(agent_id)
            .with_affected(position, &entity_name)),
            Err(err) => {
                // Refund on failure.
                world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| {
                    if let Some(mut inv) = world.get_mut::<AgentInventory>(agent_entity) {
                        inv.0.insert(&entity_name, 1, &catalog);
                    }
                });
                Err(err)
            }
        }
    }
}

struct EntityPick;

impl ActionSpec for EntityPick {
    fn name(&self) -> &'static str {
        "entity.pick"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("entity_name", ParamKind::EntityName)
            .opt("position", ParamKind::Position)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let entity_name = params.get_str("entity_name")?.to_string();
        let position = params.opt_position("position")?;

        let agent_entity = resolve_agent(world, agent_id)?;
        let agent_pos = world
            .get::<AgentPosition>(agent_entity)
            .map(|p| p.pos)
            .unwrap_or_default();
        let reach = agent_reach(world, agent_entity);
        let (position, target) =
            find_target(world, agent_pos, reach, &entity_name, position)?;

        // Everything the entity would yield: its own item plus inventory
        // contents.
        let mut yields: Vec<(String, u32)> = {
            let catalog = world.resource::<PrototypeCatalog>();
            catalog
                .entity(&entity_name)
                .map(|p| {
                    p.minable_products
                        .iter()
                        .map(|prod| (prod.item.clone(), prod.count))
                        .collect()
                })
                .unwrap_or_default()
        };
        if let Some(inventories) = world.get::<EntityInventories>(target) {
            for kind in InventoryKind::ALL {
                if let Some(inventory) = inventories.get(kind) {
                    for (item, count) in inventory.contents() {
                        yields.push((item.clone(), *count));
                    }
                }
            }
        }

        remove_placed(world, position, &entity_name)?;

        let mut received: std::collections::BTreeMap<String, u32> = Default::default();
        world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| {
            let mut spill = Vec::new();
            if let Some(mut inv) = world.get_mut::<AgentInventory>(agent_entity) {
                for (item, count) in &yields {
                    let accepted = inv.0.insert(item, *count, &catalog);
                    *received.entry(item.clone()).or_insert(0) += accepted;
                    if accepted < *count {
                        spill.push((item.clone(), count - accepted));
                    }
                }
            }
            let mut spills = world.resource_mut::<GroundSpills>();
            for (item, count) in spill {
                spills.spill(agent_pos, &item, count);
            }
        });

        Ok(RunOutput::sync(json!({
            "entity_name": entity_name,
            "received": received,
        }))
        .with_agent(agent_id)
        .with_removed(position, &entity_name))
    }
}

struct EntityRecipeSet;

impl ActionSpec for EntityRecipeSet {
    fn name(&self) -> &'static str {
        "entity.recipe.set"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("entity_name", ParamKind::EntityName)
            .required("recipe", ParamKind::Recipe)
            .opt("position", ParamKind::Position)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let entity_name = params.get_str("entity_name")?.to_string();
        let recipe = params.get_str("recipe")?.to_string();
        let position = params.opt_position("position")?;

        let agent_entity = resolve_agent(world, agent_id)?;
        let agent_pos = world
            .get::<AgentPosition>(agent_entity)
            .map(|p| p.pos)
            .unwrap_or_default();
        let reach = agent_reach(world, agent_entity);
        let (position, target) =
            find_target(world, agent_pos, reach, &entity_name, position)?;

        let mut config = world.get_mut::<CrafterConfig>(target).ok_or_else(|| {
            ActionError::logical(
                "NOT_A_CRAFTER",
                format!("{} does not take a recipe", entity_name),
            )
        })?;
        config.recipe = Some(recipe.clone());

        Ok(RunOutput::sync(json!({
            "entity_name": entity_name,
            "recipe": recipe,
        }))
        .with_agent(agent_id)
        .with_affected(position, &entity_name))
    }
}

/// Shared transfer core. `into_entity` moves agent → entity, otherwise
/// entity → agent.
fn transfer_items(
    world: &mut World,
    params: &ParamInstance,
    into_entity: bool,
) -> ActionResult<RunOutput> {
    let agent_id = params.get_u32("agent_id")?;
    let entity_name = params.get_str("entity_name")?.to_string();
    let position = params.opt_position("position")?;
    let stacks = params.get_item_stacks("items")?;
    let kind_override = params.opt_str("inventory")?.map(str::to_string);

    let agent_entity = resolve_agent(world, agent_id)?;
    let agent_pos = world
        .get::<AgentPosition>(agent_entity)
        .map(|p| p.pos)
        .unwrap_or_default();
    let reach = agent_reach(world, agent_entity);
    let (position, target) = find_target(world, agent_pos, reach, &entity_name, position)?;

    let kind = match kind_override {
        Some(name) => parse_inventory_kind(&name)?,
        None => {
            let preference: &[InventoryKind] = if into_entity {
                &[InventoryKind::Chest, InventoryKind::Input, InventoryKind::Fuel]
            } else {
                &[
                    InventoryKind::Output,
                    InventoryKind::Chest,
                    InventoryKind::Input,
                    InventoryKind::Fuel,
                ]
            };
            world
                .get::<EntityInventories>(target)
                .and_then(|inv| pick_kind(inv, preference))
                .ok_or_else(|| {
                    ActionError::logical(
                        "NO_INVENTORY",
                        format!("{} exposes no inventory", entity_name),
                    )
                })?
        }
    };

    let mut moved = serde_json::Map::new();
    let mut available_total = 0u32;
    let mut moved_total = 0u32;
    world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| -> ActionResult<()> {
        for stack in &stacks {
            let stack_size = catalog.stack_size(&stack.name);

            let available = if into_entity {
                world
                    .get::<AgentInventory>(agent_entity)
                    .map(|inv| inv.0.count_of(&stack.name))
                    .unwrap_or(0)
            } else {
                world
                    .get::<EntityInventories>(target)
                    .and_then(|inv| inv.get(kind))
                    .map(|inv| inv.count_of(&stack.name))
                    .unwrap_or(0)
            };
            available_total += available;
            let want = stack.count.resolve(stack_size, available).min(available);
            if want == 0 {
                moved.insert(stack.name.clone(), json!(0));
                continue;
            }

            let accepted = if into_entity {
                let mut inventories = world
                    .get_mut::<EntityInventories>(target)
                    .ok_or_else(|| ActionError::logical("NO_INVENTORY", &entity_name))?;
                let inventory = inventories.get_mut(kind).ok_or_else(|| {
                    ActionError::logical("NO_INVENTORY", format!("{:?} missing", kind))
                })?;
                inventory.insert(&stack.name, want, &catalog)
            } else {
                world
                    .get_mut::<AgentInventory>(agent_entity)
                    .map(|mut inv| inv.0.insert(&stack.name, want, &catalog))
                    .unwrap_or(0)
            };

            if accepted > 0 {
                if into_entity {
                    if let Some(mut inv) = world.get_mut::<AgentInventory>(agent_entity) {
                        inv.0.remove(&stack.name, accepted);
                    }
                } else if let Some(mut inventories) =
                    world.get_mut::<EntityInventories>(target)
                {
                    if let Some(inventory) = inventories.get_mut(kind) {
                        inventory.remove(&stack.name, accepted);
                    }
                }
            }
            moved_total += accepted;
            moved.insert(stack.name.clone(), json!(accepted));
        }
        Ok(())
    })?;

    if moved_total == 0 {
        return Err(if available_total == 0 {
            ActionError::resource("ITEMS_MISSING", "nothing available to transfer")
        } else {
            ActionError::capacity("NO_SPACE", "receiving inventory is full")
        });
    }

    Ok(RunOutput::sync(json!({
        "entity_name": entity_name,
        "inventory": kind.name(),
        "moved": moved,
    }))
    .with_agent(agent_id)
    .with_affected(position, &entity_name))
}

struct InventorySetItem;

impl ActionSpec for InventorySetItem {
    fn name(&self) -> &'static str {
        "entity.inventory.set_item"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("entity_name", ParamKind::EntityName)
            .required("items", ParamKind::ItemStack)
            .opt("position", ParamKind::Position)
            .opt("inventory", ParamKind::String)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        transfer_items(world, params, true)
    }
}

struct InventoryGetItem;

impl ActionSpec for InventoryGetItem {
    fn name(&self) -> &'static str {
        "entity.inventory.get_item"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("entity_name", ParamKind::EntityName)
            .required("items", ParamKind::ItemStack)
            .opt("position", ParamKind::Position)
            .opt("inventory", ParamKind::String)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        transfer_items(world, params, false)
    }
}

/// Non-mutating query: every non-empty inventory of the target entity.
struct InventoryView;

impl ActionSpec for InventoryView {
    fn name(&self) -> &'static str {
        "entity.inventory.view"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("entity_name", ParamKind::EntityName)
            .opt("position", ParamKind::Position)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let entity_name = params.get_str("entity_name")?.to_string();
        let position = params.opt_position("position")?;

        let agent_entity = resolve_agent(world, agent_id)?;
        let agent_pos = world
            .get::<AgentPosition>(agent_entity)
            .map(|p| p.pos)
            .unwrap_or_default();
        let reach = agent_reach(world, agent_entity);
        let (position, _) = find_target(world, agent_pos, reach, &entity_name, position)?;

        let view = crate::snapshot::inventory_view(world, position, &entity_name)
            .unwrap_or(serde_json::Value::Object(Default::default()));
        Ok(RunOutput::sync(json!({
            "entity_name": entity_name,
            "position": {"x": position.x, "y": position.y},
            "inventories": view,
        }))
        .with_agent(agent_id))
    }
}
