//! Typed parameter schemas for actions.
//!
//! A `ParamSpec` declares the fields an action accepts; a `ParamInstance`
//! binds decoded JSON values to that schema. Instances start out
//! unvalidated and stay unusable until `validate` has applied defaults and
//! kind checks; any later mutation marks them dirty again, so an action body
//! can never observe half-checked input.

use std::collections::BTreeMap;

use bevy::math::Vec2;
use serde_json::Value;

use crate::errors::{ActionError, ActionResult};
use crate::world::inventory::{ItemStackRequest, StackCount};
use crate::world::prototypes::{ForceState, PrototypeCatalog};

/// Domain of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    String,
    Boolean,
    Mapping,
    Any,
    /// Mapping with real `x`, `y` members.
    Position,
    /// String keyed in the live entity prototype catalog.
    EntityName,
    /// String naming a recipe enabled for the acting force.
    Recipe,
    /// Ordered sequence of `{name, count|"MAX"|"FULL-STACK"|"HALF-STACK"}`.
    ItemStack,
}

#[derive(Debug, Clone)]
pub struct ParamField {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

/// Ordered field schema for one action.
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    fields: Vec<ParamField>,
}

impl ParamSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, kind: ParamKind) -> Self {
        self.fields.push(ParamField {
            name,
            kind,
            required: true,
            default: None,
        });
        self
    }

    /// Optional field that receives `default` when absent.
    pub fn optional(mut self, name: &'static str, kind: ParamKind, default: Value) -> Self {
        self.fields.push(ParamField {
            name,
            kind,
            required: false,
            default: Some(default),
        });
        self
    }

    /// Optional field with no default; absent stays absent.
    pub fn opt(mut self, name: &'static str, kind: ParamKind) -> Self {
        self.fields.push(ParamField {
            name,
            kind,
            required: false,
            default: None,
        });
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    fn field(&self, name: &str) -> Option<&ParamField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Catalog/force view needed by kind checks.
pub struct ValidationCtx<'a> {
    pub catalog: &'a PrototypeCatalog,
    pub force: &'a ForceState,
}

/// Values bound to a schema. Unusable until validated.
#[derive(Debug, Clone)]
pub struct ParamInstance {
    spec: ParamSpec,
    values: BTreeMap<String, Value>,
    validated: bool,
}

impl ParamInstance {
    /// Bind an already-decoded JSON object.
    pub fn from_value(spec: ParamSpec, value: Value) -> ActionResult<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                spec,
                values: map.into_iter().collect(),
                validated: false,
            }),
            Value::Null => Ok(Self {
                spec,
                values: BTreeMap::new(),
                validated: false,
            }),
            other => Err(ActionError::validation(
                "BAD_PARAMS",
                format!("expected a parameter mapping, got {}", kind_name(&other)),
            )),
        }
    }

    /// Decode a JSON string and bind it.
    pub fn from_json(spec: ParamSpec, raw: &str) -> ActionResult<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            ActionError::validation("BAD_JSON", format!("parameter decode failed: {}", e))
        })?;
        Self::from_value(spec, value)
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Apply defaults and kind checks. Must succeed before any getter or
    /// the action body may run.
    pub fn validate(&mut self, ctx: &ValidationCtx<'_>) -> ActionResult<()> {
        for key in self.values.keys() {
            if self.spec.field(key).is_none() {
                return Err(ActionError::validation(
                    "UNKNOWN_PARAM",
                    format!("unexpected parameter '{}'", key),
                ));
            }
        }

        for field in &self.spec.fields {
            match self.values.get(field.name) {
                None => {
                    if field.required {
                        return Err(ActionError::validation(
                            "MISSING_PARAM",
                            format!("missing required parameter '{}'", field.name),
                        ));
                    }
                    if let Some(default) = &field.default {
                        self.values
                            .insert(field.name.to_string(), default.clone());
                    }
                }
                Some(value) => check_kind(field.name, field.kind, value, ctx)?,
            }
        }

        self.validated = true;
        Ok(())
    }

    /// Overwrite a value; the instance must be re-validated before use.
    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
        self.validated = false;
    }

    /// Bound values as a JSON object (defaults included once validated).
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn ensure_validated(&self) -> ActionResult<()> {
        if self.validated {
            Ok(())
        } else {
            Err(ActionError::engine(
                "UNVALIDATED_PARAMS",
                "parameter instance accessed before validation",
            ))
        }
    }

    fn value(&self, name: &str) -> ActionResult<&Value> {
        self.ensure_validated()?;
        self.values.get(name).ok_or_else(|| {
            ActionError::validation("MISSING_PARAM", format!("parameter '{}' absent", name))
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_f64(&self, name: &str) -> ActionResult<f64> {
        self.value(name)?.as_f64().ok_or_else(|| bad_type(name, "number"))
    }

    pub fn get_f32(&self, name: &str) -> ActionResult<f32> {
        Ok(self.get_f64(name)? as f32)
    }

    pub fn get_u32(&self, name: &str) -> ActionResult<u32> {
        let n = self
            .value(name)?
            .as_u64()
            .ok_or_else(|| bad_type(name, "unsigned integer"))?;
        u32::try_from(n).map_err(|_| bad_type(name, "u32"))
    }

    pub fn get_u64(&self, name: &str) -> ActionResult<u64> {
        self.value(name)?
            .as_u64()
            .ok_or_else(|| bad_type(name, "unsigned integer"))
    }

    pub fn get_bool(&self, name: &str) -> ActionResult<bool> {
        self.value(name)?.as_bool().ok_or_else(|| bad_type(name, "boolean"))
    }

    pub fn get_str(&self, name: &str) -> ActionResult<&str> {
        self.value(name)?.as_str().ok_or_else(|| bad_type(name, "string"))
    }

    pub fn get_position(&self, name: &str) -> ActionResult<Vec2> {
        let value = self.value(name)?;
        position_of(value).ok_or_else(|| bad_type(name, "position {x, y}"))
    }

    pub fn get_item_stacks(&self, name: &str) -> ActionResult<Vec<ItemStackRequest>> {
        let value = self.value(name)?;
        parse_item_stacks(value).ok_or_else(|| bad_type(name, "item stack list"))
    }

    /// Optional getters: absent (no default) means `None`.
    pub fn opt_f32(&self, name: &str) -> ActionResult<Option<f32>> {
        self.ensure_validated()?;
        match self.values.get(name) {
            None => Ok(None),
            Some(_) => Ok(Some(self.get_f32(name)?)),
        }
    }

    pub fn opt_u32(&self, name: &str) -> ActionResult<Option<u32>> {
        self.ensure_validated()?;
        match self.values.get(name) {
            None => Ok(None),
            Some(_) => Ok(Some(self.get_u32(name)?)),
        }
    }

    pub fn opt_bool(&self, name: &str) -> ActionResult<Option<bool>> {
        self.ensure_validated()?;
        match self.values.get(name) {
            None => Ok(None),
            Some(_) => Ok(Some(self.get_bool(name)?)),
        }
    }

    pub fn opt_str(&self, name: &str) -> ActionResult<Option<&str>> {
        self.ensure_validated()?;
        match self.values.get(name) {
            None => Ok(None),
            Some(_) => Ok(Some(self.get_str(name)?)),
        }
    }

    pub fn opt_position(&self, name: &str) -> ActionResult<Option<Vec2>> {
        self.ensure_validated()?;
        match self.values.get(name) {
            None => Ok(None),
            Some(_) => Ok(Some(self.get_position(name)?)),
        }
    }
}

fn bad_type(name: &str, expected: &str) -> ActionError {
    ActionError::validation(
        "BAD_TYPE",
        format!("parameter '{}' is not a {}", name, expected),
    )
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

fn position_of(value: &Value) -> Option<Vec2> {
    let map = value.as_object()?;
    let x = map.get("x")?.as_f64()?;
    let y = map.get("y")?.as_f64()?;
    Some(Vec2::new(x as f32, y as f32))
}

fn parse_item_stacks(value: &Value) -> Option<Vec<ItemStackRequest>> {
    let list = value.as_array()?;
    let mut out = Vec::with_capacity(list.len());
    for entry in list {
        let map = entry.as_object()?;
        let name = map.get("name")?.as_str()?.to_string();
        let count = StackCount::from_json(map.get("count")?)?;
        out.push(ItemStackRequest { name, count });
    }
    Some(out)
}

fn check_kind(
    name: &str,
    kind: ParamKind,
    value: &Value,
    ctx: &ValidationCtx<'_>,
) -> ActionResult<()> {
    let ok = match kind {
        ParamKind::Number => value.is_number(),
        ParamKind::String => value.is_string(),
        ParamKind::Boolean => value.is_boolean(),
        ParamKind::Mapping => value.is_object(),
        ParamKind::Any => true,
        ParamKind::Position => position_of(value).is_some(),
        ParamKind::EntityName => {
            let entity = value.as_str().ok_or_else(|| bad_type(name, "string"))?;
            if ctx.catalog.entity(entity).is_none() {
                return Err(ActionError::validation(
                    "UNKNOWN_ENTITY",
                    format!("'{}' is not a known entity prototype", entity),
                ));
            }
            true
        }
        ParamKind::Recipe => {
            let recipe = value.as_str().ok_or_else(|| bad_type(name, "string"))?;
            if ctx.catalog.recipe(recipe).is_none() {
                return Err(ActionError::validation(
                    "UNKNOWN_RECIPE",
                    format!("'{}' is not a known recipe", recipe),
                ));
            }
            if !ctx.force.recipe_enabled(recipe) {
                return Err(ActionError::validation(
                    "RECIPE_DISABLED",
                    format!("recipe '{}' is not enabled for force {}", recipe, ctx.force.name),
                ));
            }
            true
        }
        ParamKind::ItemStack => {
            let stacks = parse_item_stacks(value)
                .ok_or_else(|| bad_type(name, "item stack list"))?;
            for stack in &stacks {
                if !ctx.catalog.is_known_item(&stack.name) {
                    return Err(ActionError::validation(
                        "UNKNOWN_ITEM",
                        format!("'{}' is not a known item", stack.name),
                    ));
                }
            }
            true
        }
    };
    if ok {
        Ok(())
    } else {
        Err(bad_type(name, kind_desc(kind)))
    }
}

fn kind_desc(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Number => "number",
        ParamKind::String => "string",
        ParamKind::Boolean => "boolean",
        ParamKind::Mapping => "mapping",
        ParamKind::Any => "value",
        ParamKind::Position => "position {x, y}",
        ParamKind::EntityName => "entity name",
        ParamKind::Recipe => "recipe name",
        ParamKind::ItemStack => "item stack list",
    }
}
