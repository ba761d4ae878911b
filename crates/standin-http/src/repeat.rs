//! Repeat Expander: synthesizes repeated nested structures from a compact
//! declaration.
//!
//! A list of `{name, count}` items with dotted names builds a tree of repeat
//! nodes (`"a.b.c"` implies node `a` -> child `b` -> child `c`). Execution
//! renders the base response unit once per count at every level, extracts the
//! sub-value carrying each node's name, and concatenates the batches. The
//! pseudo-name `root` flattens the produced array into the output instead of
//! nesting it under a key.
//!
//! Each parent shell receives its own recursively executed child batch merged
//! at the child's key, so parent counts other than 1 nest correctly at any
//! depth.

use crate::config::RepeatItem;
use crate::template::{Params, TemplateEngine};
use serde_json::{Map, Value};
use tracing::warn;

/// The sentinel node name that flattens results into the top level.
pub const ROOT_NAME: &str = "root";

/// One level of the repetition hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatNode {
    pub name: String,
    /// Template expression; rendered against request params, then parsed as a
    /// non-negative integer. Non-numeric results mean zero repetitions.
    pub count: String,
    pub children: Vec<RepeatNode>,
}

/// Build the repeat tree from dotted item names. Re-declaring a name at any
/// level updates its count in place rather than duplicating the node.
pub fn build_hierarchy(items: &[RepeatItem]) -> Vec<RepeatNode> {
    let mut roots: Vec<RepeatNode> = Vec::new();

    for item in items {
        let segments: Vec<&str> = item.name.split('.').collect();
        let mut level = &mut roots;
        for (depth, segment) in segments.iter().enumerate() {
            let is_last = depth == segments.len() - 1;
            let position = level.iter().position(|node| node.name == *segment);
            let index = match position {
                Some(index) => {
                    if is_last {
                        level[index].count = item.count.clone();
                    }
                    index
                }
                None => {
                    level.push(RepeatNode {
                        name: (*segment).to_string(),
                        // Intermediate levels declared only implicitly repeat once.
                        count: if is_last { item.count.clone() } else { "1".to_string() },
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = &mut level[index].children;
        }
    }

    roots
}

/// Expand a repeat spec over a base response template.
pub fn expand(
    items: &[RepeatItem],
    engine: &TemplateEngine,
    params: &Params,
    template: &Value,
) -> Value {
    let hierarchy = build_hierarchy(items);
    let render_unit = || engine.render(template, params);
    execute(&hierarchy, engine, params, &render_unit)
}

/// Execute a built hierarchy with a unit renderer. Named nodes assemble an
/// object keyed by node name; a `root` node flattens into a top-level array.
pub fn execute<F>(
    nodes: &[RepeatNode],
    engine: &TemplateEngine,
    params: &Params,
    render_unit: &F,
) -> Value
where
    F: Fn() -> Value,
{
    let mut object = Map::new();
    let mut flattened: Vec<Value> = Vec::new();

    for node in nodes {
        let batch = execute_node(node, engine, params, render_unit);
        if node.name == ROOT_NAME {
            flattened.extend(batch);
        } else {
            object.insert(node.name.clone(), Value::Array(batch));
        }
    }

    if flattened.is_empty() {
        Value::Object(object)
    } else if object.is_empty() {
        Value::Array(flattened)
    } else {
        // Mixing `root` with named nodes has no flat representation; keep the
        // flattened batch addressable instead of dropping it.
        warn!("repeat spec mixes the root sentinel with named nodes; nesting root items under \"root\"");
        object.insert(ROOT_NAME.to_string(), Value::Array(flattened));
        Value::Object(object)
    }
}

/// Produce the concatenated batch for one node: `count` rendered units,
/// reduced to the sub-values carrying the node's name (or whole flattened
/// units for `root`).
fn execute_node<F>(
    node: &RepeatNode,
    engine: &TemplateEngine,
    params: &Params,
    render_unit: &F,
) -> Vec<Value>
where
    F: Fn() -> Value,
{
    let count = resolve_count(&node.count, engine, params);
    let mut batch = Vec::new();

    for _ in 0..count {
        let mut shell = render_unit();

        for child in &node.children {
            let child_batch = execute_node(child, engine, params, render_unit);
            if !set_key(&mut shell, &child.name, Value::Array(child_batch)) {
                warn!(
                    "repeat child {} has no slot in the response template",
                    child.name
                );
            }
        }

        if node.name == ROOT_NAME {
            append(&mut batch, shell);
        } else if let Some(extracted) = find_key(&shell, &node.name) {
            append(&mut batch, extracted);
        } else {
            warn!("repeat node {} not present in rendered unit", node.name);
        }
    }

    batch
}

/// Render the count expression, then parse. Non-numeric means zero.
fn resolve_count(count: &str, engine: &TemplateEngine, params: &Params) -> u64 {
    engine
        .render_string(count, params)
        .trim()
        .parse::<u64>()
        .unwrap_or(0)
}

/// Arrays are concatenated into the batch; anything else is one element.
fn append(batch: &mut Vec<Value>, value: Value) {
    match value {
        Value::Array(items) => batch.extend(items),
        other => batch.push(other),
    }
}

/// Depth-first search for the first value stored under `name`.
fn find_key(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(name) {
                return Some(found.clone());
            }
            map.values().find_map(|v| find_key(v, name))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, name)),
        _ => None,
    }
}

/// Depth-first replacement of the first value stored under `name`.
/// Returns false when the key does not occur anywhere.
fn set_key(value: &mut Value, name: &str, replacement: Value) -> bool {
    match value {
        Value::Object(map) => {
            if let Some(slot) = map.get_mut(name) {
                *slot = replacement;
                return true;
            }
            for nested in map.values_mut() {
                if set_key(nested, name, replacement.clone()) {
                    return true;
                }
            }
            false
        }
        Value::Array(items) => {
            for nested in items {
                if set_key(nested, name, replacement.clone()) {
                    return true;
                }
            }
            false
        }
        _ => false,
    }
}
