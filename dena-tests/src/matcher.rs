/// Query evaluation and update application for the mock service
///
/// Mirrors the documented service semantics closely enough for client tests:
/// dotted field paths, the operator suffixes, and the five update groups.
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

const UPDATE_GROUPS: [&str; 5] = ["set", "increment", "append", "prepend", "delete"];

fn lookup<'a>(item: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = item.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Parent object of `path`, created on demand, plus the last path segment
fn parent_mut<'a, 'p>(
    item: &'a mut Map<String, Value>,
    path: &'p str,
) -> Result<(&'a mut Map<String, Value>, &'p str), String> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut current = item;
    if let Some(parents) = parents {
        for part in parents.split('.') {
            let next = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = next
                .as_object_mut()
                .ok_or_else(|| format!("'{}' is not an object", part))?;
        }
    }
    Ok((current, leaf))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal) || a == b
}

fn contains(field: &Value, needle: &Value) -> bool {
    match (field, needle) {
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::Array(elements), needle) => elements.iter().any(|e| equals(e, needle)),
        _ => false,
    }
}

fn condition_matches(item: &Map<String, Value>, condition: &str, expected: &Value) -> Result<bool, String> {
    let (field, op) = match condition.rsplit_once('?') {
        Some((field, op)) => (field, op),
        None => (condition, "eq"),
    };
    let actual = lookup(item, field);

    let matched = match op {
        "eq" => actual.map_or(false, |v| equals(v, expected)),
        "ne" => actual.map_or(true, |v| !equals(v, expected)),
        "lt" => actual.and_then(|v| compare(v, expected)) == Some(Ordering::Less),
        "gt" => actual.and_then(|v| compare(v, expected)) == Some(Ordering::Greater),
        "lte" => matches!(
            actual.and_then(|v| compare(v, expected)),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "gte" => matches!(
            actual.and_then(|v| compare(v, expected)),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "pfx" => match (actual, expected) {
            (Some(Value::String(v)), Value::String(prefix)) => v.starts_with(prefix.as_str()),
            _ => false,
        },
        "r" => {
            let bounds = expected
                .as_array()
                .filter(|b| b.len() == 2)
                .ok_or_else(|| format!("range for '{}' must be [lower, upper]", field))?;
            actual.map_or(false, |v| {
                matches!(compare(v, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(v, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            })
        }
        "contains" => actual.map_or(false, |v| contains(v, expected)),
        "not_contains" => actual.map_or(true, |v| !contains(v, expected)),
        other => return Err(format!("unknown operator '{}'", other)),
    };
    Ok(matched)
}

/// True if `item` satisfies any filter. An empty filter list matches all.
pub fn matches_query(item: &Map<String, Value>, filters: &[Value]) -> Result<bool, String> {
    if filters.is_empty() {
        return Ok(true);
    }

    for filter in filters {
        let conditions = filter
            .as_object()
            .ok_or_else(|| "each query filter must be an object".to_string())?;

        let mut all = true;
        for (condition, expected) in conditions {
            if !condition_matches(item, condition, expected)? {
                all = false;
                break;
            }
        }
        if all {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_numbers(current: &Number, delta: &Number) -> Option<Number> {
    match (current.as_i64(), delta.as_i64()) {
        (Some(a), Some(b)) => a.checked_add(b).map(Number::from),
        _ => Number::from_f64(current.as_f64()? + delta.as_f64()?),
    }
}

fn extend_list(item: &mut Map<String, Value>, path: &str, value: &Value, front: bool) -> Result<(), String> {
    let (parent, leaf) = parent_mut(item, path)?;
    let list = parent
        .entry(leaf.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| format!("'{}' is not a list", path))?;

    let values = match value {
        Value::Array(values) => values.clone(),
        other => vec![other.clone()],
    };
    if front {
        let tail = std::mem::take(list);
        list.extend(values);
        list.extend(tail);
    } else {
        list.extend(values);
    }
    Ok(())
}

fn group<'a>(update: &'a Map<String, Value>, name: &str) -> Result<Option<&'a Map<String, Value>>, String> {
    match update.get(name) {
        None => Ok(None),
        Some(Value::Object(fields)) => Ok(Some(fields)),
        Some(_) => Err(format!("'{}' must be an object", name)),
    }
}

/// Apply an update object to `item` in place.
///
/// May leave `item` partially modified on error; apply to a copy and commit
/// on success.
pub fn apply_update(item: &mut Map<String, Value>, update: &Map<String, Value>) -> Result<(), String> {
    for name in update.keys() {
        if !UPDATE_GROUPS.contains(&name.as_str()) {
            return Err(format!("unknown update operation '{}'", name));
        }
    }

    let deletes: Vec<&str> = match update.get("delete") {
        None => Vec::new(),
        Some(Value::Array(fields)) => fields
            .iter()
            .map(|f| f.as_str().ok_or_else(|| "delete must list field names".to_string()))
            .collect::<Result<_, _>>()?,
        Some(_) => return Err("delete must be a list".to_string()),
    };

    let mut seen = HashSet::new();
    for name in &UPDATE_GROUPS[..4] {
        if let Some(fields) = group(update, name)? {
            for field in fields.keys() {
                if !seen.insert(field.as_str()) {
                    return Err(format!("conflicting operations on '{}'", field));
                }
            }
        }
    }
    for field in &deletes {
        if !seen.insert(*field) {
            return Err(format!("conflicting operations on '{}'", field));
        }
    }

    if let Some(fields) = group(update, "set")? {
        for (path, value) in fields {
            let (parent, leaf) = parent_mut(item, path)?;
            parent.insert(leaf.to_string(), value.clone());
        }
    }

    if let Some(fields) = group(update, "increment")? {
        for (path, delta) in fields {
            let delta = match delta {
                Value::Number(delta) => delta,
                _ => return Err(format!("increment for '{}' must be a number", path)),
            };
            let (parent, leaf) = parent_mut(item, path)?;
            let current = parent
                .entry(leaf.to_string())
                .or_insert_with(|| Value::Number(Number::from(0)));
            let sum = match current {
                Value::Number(n) => add_numbers(n, delta),
                _ => None,
            }
            .ok_or_else(|| format!("'{}' is not a number", path))?;
            *current = Value::Number(sum);
        }
    }

    if let Some(fields) = group(update, "append")? {
        for (path, value) in fields {
            extend_list(item, path, value, false)?;
        }
    }

    if let Some(fields) = group(update, "prepend")? {
        for (path, value) in fields {
            extend_list(item, path, value, true)?;
        }
    }

    for path in deletes {
        let (parent, leaf) = parent_mut(item, path)?;
        parent.remove(leaf);
    }

    Ok(())
}
