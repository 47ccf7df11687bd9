//! Field-mapping flattening and index-name wildcard helpers.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field types that never produce a leaf entry.
const SKIPPED_TYPES: [&str; 2] = ["alias", "object"];

/// Flatten a mapping `properties` tree into `field name -> field type`.
///
/// Nested `properties` are walked with `parent.child` names. `alias` and
/// `object` fields are not recorded themselves. Multi-fields declared under
/// `fields` are emitted as `parent.sub` only when `include_multi_fields` is set.
pub fn extract_field_names_types(
    properties: &Map<String, Value>,
    out: &mut BTreeMap<String, String>,
    prefix: &str,
    include_multi_fields: bool,
) {
    for (name, definition) in properties {
        let Some(definition) = definition.as_object() else {
            continue;
        };
        let full_name = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        if let Some(field_type) = definition.get("type").and_then(Value::as_str) {
            if !SKIPPED_TYPES.contains(&field_type) {
                out.insert(full_name.clone(), field_type.to_string());
            }
        }

        if let Some(children) = definition.get("properties").and_then(Value::as_object) {
            extract_field_names_types(children, out, &full_name, include_multi_fields);
        }

        if include_multi_fields {
            if let Some(sub_fields) = definition.get("fields").and_then(Value::as_object) {
                extract_field_names_types(sub_fields, out, &full_name, true);
            }
        }
    }
}

/// Flatten the `properties` of every mapping source and merge the results.
///
/// Later mappings win when two indices disagree on a field's type.
pub fn flatten_mappings<'a, I>(mappings: I, include_multi_fields: bool) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut out = BTreeMap::new();
    for mapping in mappings {
        if let Some(properties) = mapping.get("properties").and_then(Value::as_object) {
            extract_field_names_types(properties, &mut out, "", include_multi_fields);
        }
    }
    out
}

/// Whether a name uses wildcard syntax (`*`, `?` or a `,` list).
pub fn is_pattern(name: &str) -> bool {
    name.contains(['*', '?', ','])
}

/// Match `name` against a comma-separated list of `*` wildcard patterns.
pub fn simple_match(pattern: &str, name: &str) -> bool {
    pattern
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| wildcard_match(p, name))
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !name.starts_with(first) || name.len() < first.len() + last.len() || !name.ends_with(last) {
        return false;
    }

    let mut rest = &name[first.len()..name.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}
