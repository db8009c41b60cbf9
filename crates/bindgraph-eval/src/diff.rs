//! Structural diffs between two `{ entityId: tree }` snapshots.

use bindgraph_common::{PathError, PropertyPath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One change to a snapshot. A root `path` addresses the whole entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DiffOp {
    Insert {
        entity_id: String,
        path: PropertyPath,
        value: JsonValue,
    },
    Update {
        entity_id: String,
        path: PropertyPath,
        value: JsonValue,
    },
    Delete {
        entity_id: String,
        path: PropertyPath,
    },
}

impl DiffOp {
    pub fn entity_id(&self) -> &str {
        match self {
            DiffOp::Insert { entity_id, .. }
            | DiffOp::Update { entity_id, .. }
            | DiffOp::Delete { entity_id, .. } => entity_id,
        }
    }

    pub fn path(&self) -> &PropertyPath {
        match self {
            DiffOp::Insert { path, .. } | DiffOp::Update { path, .. } | DiffOp::Delete { path, .. } => {
                path
            }
        }
    }
}

fn entries(tree: &JsonValue) -> Option<&Map<String, JsonValue>> {
    tree.as_object()
}

/// Diff two forests. Objects are compared key by key, arrays of equal length
/// element by element; anything else that differs is one `Update`.
pub fn diff_forest(old: &JsonValue, new: &JsonValue) -> Vec<DiffOp> {
    let empty = Map::new();
    let old = entries(old).unwrap_or(&empty);
    let new = entries(new).unwrap_or(&empty);
    let mut ops = Vec::new();
    for (id, before) in old {
        match new.get(id) {
            Some(after) => diff_value(id, PropertyPath::root(), before, after, &mut ops),
            None => ops.push(DiffOp::Delete {
                entity_id: id.clone(),
                path: PropertyPath::root(),
            }),
        }
    }
    for (id, after) in new {
        if !old.contains_key(id) {
            ops.push(DiffOp::Insert {
                entity_id: id.clone(),
                path: PropertyPath::root(),
                value: after.clone(),
            });
        }
    }
    ops
}

fn diff_value(id: &str, at: PropertyPath, old: &JsonValue, new: &JsonValue, ops: &mut Vec<DiffOp>) {
    if old == new {
        return;
    }
    match (old, new) {
        (JsonValue::Object(before), JsonValue::Object(after)) => {
            for (key, b) in before {
                match after.get(key) {
                    Some(a) => diff_value(id, at.child_key(key.as_str()), b, a, ops),
                    None => ops.push(DiffOp::Delete {
                        entity_id: id.to_string(),
                        path: at.child_key(key.as_str()),
                    }),
                }
            }
            for (key, a) in after {
                if !before.contains_key(key) {
                    ops.push(DiffOp::Insert {
                        entity_id: id.to_string(),
                        path: at.child_key(key.as_str()),
                        value: a.clone(),
                    });
                }
            }
        }
        (JsonValue::Array(before), JsonValue::Array(after)) if before.len() == after.len() => {
            for (i, (b, a)) in before.iter().zip(after).enumerate() {
                diff_value(id, at.child_index(i), b, a, ops);
            }
        }
        _ => ops.push(DiffOp::Update {
            entity_id: id.to_string(),
            path: at,
            value: new.clone(),
        }),
    }
}

/// Diff two error trees `{ entityId: { path: [message] } }`; each path entry
/// is compared as a whole.
pub fn diff_error_tree(old: &JsonValue, new: &JsonValue) -> Vec<DiffOp> {
    let empty = Map::new();
    let old = entries(old).unwrap_or(&empty);
    let new = entries(new).unwrap_or(&empty);
    let mut ops = Vec::new();
    let no_paths = JsonValue::Object(Map::new());
    let ids = old.keys().chain(new.keys().filter(|k| !old.contains_key(*k)));
    for id in ids {
        let before = entries(old.get(id).unwrap_or(&no_paths)).unwrap_or(&empty);
        let after = entries(new.get(id).unwrap_or(&no_paths)).unwrap_or(&empty);
        for (path, b) in before {
            let target = error_path(path);
            match after.get(path) {
                Some(a) if a == b => {}
                Some(a) => ops.push(DiffOp::Update {
                    entity_id: id.clone(),
                    path: target,
                    value: a.clone(),
                }),
                None => ops.push(DiffOp::Delete {
                    entity_id: id.clone(),
                    path: target,
                }),
            }
        }
        for (path, a) in after {
            if !before.contains_key(path) {
                ops.push(DiffOp::Insert {
                    entity_id: id.clone(),
                    path: error_path(path),
                    value: a.clone(),
                });
            }
        }
    }
    ops
}

fn error_path(text: &str) -> PropertyPath {
    PropertyPath::parse(text).unwrap_or_else(|_| PropertyPath::key(text))
}

/// Apply forest ops to a `{ entityId: tree }` snapshot, stopping at the first
/// op whose path cannot be written.
pub fn apply_forest(target: &mut JsonValue, ops: &[DiffOp]) -> Result<(), PathError> {
    if !target.is_object() {
        *target = JsonValue::Object(Map::new());
    }
    for op in ops {
        let at = PropertyPath::key(op.entity_id()).join(op.path());
        match op {
            DiffOp::Insert { value, .. } | DiffOp::Update { value, .. } => {
                at.set(target, value.clone())?;
            }
            DiffOp::Delete { .. } => {
                at.remove(target);
            }
        }
    }
    Ok(())
}

/// Apply error-tree ops; paths are stored flat as their display string.
pub fn apply_error_tree(target: &mut JsonValue, ops: &[DiffOp]) {
    if !target.is_object() {
        *target = JsonValue::Object(Map::new());
    }
    let Some(tree) = target.as_object_mut() else {
        return;
    };
    for op in ops {
        let key = op.path().to_string();
        match op {
            DiffOp::Insert { entity_id, value, .. } | DiffOp::Update { entity_id, value, .. } => {
                let paths = tree
                    .entry(entity_id.clone())
                    .or_insert_with(|| JsonValue::Object(Map::new()));
                if let JsonValue::Object(paths) = paths {
                    paths.insert(key, value.clone());
                }
            }
            DiffOp::Delete { entity_id, .. } => {
                let now_empty = match tree.get_mut(entity_id) {
                    Some(JsonValue::Object(paths)) => {
                        paths.remove(&key);
                        paths.is_empty()
                    }
                    _ => false,
                };
                if now_empty {
                    tree.remove(entity_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_forest_has_empty_diff() {
        let forest = json!({"A": {"x": [1, 2], "y": {"z": "q"}}});
        assert!(diff_forest(&forest, &forest.clone()).is_empty());
    }

    #[test]
    fn nested_changes_are_reported_at_the_deepest_path() {
        let old = json!({"A": {"x": [1, 2], "y": {"z": "q"}}, "Gone": {}});
        let new = json!({"A": {"x": [1, 3], "y": {"w": true}}, "New": {"k": 1}});
        let ops = diff_forest(&old, &new);
        let rendered: Vec<String> = ops
            .iter()
            .map(|op| format!("{}:{}", op.entity_id(), op.path()))
            .collect();
        assert_eq!(rendered, vec!["A:x[1]", "A:y.z", "A:y.w", "Gone:", "New:"]);
        assert!(matches!(&ops[0], DiffOp::Update { value, .. } if *value == json!(3)));
        assert!(matches!(&ops[1], DiffOp::Delete { .. }));
    }

    #[test]
    fn resized_array_is_replaced_whole() {
        let ops = diff_forest(&json!({"A": {"x": [1]}}), &json!({"A": {"x": [1, 2]}}));
        assert_eq!(
            ops,
            vec![DiffOp::Update {
                entity_id: "A".into(),
                path: PropertyPath::key("x"),
                value: json!([1, 2]),
            }]
        );
    }

    #[test]
    fn ops_serialize_with_tag_and_camel_case() {
        let op = DiffOp::Delete {
            entity_id: "A".into(),
            path: PropertyPath::parse("rows[0].name").unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "delete", "entityId": "A", "path": "rows[0].name"})
        );
    }

    #[test]
    fn applying_a_diff_reproduces_the_new_snapshot() {
        let old = json!({"A": {"x": [1, 2], "y": {"z": "q"}}, "Gone": {}});
        let new = json!({"A": {"x": [1, 3], "y": {"w": true}}, "New": {"k": 1}});
        let mut mirror = old.clone();
        apply_forest(&mut mirror, &diff_forest(&old, &new)).unwrap();
        assert_eq!(mirror, new);

        let old_errors = json!({"A": {"x": ["TypeError: boom"]}, "B": {"columns[0].label": ["e"]}});
        let new_errors = json!({"A": {"x": ["TypeError: bang"], "y": ["e"]}});
        let mut errors = old_errors.clone();
        apply_error_tree(&mut errors, &diff_error_tree(&old_errors, &new_errors));
        assert_eq!(errors, new_errors);
    }

    #[test]
    fn unwritable_forest_op_is_reported() {
        let mut mirror = json!({"A": {"rows": [{"name": "a"}]}});
        let ops = [
            DiffOp::Update {
                entity_id: "A".into(),
                path: PropertyPath::parse("rows[*].name").unwrap(),
                value: json!("b"),
            },
            DiffOp::Insert {
                entity_id: "A".into(),
                path: PropertyPath::key("later"),
                value: json!(1),
            },
        ];
        assert_eq!(apply_forest(&mut mirror, &ops), Err(PathError::WildcardWrite));
        assert_eq!(mirror, json!({"A": {"rows": [{"name": "a"}]}}));
    }
}
