use bindgraph_common::EntityKind;
use serde_json::{Value as JsonValue, json};

use super::common::key_index;
use crate::engine::{KeyIndex, ReferenceExtractor};
use crate::entity::EntityConfig;
use crate::test_utils::{path, query, widget};

fn index() -> KeyIndex {
    key_index(vec![
        widget("Input1", json!({"text": "a"}), &[]),
        query("Query1", json!({"data": [{"id": 1}], "isLoading": false}), &["data"]),
        widget(
            "Form1",
            json!({"style": {"color": "{{'red'}}", "size": 3}}),
            &["style.color"],
        ),
        widget(
            "Table1",
            json!({"columns": [{"label": "{{'A'}}"}, {"label": "B"}], "pageSize": 10}),
            &["columns[*].label"],
        ),
        (
            EntityKind::Query,
            EntityConfig::new("Api1", json!({"data": null})).with_action("run"),
        ),
    ])
}

fn deps(raw: JsonValue) -> Vec<String> {
    let keys = index();
    ReferenceExtractor::new(&keys)
        .extract(&raw, "Text1", &path("value"))
        .dependencies
        .iter()
        .map(|r| r.dependency_key())
        .collect()
}

#[test]
fn shortest_evaluable_permutation_wins() {
    assert_eq!(deps(json!("{{Query1.data.items[0].name}}")), vec!["Query1.data"]);
    assert_eq!(deps(json!("{{Query1.data.filter(r => r.id > 0)}}")), vec!["Query1.data"]);
}

#[test]
fn nested_evaluable_path_is_matched_at_its_depth() {
    assert_eq!(deps(json!("{{Form1.style.color.length}}")), vec!["Form1.style.color"]);
}

#[test]
fn raw_top_level_key_becomes_a_dependency() {
    assert_eq!(deps(json!("{{Input1.text.toUpperCase()}}")), vec!["Input1.text"]);
    assert_eq!(deps(json!("{{Query1.isLoading}}")), vec!["Query1.isLoading"]);
}

#[test]
fn container_prefix_reads_every_evaluable_descendant() {
    assert_eq!(
        deps(json!("{{Table1.columns}}")),
        vec!["Table1.columns", "Table1.columns[0].label", "Table1.columns[1].label"]
    );
    assert_eq!(
        deps(json!("{{Form1.style}}")),
        vec!["Form1.style", "Form1.style.color"]
    );
}

#[test]
fn bare_entity_reads_all_evaluable_paths() {
    assert_eq!(
        deps(json!("{{Table1}}")),
        vec!["Table1.columns[0].label", "Table1.columns[1].label"]
    );
    assert!(deps(json!("{{Input1}}")).is_empty());
}

#[test]
fn unknown_paths_and_heads_are_ignored() {
    assert!(deps(json!("{{Input1.nothing}}")).is_empty());
    assert!(deps(json!("{{window.foo + Math.max(1, 2)}}")).is_empty());
    assert!(deps(json!("{{Query1.run()}}")).is_empty());
}

#[test]
fn shadowed_names_are_not_dependencies() {
    assert!(deps(json!("{{[1].map(Input1 => Input1.text)}}")).is_empty());
}

#[test]
fn repeated_reads_are_deduplicated() {
    assert_eq!(
        deps(json!("{{Input1.text + Input1.text.length}} and {{Input1.text}}")),
        vec!["Input1.text"]
    );
}

#[test]
fn relations_point_at_the_analyzed_path() {
    let keys = index();
    let extraction = ReferenceExtractor::new(&keys).extract(
        &json!("{{Input1.text}}"),
        "Table1",
        &path("columns[1].label"),
    );
    assert!(extraction.is_code);
    assert_eq!(extraction.dependencies.len(), 1);
    assert_eq!(
        extraction.dependencies[0].dependent_key(),
        "Table1.columns[1].label"
    );
    assert_eq!(extraction.dependencies[0].dependency_key(), "Input1.text");
}

#[test]
fn plain_values_are_not_code() {
    let keys = index();
    let extractor = ReferenceExtractor::new(&keys);
    for raw in [json!(5), json!(null), json!("plain"), json!(["a", 1]), json!({"k": "{{Input1.text}}"})] {
        let extraction = extractor.extract(&raw, "Text1", &path("value"));
        assert!(!extraction.is_code, "{raw} is not code");
        assert!(extraction.dependencies.is_empty());
    }
}

#[test]
fn array_elements_contribute_to_the_same_path() {
    let keys = index();
    let extraction = ReferenceExtractor::new(&keys).extract(
        &json!(["{{Input1.text}}", "static", "{{Query1.data}}"]),
        "Button1",
        &path("onClick"),
    );
    assert!(extraction.is_code);
    let found: Vec<String> = extraction
        .dependencies
        .iter()
        .map(|r| r.dependency_key())
        .collect();
    assert_eq!(found, vec!["Input1.text", "Query1.data"]);
}

#[test]
fn unparsable_binding_does_not_hide_its_siblings() {
    let keys = index();
    let extraction =
        ReferenceExtractor::new(&keys).extract(&json!("{{Input1.text}} {{1 +}}"), "Text1", &path("value"));
    assert!(extraction.is_code);
    assert_eq!(extraction.dependencies.len(), 1);

    let extraction = ReferenceExtractor::new(&keys).extract(&json!("{{1 +}}"), "Text1", &path("value"));
    assert!(extraction.is_code);
    assert!(extraction.dependencies.is_empty());
}

#[test]
fn statement_handlers_are_analyzed_as_programs() {
    assert_eq!(
        deps(json!("{{const x = Input1.text; Api1.run(x); Query1.data}}")),
        vec!["Input1.text", "Query1.data"]
    );
}

#[test]
fn resolve_follows_the_key_index() {
    let keys = index();
    let table = &keys["Table1"];
    let got: Vec<String> = table
        .resolve(&path("columns[0]"))
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(got, vec!["columns", "columns[0].label"]);
    assert_eq!(table.resolve(&path("pageSize.x")), vec![path("pageSize")]);
}
