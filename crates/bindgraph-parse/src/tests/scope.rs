use crate::parser::{parse_expression, parse_program};
use crate::scope::{collect_program_references, collect_reference_chains};

fn chains(src: &str) -> Vec<String> {
    let ast = parse_expression(src).unwrap();
    collect_reference_chains(&ast)
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[test]
fn test_member_chain_is_collected_whole() {
    assert_eq!(chains("Table1.selectedRow.name"), vec!["Table1.selectedRow.name"]);
}

#[test]
fn test_literal_computed_segments_extend_chain() {
    assert_eq!(
        chains("Query1.data[0]['a.b']"),
        vec!["Query1.data[0][\"a.b\"]"]
    );
}

#[test]
fn test_dynamic_computed_stops_chain() {
    assert_eq!(chains("Query1.data[idx].name"), vec!["Query1.data", "idx"]);
}

#[test]
fn test_call_stops_chain_and_visits_args() {
    assert_eq!(
        chains("Query1.data.filter(r => r.id === Input1.text).length"),
        vec!["Query1.data.filter", "Input1.text"]
    );
}

#[test]
fn test_optional_links_extend_chain() {
    assert_eq!(chains("Api1?.data?.items"), vec!["Api1.data.items"]);
}

#[test]
fn test_arrow_params_shadow_entities() {
    assert_eq!(chains("List1.items.map(Text1 => Text1.value)"), vec!["List1.items.map"]);
}

#[test]
fn test_block_declarations_shadow() {
    let src = "(() => { const Input1 = 5; return Input1 + Input2.text })()";
    assert_eq!(chains(src), vec!["Input2.text"]);
}

#[test]
fn test_shadowing_is_lexical() {
    let src = "[(x => x)(1), x.y]";
    assert_eq!(chains(src), vec!["x.y"]);
}

#[test]
fn test_object_keys_are_not_references() {
    assert_eq!(chains("{ Table1: 1, [key]: Query1 }"), vec!["key", "Query1"]);
}

#[test]
fn test_duplicates_collapse_in_order() {
    assert_eq!(chains("a.b + c + a.b + a"), vec!["a.b", "c", "a"]);
}

#[test]
fn test_template_holes_are_visited() {
    assert_eq!(chains("`${User.name} <${User.email}>`"), vec!["User.name", "User.email"]);
}

#[test]
fn test_program_declarations_shadow_across_statements() {
    let program = parse_program("let x = Input1.text; Api1.run({ q: x, y })").unwrap();
    let refs: Vec<String> = collect_program_references(&program)
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(refs, vec!["Input1.text", "Api1.run", "y"]);
}

#[test]
fn test_permutations_shortest_first() {
    let ast = parse_expression("A.b.c").unwrap();
    let chain = collect_reference_chains(&ast).remove(0);
    let perms: Vec<String> = chain.permutations().map(|p| p.to_string()).collect();
    assert_eq!(perms, vec!["b", "b.c"]);
}
