use serde_json::json;

use crate::test_utils::eval_expr;

fn eval(source: &str) -> serde_json::Value {
    eval_expr(source, &json!({})).unwrap()
}

#[test]
fn math_namespace() {
    assert_eq!(eval("Math.max(1, 5, 3)"), json!(5));
    assert_eq!(eval("Math.min()"), json!(null));
    assert_eq!(eval("Math.round(2.5)"), json!(3));
    assert_eq!(eval("Math.floor(-1.5)"), json!(-2));
    assert_eq!(eval("Math.abs(-4)"), json!(4));
    assert_eq!(eval("Math.pow(2, 10)"), json!(1024));
    assert_eq!(eval("Math.sqrt(9)"), json!(3));
}

#[test]
fn json_and_object_helpers() {
    assert_eq!(eval("JSON.stringify({a: 1, b: [1, 'x']})"), json!(r#"{"a":1,"b":[1,"x"]}"#));
    assert_eq!(eval("JSON.parse('{\"k\": [1, 2]}').k[1]"), json!(2));
    assert_eq!(eval("Object.keys({b: 1, a: 2})"), json!(["a", "b"]));
    assert_eq!(eval("Object.values({a: 1})"), json!([1]));
    assert_eq!(eval("Object.entries({a: 1})"), json!([["a", 1]]));
    assert_eq!(eval("Array.isArray([])"), json!(true));
    assert_eq!(eval("Array.isArray('x')"), json!(false));
}

#[test]
fn conversions() {
    assert_eq!(eval("Number('12') + 1"), json!(13));
    assert_eq!(eval("String(12) + 1"), json!("121"));
    assert_eq!(eval("Boolean('')"), json!(false));
    assert_eq!(eval("parseInt('42px')"), json!(42));
    assert_eq!(eval("parseFloat('3.5kg')"), json!(3.5));
    assert_eq!(eval("isNaN('abc')"), json!(true));
}

#[test]
fn array_methods() {
    assert_eq!(eval("[1, 2, 3].filter(x => x > 1)"), json!([2, 3]));
    assert_eq!(eval("[1, 2, 3].find(x => x > 1)"), json!(2));
    assert_eq!(eval("[1, 2, 3].findIndex(x => x > 5)"), json!(-1));
    assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 0)"), json!(6));
    assert_eq!(eval("[1, 2, 3].some(x => x === 2)"), json!(true));
    assert_eq!(eval("[1, 2, 3].every(x => x > 1)"), json!(false));
    assert_eq!(eval("[1, 2, 3].includes(2)"), json!(true));
    assert_eq!(eval("['a', 'b'].indexOf('b')"), json!(1));
    assert_eq!(eval("[1, null, 'x'].join('-')"), json!("1--x"));
    assert_eq!(eval("[1, 2, 3].slice(-2)"), json!([2, 3]));
    assert_eq!(eval("[1].concat([2, 3], 4)"), json!([1, 2, 3, 4]));
    assert_eq!(eval("[1, [2, [3]]].flat()"), json!([1, 2, [3]]));
    assert_eq!(eval("[3, 1].reverse()"), json!([1, 3]));
    assert_eq!(eval("[{n: 1}, {n: 2}].map((row, i) => row.n + i)"), json!([1, 3]));
}

#[test]
fn string_methods() {
    assert_eq!(eval("'abc'.toUpperCase()"), json!("ABC"));
    assert_eq!(eval("'  x '.trim()"), json!("x"));
    assert_eq!(eval("'a,b'.split(',')"), json!(["a", "b"]));
    assert_eq!(eval("'hello'.slice(1, 3)"), json!("el"));
    assert_eq!(eval("'hello'.startsWith('he')"), json!(true));
    assert_eq!(eval("'x'.padStart(3, '0')"), json!("00x"));
    assert_eq!(eval("'aXa'.replace('a', 'b')"), json!("bXa"));
    assert_eq!(eval("'hello'.length"), json!(5));
}

#[test]
fn number_methods() {
    assert_eq!(eval("(3.14159).toFixed(2)"), json!("3.14"));
    assert_eq!(eval("(255).toString(16)"), json!("ff"));
    assert_eq!(eval("(12).toString()"), json!("12"));
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    let err = eval_expr("Input1.text()", &json!({"Input1": {"text": "x"}})).unwrap_err();
    assert_eq!(err.to_string(), "TypeError: Input1.text is not a function");
}
