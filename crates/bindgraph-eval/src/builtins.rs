//! Standard library available to bindings: global objects (`Math`, `JSON`,
//! `Object`, `Array`), conversion functions, and methods on arrays, strings
//! and numbers.

use std::collections::BTreeMap;
use std::rc::Rc;

use bindgraph_common::{BindError, BindErrorKind};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::interpreter::Interpreter;
use crate::value::{Function, NativeFn, Value, format_number};

const ARRAY_METHODS: &[&str] = &[
    "map", "filter", "find", "findIndex", "some", "every", "includes", "indexOf", "join", "slice",
    "concat", "reduce", "flat", "reverse", "forEach", "toString",
];

const STRING_METHODS: &[&str] = &[
    "toUpperCase", "toLowerCase", "trim", "includes", "startsWith", "endsWith", "split", "slice",
    "substring", "replace", "indexOf", "padStart", "padEnd", "charAt", "toString",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn object_of(entries: &[(&'static str, NativeFn)], constants: &[(&str, f64)]) -> Value {
    let mut map: BTreeMap<String, Value> = entries
        .iter()
        .map(|(name, call)| (name.to_string(), Value::native(*name, *call)))
        .collect();
    for (name, value) in constants {
        map.insert(name.to_string(), Value::Number(*value));
    }
    Value::object(map)
}

/// Member tables of the namespace objects (`Math`, `JSON`, ...).
struct Namespace {
    methods: Vec<(&'static str, NativeFn)>,
    constants: Vec<(&'static str, f64)>,
}

static NAMESPACES: Lazy<FxHashMap<&'static str, Namespace>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert(
        "Math",
        Namespace {
            methods: vec![
                ("abs", math_abs as NativeFn),
                ("ceil", math_ceil),
                ("floor", math_floor),
                ("round", math_round),
                ("max", math_max),
                ("min", math_min),
                ("pow", math_pow),
                ("sqrt", math_sqrt),
                ("trunc", math_trunc),
                ("sign", math_sign),
            ],
            constants: vec![("PI", std::f64::consts::PI), ("E", std::f64::consts::E)],
        },
    );
    map.insert(
        "JSON",
        Namespace {
            methods: vec![("stringify", json_stringify as NativeFn), ("parse", json_parse)],
            constants: Vec::new(),
        },
    );
    map.insert(
        "Object",
        Namespace {
            methods: vec![
                ("keys", object_keys as NativeFn),
                ("values", object_values),
                ("entries", object_entries),
            ],
            constants: Vec::new(),
        },
    );
    map.insert(
        "Array",
        Namespace {
            methods: vec![("isArray", array_is_array as NativeFn)],
            constants: Vec::new(),
        },
    );
    map
});

/// Resolve a global identifier that is neither local nor an entity.
pub fn global(name: &str) -> Option<Value> {
    if let Some(ns) = NAMESPACES.get(name) {
        return Some(object_of(&ns.methods, &ns.constants));
    }
    Some(match name {
        "String" => Value::native("String", global_string),
        "Number" => Value::native("Number", global_number),
        "Boolean" => Value::native("Boolean", global_boolean),
        "parseInt" => Value::native("parseInt", parse_int),
        "parseFloat" => Value::native("parseFloat", parse_float),
        "isNaN" => Value::native("isNaN", is_nan),
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        _ => return None,
    })
}

/// Bind a built-in method to its receiver, if the receiver type has it.
pub fn bind_method(receiver: &Value, name: &str) -> Option<Value> {
    let known = match receiver {
        Value::Array(_) => ARRAY_METHODS.contains(&name),
        Value::String(_) => STRING_METHODS.contains(&name),
        Value::Number(_) => NUMBER_METHODS.contains(&name),
        Value::Bool(_) => name == "toString",
        _ => false,
    };
    known.then(|| {
        Value::Function(Rc::new(Function::Method {
            receiver: receiver.clone(),
            name: name.to_string(),
        }))
    })
}

pub fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, BindError> {
    match receiver {
        Value::Array(items) => array_method(interp, receiver, items, name, args),
        Value::String(s) => string_method(interp, s, name, args),
        Value::Number(n) => number_method(*n, name, &args),
        Value::Bool(b) if name == "toString" => Ok(Value::from(b.to_string())),
        other => Err(BindError::not_a_function(&format!(
            "{}.{name}",
            other.type_of()
        ))),
    }
}

/* ─────────────────────────────── arrays ─────────────────────────────── */

fn callback(args: &[Value]) -> Result<Value, BindError> {
    match args.first() {
        Some(f @ Value::Function(_)) => Ok(f.clone()),
        other => Err(BindError::not_a_function(
            &other.cloned().unwrap_or(Value::Undefined).to_js_string(),
        )),
    }
}

/// Resolve a relative index argument (`slice(-2)`) against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn flatten_into(items: &[Value], depth: f64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => flatten_into(inner, depth - 1.0, out),
            other => out.push(other.clone()),
        }
    }
}

fn call_element(
    interp: &mut Interpreter<'_>,
    f: &Value,
    item: &Value,
    index: usize,
    receiver: &Value,
) -> Result<Value, BindError> {
    interp.call_function(
        f,
        vec![item.clone(), Value::Number(index as f64), receiver.clone()],
    )
}

fn array_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    items: &Rc<Vec<Value>>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, BindError> {
    Ok(match name {
        "map" => {
            let f = callback(&args)?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(call_element(interp, &f, item, i, receiver)?);
            }
            Value::array(out)
        }
        "filter" => {
            let f = callback(&args)?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if call_element(interp, &f, item, i, receiver)?.truthy() {
                    out.push(item.clone());
                }
            }
            Value::array(out)
        }
        "find" | "findIndex" => {
            let f = callback(&args)?;
            for (i, item) in items.iter().enumerate() {
                if call_element(interp, &f, item, i, receiver)?.truthy() {
                    return Ok(if name == "find" {
                        item.clone()
                    } else {
                        Value::Number(i as f64)
                    });
                }
            }
            if name == "find" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            }
        }
        "some" => {
            let f = callback(&args)?;
            for (i, item) in items.iter().enumerate() {
                if call_element(interp, &f, item, i, receiver)?.truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Value::Bool(false)
        }
        "every" => {
            let f = callback(&args)?;
            for (i, item) in items.iter().enumerate() {
                if !call_element(interp, &f, item, i, receiver)?.truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Value::Bool(true)
        }
        "forEach" => {
            let f = callback(&args)?;
            for (i, item) in items.iter().enumerate() {
                call_element(interp, &f, item, i, receiver)?;
            }
            Value::Undefined
        }
        "reduce" => {
            let f = callback(&args)?;
            let mut iter = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(BindError::type_error(
                            "Reduce of empty array with no initial value",
                        ));
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call_function(
                    &f,
                    vec![acc, item.clone(), Value::Number(i as f64), receiver.clone()],
                )?;
            }
            acc
        }
        "includes" => {
            let needle = arg(&args, 0);
            Value::Bool(items.iter().any(|v| v.same_value_zero(&needle)))
        }
        "indexOf" => {
            let needle = arg(&args, 0);
            Value::Number(
                items
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )
        }
        "join" => {
            let sep = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            Value::from(
                items
                    .iter()
                    .map(|v| {
                        if v.is_nullish() {
                            String::new()
                        } else {
                            v.to_js_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "slice" => {
            let start = relative_index(&arg(&args, 0), items.len(), 0);
            let end = relative_index(&arg(&args, 1), items.len(), items.len());
            Value::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "concat" => {
            let mut out = items.as_ref().clone();
            for extra in args {
                match extra {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other),
                }
            }
            Value::array(out)
        }
        "flat" => {
            let depth = match arg(&args, 0) {
                Value::Undefined => 1.0,
                other => other.to_number(),
            };
            let mut out = Vec::new();
            flatten_into(items, depth, &mut out);
            Value::array(out)
        }
        "reverse" => {
            let mut out = items.as_ref().clone();
            out.reverse();
            Value::array(out)
        }
        "toString" => Value::from(receiver.to_js_string()),
        other => return Err(BindError::not_a_function(&format!("array.{other}"))),
    })
}

/* ─────────────────────────────── strings ────────────────────────────── */

fn pad(s: &str, args: &[Value], at_start: bool) -> Value {
    let target = arg(args, 0).to_number();
    let fill = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => other.to_js_string(),
    };
    let len = s.chars().count();
    if target.is_nan() || target as usize <= len || fill.is_empty() {
        return Value::string(s);
    }
    let padding: String = fill.chars().cycle().take(target as usize - len).collect();
    Value::from(if at_start {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    })
}

fn string_method(
    interp: &mut Interpreter<'_>,
    s: &Rc<str>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, BindError> {
    let chars: Vec<char> = s.chars().collect();
    let text_arg = |i: usize| arg(&args, i).to_js_string();

    Ok(match name {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "toString" => Value::String(Rc::clone(s)),
        "includes" => Value::Bool(s.contains(text_arg(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text_arg(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text_arg(0).as_str())),
        "indexOf" => {
            let needle = text_arg(0);
            Value::Number(
                s.find(needle.as_str())
                    .map(|byte| s[..byte].chars().count() as f64)
                    .unwrap_or(-1.0),
            )
        }
        "charAt" => {
            let i = arg(&args, 0).to_number();
            let i = if i.is_nan() { 0 } else { i as usize };
            Value::from(chars.get(i).map(|c| c.to_string()).unwrap_or_default())
        }
        "slice" => {
            let start = relative_index(&arg(&args, 0), chars.len(), 0);
            let end = relative_index(&arg(&args, 1), chars.len(), chars.len());
            Value::from(if start < end {
                chars[start..end].iter().collect::<String>()
            } else {
                String::new()
            })
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                other => {
                    let n = other.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(chars.len())
                    }
                }
            };
            let a = clamp(arg(&args, 0), 0);
            let b = clamp(arg(&args, 1), chars.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::from(chars[start..end].iter().collect::<String>())
        }
        "split" => match arg(&args, 0) {
            Value::Undefined => Value::array(vec![Value::String(Rc::clone(s))]),
            sep => {
                let sep = sep.to_js_string();
                let parts: Vec<Value> = if sep.is_empty() {
                    chars.iter().map(|c| Value::from(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(Value::from).collect()
                };
                let limit = match arg(&args, 1) {
                    Value::Undefined => parts.len(),
                    other => other.to_number().max(0.0) as usize,
                };
                Value::array(parts.into_iter().take(limit).collect())
            }
        },
        "replace" => {
            let pattern = text_arg(0);
            let Some(at) = s.find(pattern.as_str()) else {
                return Ok(Value::String(Rc::clone(s)));
            };
            let replacement = match arg(&args, 1) {
                f @ Value::Function(_) => interp
                    .call_function(
                        &f,
                        vec![
                            Value::from(pattern.clone()),
                            Value::Number(s[..at].chars().count() as f64),
                            Value::String(Rc::clone(s)),
                        ],
                    )?
                    .to_js_string(),
                other => other.to_js_string(),
            };
            Value::from(format!(
                "{}{}{}",
                &s[..at],
                replacement,
                &s[at + pattern.len()..]
            ))
        }
        "padStart" => pad(s, &args, true),
        "padEnd" => pad(s, &args, false),
        other => return Err(BindError::not_a_function(&format!("string.{other}"))),
    })
}

/* ─────────────────────────────── numbers ────────────────────────────── */

fn number_method(n: f64, name: &str, args: &[Value]) -> Result<Value, BindError> {
    match name {
        "toFixed" => {
            let digits = match arg(args, 0) {
                Value::Undefined => 0.0,
                other => other.to_number().trunc(),
            };
            if !(0.0..=100.0).contains(&digits) {
                return Err(BindError::new(BindErrorKind::Range)
                    .with_message("toFixed() digits argument must be between 0 and 100"));
            }
            if !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{:.*}", digits as usize, n)))
        }
        "toString" => {
            let radix = match arg(args, 0) {
                Value::Undefined => 10,
                other => other.to_number() as u32,
            };
            if !(2..=36).contains(&radix) {
                return Err(BindError::new(BindErrorKind::Range)
                    .with_message("toString() radix must be between 2 and 36"));
            }
            if radix == 10 || n.fract() != 0.0 || !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(integer_to_radix(n as i64, radix)))
        }
        other => Err(BindError::not_a_function(&format!("number.{other}"))),
    }
}

fn integer_to_radix(value: i64, radix: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    let mut rest = value.unsigned_abs();
    while rest > 0 {
        let d = (rest % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        rest /= u64::from(radix);
    }
    if value < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/* ──────────────────────────────── Math ──────────────────────────────── */

fn num_arg(args: &[Value], i: usize) -> f64 {
    arg(args, i).to_number()
}

fn math_abs(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(num_arg(&args, 0).abs()))
}

fn math_ceil(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(num_arg(&args, 0).ceil()))
}

fn math_floor(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(num_arg(&args, 0).floor()))
}

fn math_round(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    // Halves round towards +Infinity.
    Ok(Value::Number((num_arg(&args, 0) + 0.5).floor()))
}

fn math_max(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let mut best = f64::NEG_INFINITY;
    for value in &args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.max(n);
    }
    Ok(Value::Number(best))
}

fn math_min(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let mut best = f64::INFINITY;
    for value in &args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        best = best.min(n);
    }
    Ok(Value::Number(best))
}

fn math_pow(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(num_arg(&args, 0).powf(num_arg(&args, 1))))
}

fn math_sqrt(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(num_arg(&args, 0).sqrt()))
}

fn math_trunc(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(num_arg(&args, 0).trunc()))
}

fn math_sign(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let n = num_arg(&args, 0);
    Ok(Value::Number(if n.is_nan() || n == 0.0 { n } else { n.signum() }))
}

/* ──────────────────────────── JSON / Object ─────────────────────────── */

fn json_stringify(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let value = arg(&args, 0);
    if matches!(value, Value::Undefined | Value::Function(_)) {
        return Ok(Value::Undefined);
    }
    let indent = match arg(&args, 2) {
        Value::Number(n) if n >= 1.0 => " ".repeat((n as usize).min(10)),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let json = value.to_json();
    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(Vec::new(), formatter);
        json.serialize(&mut ser)
            .map(|_| String::from_utf8_lossy(&ser.into_inner()).into_owned())
    };
    text.map(Value::from).map_err(|e| {
        BindError::new(BindErrorKind::Internal).with_message(format!("JSON.stringify: {e}"))
    })
}

fn json_parse(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let text = arg(&args, 0).to_js_string();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| Value::from(&json))
        .map_err(|e| BindError::syntax(format!("\"{text}\" is not valid JSON ({e})")))
}

fn entries_of(value: &Value) -> Result<Vec<(String, Value)>, BindError> {
    match value {
        Value::Undefined | Value::Null => Err(BindError::type_error(
            "Cannot convert undefined or null to object",
        )),
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect()),
        Value::String(s) => Ok(s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn object_keys(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let entries = entries_of(&arg(&args, 0))?;
    Ok(Value::array(
        entries.into_iter().map(|(k, _)| Value::from(k)).collect(),
    ))
}

fn object_values(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let entries = entries_of(&arg(&args, 0))?;
    Ok(Value::array(entries.into_iter().map(|(_, v)| v).collect()))
}

fn object_entries(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let entries = entries_of(&arg(&args, 0))?;
    Ok(Value::array(
        entries
            .into_iter()
            .map(|(k, v)| Value::array(vec![Value::from(k), v]))
            .collect(),
    ))
}

fn array_is_array(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))
}

/* ───────────────────────────── conversions ──────────────────────────── */

fn global_string(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(match args.first() {
        None => Value::string(""),
        Some(v) => Value::from(v.to_js_string()),
    })
}

fn global_number(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Number(match args.first() {
        None => 0.0,
        Some(v) => v.to_number(),
    }))
}

fn global_boolean(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Bool(arg(&args, 0).truthy()))
}

fn parse_int(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let text = arg(&args, 0).to_js_string();
    let mut t = text.trim();
    let negative = t.starts_with('-');
    if negative || t.starts_with('+') {
        t = &t[1..];
    }
    let mut radix = match arg(&args, 1) {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if (radix == 16 || matches!(arg(&args, 1), Value::Undefined))
        && (t.starts_with("0x") || t.starts_with("0X"))
    {
        t = &t[2..];
        radix = 16;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: String = t.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        value = value * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
    }
    Ok(Value::Number(if negative { -value } else { value }))
}

fn parse_float(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    let text = arg(&args, 0).to_js_string();
    let t = text.trim_start();
    let unsigned = t.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && t.len() - unsigned.len() <= 1 {
        let negative = t.starts_with('-');
        return Ok(Value::Number(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }));
    }
    // Longest prefix shaped like a decimal literal.
    let bytes = t.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if !t[digits_start..i].bytes().any(|b| b.is_ascii_digit()) {
        return Ok(Value::Number(f64::NAN));
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    Ok(Value::Number(t[..i].parse::<f64>().unwrap_or(f64::NAN)))
}

fn is_nan(_: &mut Interpreter<'_>, args: Vec<Value>) -> Result<Value, BindError> {
    Ok(Value::Bool(arg(&args, 0).to_number().is_nan()))
}
