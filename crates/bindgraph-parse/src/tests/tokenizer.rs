use crate::tokenizer::{TemplateChunk, TokenType, Tokenizer, split_template_literal};

fn kinds(src: &str) -> Vec<(TokenType, String)> {
    Tokenizer::new(src)
        .unwrap()
        .items
        .into_iter()
        .map(|t| (t.token_type, t.value))
        .collect()
}

#[test]
fn test_tokenize_member_chain() {
    let tokens = kinds("Table1.selectedRow?.name");
    assert_eq!(
        tokens,
        vec![
            (TokenType::Identifier, "Table1".to_string()),
            (TokenType::Punctuator, ".".to_string()),
            (TokenType::Identifier, "selectedRow".to_string()),
            (TokenType::Punctuator, "?.".to_string()),
            (TokenType::Identifier, "name".to_string()),
        ]
    );
}

#[test]
fn test_longest_punctuator_wins() {
    let values: Vec<String> = kinds("a === b !== c ?? d ** 2")
        .into_iter()
        .filter(|(t, _)| *t == TokenType::Punctuator)
        .map(|(_, v)| v)
        .collect();
    assert_eq!(values, vec!["===", "!==", "??", "**"]);
}

#[test]
fn test_optional_dot_before_digit_is_conditional() {
    let values: Vec<String> = kinds("a?.5:1").into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec!["a", "?", ".5", ":", "1"]);
}

#[test]
fn test_string_escapes_are_decoded() {
    let tokens = kinds(r#""a\n\"b\"" 'cA'"#);
    assert_eq!(tokens[0], (TokenType::String, "a\n\"b\"".to_string()));
    assert_eq!(tokens[1], (TokenType::String, "cA".to_string()));
}

#[test]
fn test_keywords_and_comments() {
    let tokens = kinds("// lead\nlet x = /* inline */ null");
    assert_eq!(tokens[0], (TokenType::Keyword, "let".to_string()));
    assert_eq!(tokens[1], (TokenType::Identifier, "x".to_string()));
    assert_eq!(tokens[3], (TokenType::Keyword, "null".to_string()));
    assert_eq!(tokens.len(), 4);
}

#[test]
fn test_numbers() {
    let tokens = kinds("1.5e3 0xff .25");
    assert_eq!(tokens[0].0, TokenType::Number);
    assert_eq!(tokens[0].1.parse::<f64>().unwrap(), 1500.0);
    assert_eq!(tokens[1].1.parse::<f64>().unwrap(), 255.0);
    assert_eq!(tokens[2].1.parse::<f64>().unwrap(), 0.25);
}

#[test]
fn test_token_spans() {
    let tokens = Tokenizer::new("  foo + 'bar'").unwrap().items;
    assert_eq!((tokens[0].start, tokens[0].end), (2, 5));
    assert_eq!((tokens[2].start, tokens[2].end), (8, 13));
}

#[test]
fn test_errors() {
    assert!(Tokenizer::new("'unterminated").is_err());
    assert!(Tokenizer::new("a # b").is_err());
    assert!(Tokenizer::new("12abc").is_err());
    assert!(Tokenizer::new("/* open").is_err());
}

#[test]
fn test_template_chunks() {
    let chunks = split_template_literal("Hi ${user.name}, ${ {a:1}.a }!").unwrap();
    assert_eq!(
        chunks,
        vec![
            TemplateChunk::Text("Hi ".to_string()),
            TemplateChunk::Expr("user.name".to_string(), 5),
            TemplateChunk::Text(", ".to_string()),
            TemplateChunk::Expr(" {a:1}.a ".to_string(), 19),
            TemplateChunk::Text("!".to_string()),
        ]
    );
}
