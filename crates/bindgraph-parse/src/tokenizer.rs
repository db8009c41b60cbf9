use std::error::Error;
use std::fmt::{self, Display};

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

/// Punctuators, longest first so greedy matching picks `===` over `==`.
static PUNCTUATORS: &[&str] = &[
    "===", "!==", "...", "**", "?.", "??", "=>", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=",
    "*=", "/=", "+", "-", "*", "/", "%", "<", ">", "!", "=", "?", ":", ".", ",", ";", "(", ")",
    "[", "]", "{", "}",
];

static KEYWORDS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "let", "const", "var", "if", "else", "return", "true", "false", "null", "undefined",
        "typeof",
    ]
    .into_iter()
    .collect()
});

/// A custom error type for the tokenizer.
#[derive(Debug)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError: {}", self.message)
    }
}

impl Error for TokenizerError {}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenType {
    Number,
    /// Quoted string; `value` holds the decoded text.
    String,
    /// Backtick template; `value` holds the raw text between the backticks.
    Template,
    Identifier,
    Keyword,
    Punctuator,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token in a binding expression.
#[derive(Debug, Clone, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} value: {}>", self.token_type, self.value)
    }
}

impl Token {
    pub fn new(value: impl Into<String>, token_type: TokenType, start: usize, end: usize) -> Self {
        Token {
            value: value.into(),
            token_type,
            start,
            end,
        }
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.token_type == TokenType::Punctuator && self.value == punct
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.token_type == TokenType::Keyword && self.value == keyword
    }
}

/// One piece of a template literal.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    Text(String),
    /// Expression source and its byte offset inside the template's raw text.
    Expr(String, usize),
}

pub struct Tokenizer {
    source: String,
    pub items: Vec<Token>,
    offset: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            source: source.to_string(),
            items: Vec::with_capacity(source.len() / 2),
            offset: 0,
        };
        tokenizer.parse()?;
        Ok(tokenizer)
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.source.as_bytes().get(pos).copied()
    }

    fn parse(&mut self) -> Result<(), TokenizerError> {
        while self.offset < self.source.len() {
            let c = self.source.as_bytes()[self.offset];
            match c {
                b' ' | b'\t' | b'\n' | b'\r' => self.offset += 1,
                b'/' if self.byte_at(self.offset + 1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.byte_at(self.offset + 1) == Some(b'*') => {
                    self.skip_block_comment()?
                }
                b'"' | b'\'' => self.parse_string(c)?,
                b'`' => self.parse_template()?,
                b'0'..=b'9' => self.parse_number()?,
                b'.' if matches!(self.byte_at(self.offset + 1), Some(b'0'..=b'9')) => {
                    self.parse_number()?
                }
                _ if c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80 => {
                    self.parse_word()
                }
                _ => self.parse_punctuator()?,
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.byte_at(self.offset) {
            if c == b'\n' {
                break;
            }
            self.offset += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), TokenizerError> {
        let start = self.offset;
        match self.source[self.offset + 2..].find("*/") {
            Some(rel) => {
                self.offset += 2 + rel + 2;
                Ok(())
            }
            None => Err(TokenizerError {
                message: "Unterminated comment".to_string(),
                pos: start,
            }),
        }
    }

    fn parse_string(&mut self, quote: u8) -> Result<(), TokenizerError> {
        let start = self.offset;
        let mut value = String::new();
        let mut chars = self.source[start + 1..].char_indices();
        while let Some((rel, ch)) = chars.next() {
            match ch {
                '\\' => {
                    let Some((_, escaped)) = chars.next() else {
                        break;
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'v' => value.push('\u{b}'),
                        '0' => value.push('\0'),
                        'u' => {
                            let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                            let decoded = u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| TokenizerError {
                                    message: format!("Invalid unicode escape \\u{hex}"),
                                    pos: start + 1 + rel,
                                })?;
                            value.push(decoded);
                        }
                        other => value.push(other),
                    }
                }
                '\n' => break,
                c if c as u32 == quote as u32 => {
                    let end = start + 1 + rel + 1;
                    self.items.push(Token::new(value, TokenType::String, start, end));
                    self.offset = end;
                    return Ok(());
                }
                c => value.push(c),
            }
        }
        Err(TokenizerError {
            message: "Invalid or unexpected token: unterminated string".to_string(),
            pos: start,
        })
    }

    fn parse_template(&mut self) -> Result<(), TokenizerError> {
        let start = self.offset;
        let bytes = self.source.as_bytes();
        let mut i = start + 1;
        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'$' if depth == 0 && bytes.get(i + 1) == Some(&b'{') => {
                    depth = 1;
                    i += 1;
                }
                b'{' if depth > 0 => depth += 1,
                b'}' if depth > 0 => depth -= 1,
                b'`' if depth == 0 => {
                    let raw = self.source[start + 1..i].to_string();
                    self.items
                        .push(Token::new(raw, TokenType::Template, start, i + 1));
                    self.offset = i + 1;
                    return Ok(());
                }
                _ => {}
            }
            i += 1;
        }
        Err(TokenizerError {
            message: "Unterminated template literal".to_string(),
            pos: start,
        })
    }

    fn parse_number(&mut self) -> Result<(), TokenizerError> {
        let start = self.offset;
        let bytes = self.source.as_bytes();
        let mut i = start;

        if bytes[i] == b'0' && matches!(bytes.get(i + 1), Some(b'x' | b'X')) {
            i += 2;
            while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                i += 1;
            }
            let value = i64::from_str_radix(&self.source[start + 2..i], 16).map_err(|_| {
                TokenizerError {
                    message: "Invalid hexadecimal literal".to_string(),
                    pos: start,
                }
            })?;
            self.items
                .push(Token::new(value.to_string(), TokenType::Number, start, i));
            self.offset = i;
            return Ok(());
        }

        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                i = j;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
        if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
            return Err(TokenizerError {
                message: "Invalid or unexpected token after numeric literal".to_string(),
                pos: i,
            });
        }

        self.items.push(Token::new(
            self.source[start..i].to_string(),
            TokenType::Number,
            start,
            i,
        ));
        self.offset = i;
        Ok(())
    }

    fn parse_word(&mut self) {
        let start = self.offset;
        let end = self.source[start..]
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
            .map(|(rel, _)| start + rel)
            .unwrap_or(self.source.len());
        let word = &self.source[start..end];
        let token_type = if KEYWORDS.contains(word) {
            TokenType::Keyword
        } else {
            TokenType::Identifier
        };
        self.items.push(Token::new(word, token_type, start, end));
        self.offset = end;
    }

    fn parse_punctuator(&mut self) -> Result<(), TokenizerError> {
        let start = self.offset;
        let rest = &self.source[start..];
        for punct in PUNCTUATORS {
            if rest.starts_with(punct) {
                // `a?.5:1` is a conditional, not optional chaining.
                if *punct == "?."
                    && matches!(rest.as_bytes().get(2), Some(b'0'..=b'9'))
                {
                    continue;
                }
                let end = start + punct.len();
                self.items
                    .push(Token::new(*punct, TokenType::Punctuator, start, end));
                self.offset = end;
                return Ok(());
            }
        }
        let ch = rest.chars().next().unwrap_or('?');
        Err(TokenizerError {
            message: format!("Invalid or unexpected token '{ch}'"),
            pos: start,
        })
    }
}

/// Split a template literal's raw text into text chunks and `${}` expressions.
pub fn split_template_literal(raw: &str) -> Result<Vec<TemplateChunk>, TokenizerError> {
    let bytes = raw.as_bytes();
    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                let escaped = raw[i + 1..].chars().next().unwrap_or('\\');
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                i += 1 + escaped.len_utf8();
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                if !text.is_empty() {
                    chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                }
                let expr_start = i + 2;
                let mut depth = 1usize;
                let mut j = expr_start;
                while j < bytes.len() {
                    match bytes[j] {
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(TokenizerError {
                        message: "Unterminated template expression".to_string(),
                        pos: i,
                    });
                }
                chunks.push(TemplateChunk::Expr(
                    raw[expr_start..j].to_string(),
                    expr_start,
                ));
                i = j + 1;
            }
            _ => {
                let ch = raw[i..].chars().next().unwrap_or(' ');
                text.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    if !text.is_empty() {
        chunks.push(TemplateChunk::Text(text));
    }
    Ok(chunks)
}
