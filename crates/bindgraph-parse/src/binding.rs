//! Locating `{{ ... }}` binding spans inside raw property strings.

/// Byte span of one binding, braces included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSpan {
    pub start: usize,
    pub end: usize,
}

impl BindingSpan {
    /// The expression source between the braces.
    pub fn inner<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start + 2..self.end - 2]
    }

    /// Byte offset of [`BindingSpan::inner`] within the full string.
    pub fn inner_offset(&self) -> usize {
        self.start + 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart<'a> {
    Text(&'a str),
    Binding { source: &'a str, offset: usize },
}

/// Find every complete binding. An opening `{{` without a matching `}}` is
/// plain text.
pub fn find_bindings(source: &str) -> Vec<BindingSpan> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            match scan_binding_end(bytes, i + 2) {
                Some(end) => {
                    spans.push(BindingSpan { start: i, end });
                    i = end;
                    continue;
                }
                None => break,
            }
        }
        i += 1;
    }
    spans
}

/// Scan from just after `{{` to the byte after the closing `}}`.
///
/// Braces opened inside the expression (object literals, blocks) must close
/// before `}}` counts, and quoted text is skipped wholesale.
fn scan_binding_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'}' {
                        return Some(i + 2);
                    }
                } else {
                    depth -= 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

pub fn is_dynamic(source: &str) -> bool {
    !find_bindings(source).is_empty()
}

/// When the trimmed string is exactly one binding, return its expression source.
pub fn single_binding(source: &str) -> Option<&str> {
    let trimmed = source.trim();
    let spans = find_bindings(trimmed);
    match spans.as_slice() {
        [only] if only.start == 0 && only.end == trimmed.len() => Some(only.inner(trimmed)),
        _ => None,
    }
}

/// Split a string into literal text and binding parts, in order.
pub fn split_template(source: &str) -> Vec<TemplatePart<'_>> {
    let mut parts = Vec::new();
    let mut cursor = 0;
    for span in find_bindings(source) {
        if span.start > cursor {
            parts.push(TemplatePart::Text(&source[cursor..span.start]));
        }
        parts.push(TemplatePart::Binding {
            source: span.inner(source),
            offset: span.inner_offset(),
        });
        cursor = span.end;
    }
    if cursor < source.len() {
        parts.push(TemplatePart::Text(&source[cursor..]));
    }
    parts
}
