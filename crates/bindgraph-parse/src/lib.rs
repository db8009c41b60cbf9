pub mod binding;
pub mod parser;
pub mod scope;
pub mod tokenizer;

#[cfg(test)]
mod tests;

pub use binding::{BindingSpan, TemplatePart, find_bindings, is_dynamic, single_binding, split_template};
pub use parser::{
    ASTNode, ASTNodeType, ArrowBody, ArrowFunction, DeclKind, LiteralValue, MAX_NESTING_DEPTH,
    MemberProperty, ObjectProperty, Parser, ParserError, Program, PropertyKey, Span, Statement,
    parse_expression, parse_program,
};
pub use scope::{ReferenceChain, collect_program_references, collect_reference_chains};
pub use tokenizer::{Token, TokenType, Tokenizer, TokenizerError};

// Re-export common types
pub use bindgraph_common::{BindError, BindErrorKind, PathSegment, PropertyPath};
