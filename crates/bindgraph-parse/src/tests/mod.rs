mod parser;
mod scope;
mod tokenizer;
