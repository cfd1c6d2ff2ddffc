pub mod ast;
pub mod document;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod requires;
pub mod rules;
pub mod widget;
