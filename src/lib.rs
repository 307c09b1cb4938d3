pub mod builtins;
pub mod catalog;
pub mod compiler;
pub mod context;
pub mod environment;
pub mod equality;
pub mod error;
pub mod expr;
pub mod interpolation;
pub mod interpreter;
pub mod number;
pub mod options;
pub mod parser;
pub mod printer;
pub mod resolver;
pub mod simplifier;
pub mod token;
pub mod tokenizer;
pub mod trie;
pub mod types;
pub mod value;

pub use compiler::ExpressionCompiler;
pub use error::{CompileError, Result};
