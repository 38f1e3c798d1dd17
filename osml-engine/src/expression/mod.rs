// Expression Engine Module
// `${...}` expression language: token model, lexer, parser and the legacy evaluator

pub mod evaluator;
pub mod functions;
pub mod legacy;
pub mod lexer;
pub mod parser;
pub mod types;

pub use evaluator::{EvalError, ExpressionEngine};
pub use functions::BuiltinFunctions;
pub use legacy::{ExpressionError, LegacyEvaluator};
pub use lexer::{contains_expression, extract_expressions, Fragment, LexError, Lexer};
pub use parser::{ParseError, ParseErrorKind, Parser, PrimitiveExpression, ScopeReason};
pub use types::{Function, Operator, Paren, Ternary, Token, TokenType, TypeError};
