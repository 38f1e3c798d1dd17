// OSML Engine Library
// Expression evaluation and template rewriting for OpenSocial markup

pub mod config;
pub mod context;
pub mod expression;
pub mod template;
pub mod value;

// Re-export configuration types
pub use config::{ConfigError, EvaluatorKind, ProcessorConfig};

// Re-export data model types
pub use context::{DataContext, LoopState};
pub use value::{Array, DataObject, Value};

// Re-export expression types
pub use expression::{
    EvalError, ExpressionEngine, ExpressionError, LexError, Lexer, ParseError, ParseErrorKind,
    Parser, Token, TokenType, TypeError,
};

// Re-export template types
pub use template::{
    parse_document, BlockId, ContentBlock, Document, FileLibraryLoader, LibraryLoader, NodeId,
    NodeKind, TemplateError, TemplateErrorKind, TemplateLibrary, TemplateLibraryEntry,
    TemplateProcessor, XmlError,
};
