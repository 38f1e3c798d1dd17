// Template Module
// OSML template trees: node arena, XML reader, template library and the tree rewriter

pub mod dom;
pub mod error;
pub mod library;
pub mod processor;
pub mod xml;

pub use dom::{Document, Element, NodeId, NodeKind};
pub use error::{TemplateError, TemplateErrorKind};
pub use library::{
    BlockId, ContentBlock, FileLibraryLoader, LibraryLoader, TemplateLibrary,
    TemplateLibraryEntry, BUILTIN_TAGS,
};
pub use processor::TemplateProcessor;
pub use xml::{parse_document, parse_into, XmlError};
