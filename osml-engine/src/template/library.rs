// Template Library
// Registry of custom template tags and their script/style blocks

use crate::config::ProcessorConfig;
use crate::template::dom::{Document, NodeId};
use crate::template::error::{TemplateError, TemplateErrorKind};
use crate::template::xml::parse_into;

use indexmap::IndexMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Tags served by the built-in library, loaded on first use
pub const BUILTIN_TAGS: [&str; 3] = ["os:Name", "os:Badge", "os:PeopleSelector"];

/// Handle to a script or style block owned by a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(usize);

/// A script or style body shared between templates
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub content: String,
    /// Already emitted into an output tree
    pub included: bool,
}

/// A registered template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLibraryEntry {
    pub tag: String,
    /// The `<Template>` node inside the library's own document
    pub node: NodeId,
    pub scripts: Vec<BlockId>,
    pub styles: Vec<BlockId>,
}

/// Source of the built-in library document
pub trait LibraryLoader: std::fmt::Debug {
    fn load(&self) -> Result<String, TemplateError>;
}

/// Reads the built-in library from an XML file
#[derive(Debug, Clone)]
pub struct FileLibraryLoader {
    path: PathBuf,
}

impl FileLibraryLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LibraryLoader for FileLibraryLoader {
    fn load(&self) -> Result<String, TemplateError> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            TemplateError::new(
                format!(
                    "failed to read template library '{}': {}",
                    self.path.display(),
                    e
                ),
                TemplateErrorKind::Library,
            )
        })
    }
}

/// Templates keyed by tag name. Template nodes are copied into a document
/// owned by the library, so source documents can be dropped after
/// registration.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    doc: Document,
    entries: IndexMap<String, TemplateLibraryEntry>,
    blocks: Vec<ContentBlock>,
    loader: Option<Box<dyn LibraryLoader>>,
    builtin_loaded: bool,
    builtin_error: Option<TemplateError>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library whose built-in tags come from `config.builtin_library`
    pub fn from_config(config: &ProcessorConfig) -> Self {
        let library = Self::new();
        match &config.builtin_library {
            Some(path) => library.with_loader(Box::new(FileLibraryLoader::new(path))),
            None => library,
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn LibraryLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Document holding every registered template node
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `tag` is registered. Querying a built-in tag triggers the
    /// lazy load; a failed load is logged and reported as absent.
    pub fn has_template(&mut self, tag: &str) -> bool {
        if let Err(e) = self.ensure_builtin(tag) {
            warn!(tag, error = %e, "built-in template library unavailable");
            return false;
        }
        self.entries.contains_key(tag)
    }

    pub fn get_template(&mut self, tag: &str) -> Result<TemplateLibraryEntry, TemplateError> {
        self.ensure_builtin(tag)?;
        self.entries.get(tag).cloned().ok_or_else(|| {
            TemplateError::new(
                format!("unknown template '{}'", tag),
                TemplateErrorKind::UnknownTemplate,
            )
            .with_tag(tag)
        })
    }

    /// Store a script or style body
    pub fn add_block(&mut self, content: impl Into<String>) -> BlockId {
        self.blocks.push(ContentBlock {
            content: content.into(),
            included: false,
        });
        BlockId(self.blocks.len() - 1)
    }

    pub fn block(&self, id: BlockId) -> Option<&ContentBlock> {
        self.blocks.get(id.0)
    }

    /// Register a `<Template>` node keyed by its `tag` attribute, attaching
    /// the given blocks. Re-registering a tag replaces the entry.
    pub fn add_template_by_node(
        &mut self,
        source: &Document,
        node: NodeId,
        scripts: Vec<BlockId>,
        styles: Vec<BlockId>,
    ) -> Result<(), TemplateError> {
        let tag = source
            .attribute(node, "tag")
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| TemplateError::missing_attribute("Template", "tag"))?
            .to_string();
        self.register(tag, source, node, scripts, styles);
        Ok(())
    }

    fn register(
        &mut self,
        tag: String,
        source: &Document,
        node: NodeId,
        scripts: Vec<BlockId>,
        styles: Vec<BlockId>,
    ) {
        let copy = self.doc.import(source, node);
        let root = self.doc.root();
        self.doc.append_child(root, copy);
        debug!(
            tag = %tag,
            scripts = scripts.len(),
            styles = styles.len(),
            "registered template"
        );
        self.entries.insert(
            tag.clone(),
            TemplateLibraryEntry {
                tag,
                node: copy,
                scripts,
                styles,
            },
        );
    }

    /// Register every template in a `<Templates>` document.
    ///
    /// Blocks attach in declaration order: a template receives the
    /// document-level `<JavaScript>`/`<Style>` blocks declared before it,
    /// and a `<TemplateDef>` template additionally receives all of the
    /// def's own blocks.
    pub fn add_template_library(&mut self, xml: &str) -> Result<(), TemplateError> {
        let mut source = Document::new();
        let root = source.root();
        parse_into(&mut source, root, xml).map_err(|e| {
            TemplateError::new(
                format!("malformed template library: {}", e),
                TemplateErrorKind::Library,
            )
        })?;

        let templates = source
            .document_element()
            .filter(|&id| source.tag_name(id) == Some("Templates"))
            .ok_or_else(|| {
                TemplateError::new(
                    "template library root must be <Templates>",
                    TemplateErrorKind::Library,
                )
            })?;

        let mut scripts = Vec::new();
        let mut styles = Vec::new();

        for child in source.child_elements(templates) {
            match source.tag_name(child).unwrap_or_default() {
                "Template" => {
                    self.add_template_by_node(&source, child, scripts.clone(), styles.clone())?
                }
                "TemplateDef" => {
                    self.add_template_def(&source, child, &scripts, &styles)?;
                }
                "JavaScript" => scripts.push(self.add_block(source.text_content(child))),
                "Style" => styles.push(self.add_block(source.text_content(child))),
                other => debug!(element = other, "ignoring unknown library element"),
            }
        }
        Ok(())
    }

    fn add_template_def(
        &mut self,
        source: &Document,
        def: NodeId,
        scripts: &[BlockId],
        styles: &[BlockId],
    ) -> Result<(), TemplateError> {
        let tag = source
            .attribute(def, "tag")
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| TemplateError::missing_attribute("TemplateDef", "tag"))?
            .to_string();

        let mut def_scripts = scripts.to_vec();
        let mut def_styles = styles.to_vec();
        let mut template = None;

        for child in source.child_elements(def) {
            match source.tag_name(child).unwrap_or_default() {
                "Template" if template.is_none() => template = Some(child),
                "JavaScript" => def_scripts.push(self.add_block(source.text_content(child))),
                "Style" => def_styles.push(self.add_block(source.text_content(child))),
                _ => {}
            }
        }

        let template = template.ok_or_else(|| {
            TemplateError::new(
                "<TemplateDef> has no <Template> child",
                TemplateErrorKind::Library,
            )
            .with_tag(tag.as_str())
        })?;
        self.register(tag, source, template, def_scripts, def_styles);
        Ok(())
    }

    /// Contents of the given blocks not yet emitted, marking them emitted
    pub fn claim_blocks(&mut self, ids: &[BlockId]) -> Vec<String> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(block) = self.blocks.get_mut(id.0) {
                if !block.included {
                    block.included = true;
                    out.push(block.content.clone());
                }
            }
        }
        out
    }

    /// Forget which blocks have been emitted, for a fresh output tree
    pub fn reset_included(&mut self) {
        for block in &mut self.blocks {
            block.included = false;
        }
    }

    fn ensure_builtin(&mut self, tag: &str) -> Result<(), TemplateError> {
        if !BUILTIN_TAGS.contains(&tag) {
            return Ok(());
        }
        if !self.builtin_loaded {
            self.builtin_loaded = true;
            if let Err(e) = self.load_builtin() {
                self.builtin_error = Some(e);
            }
        }
        match &self.builtin_error {
            Some(e) => Err(e.clone().with_tag(tag)),
            None => Ok(()),
        }
    }

    fn load_builtin(&mut self) -> Result<(), TemplateError> {
        let loader = self.loader.as_ref().ok_or_else(|| {
            TemplateError::new(
                "no built-in template library configured",
                TemplateErrorKind::Library,
            )
        })?;
        let xml = loader.load()?;
        debug!(loader = ?loader, "loading built-in template library");
        self.add_template_library(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::xml::parse_document;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LIBRARY: &str = r#"<Templates>
  <JavaScript>var a = 1;</JavaScript>
  <Template tag="my:First"><b>first</b></Template>
  <Style>.x { color: red }</Style>
  <Template tag="my:Second"><i>second</i></Template>
  <TemplateDef tag="my:Def">
    <Style>.def {}</Style>
    <Template><u>def</u></Template>
    <JavaScript>var d = 1;</JavaScript>
  </TemplateDef>
</Templates>"#;

    fn contents(library: &TemplateLibrary, ids: &[BlockId]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| library.block(id))
            .map(|b| b.content.clone())
            .collect()
    }

    #[test]
    fn test_blocks_attach_in_declaration_order() {
        let mut library = TemplateLibrary::new();
        library.add_template_library(LIBRARY).unwrap();
        assert_eq!(library.len(), 3);

        let first = library.get_template("my:First").unwrap();
        assert_eq!(contents(&library, &first.scripts), vec!["var a = 1;"]);
        assert!(first.styles.is_empty());

        let second = library.get_template("my:Second").unwrap();
        assert_eq!(contents(&library, &second.styles), vec![".x { color: red }"]);

        let def = library.get_template("my:Def").unwrap();
        assert_eq!(
            contents(&library, &def.scripts),
            vec!["var a = 1;", "var d = 1;"]
        );
        assert_eq!(
            contents(&library, &def.styles),
            vec![".x { color: red }", ".def {}"]
        );
        assert_eq!(library.document().inner_xml(def.node), "<u>def</u>");
    }

    #[test]
    fn test_template_without_tag_rejected() {
        let mut library = TemplateLibrary::new();
        let err = library
            .add_template_library("<Templates><Template><b/></Template></Templates>")
            .unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::MissingAttribute);

        let err = library
            .add_template_library("<Templates><TemplateDef><Template/></TemplateDef></Templates>")
            .unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::MissingAttribute);
    }

    #[test]
    fn test_wrong_root_rejected() {
        let mut library = TemplateLibrary::new();
        let err = library.add_template_library("<Other/>").unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Library);
        assert!(library.add_template_library("<Templates>").is_err());
    }

    #[test]
    fn test_add_template_by_node() {
        let source = parse_document(r#"<Template tag="my:Card"><p/></Template>"#).unwrap();
        let node = source.document_element().unwrap();
        let mut library = TemplateLibrary::new();
        let script = library.add_block("init();");
        library
            .add_template_by_node(&source, node, vec![script], Vec::new())
            .unwrap();

        drop(source);
        let entry = library.get_template("my:Card").unwrap();
        assert_eq!(entry.scripts, vec![script]);
        assert!(library.has_template("my:Card"));
        assert!(!library.has_template("my:Other"));
    }

    #[test]
    fn test_unknown_template_error() {
        let mut library = TemplateLibrary::new();
        let err = library.get_template("my:Missing").unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::UnknownTemplate);
        assert_eq!(err.tag.as_deref(), Some("my:Missing"));
    }

    #[test]
    fn test_claim_blocks_once() {
        let mut library = TemplateLibrary::new();
        let a = library.add_block("a");
        let b = library.add_block("b");
        assert_eq!(library.claim_blocks(&[a]), vec!["a"]);
        assert_eq!(library.claim_blocks(&[a, b]), vec!["b"]);
        assert!(library.claim_blocks(&[a, b]).is_empty());

        library.reset_included();
        assert_eq!(library.claim_blocks(&[b, a]), vec!["b", "a"]);
    }

    #[test]
    fn test_builtin_lazy_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<Templates><Template tag="os:Name"><b>${{My.person.name}}</b></Template></Templates>"#
        )
        .unwrap();

        let config = ProcessorConfig::default().with_builtin_library(file.path());
        let mut library = TemplateLibrary::from_config(&config);
        assert!(library.is_empty());
        assert!(!library.has_template("my:Card"));
        assert!(library.is_empty());

        assert!(library.has_template("os:Name"));
        assert_eq!(library.len(), 1);
        assert!(!library.has_template("os:Badge"));
    }

    #[test]
    fn test_builtin_load_failure() {
        let mut library = TemplateLibrary::new();
        assert!(!library.has_template("os:Name"));
        let err = library.get_template("os:Badge").unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Library);

        let mut library = TemplateLibrary::new()
            .with_loader(Box::new(FileLibraryLoader::new("/nonexistent/osml/library.xml")));
        let err = library.get_template("os:Name").unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Library);
        assert!(err.message.contains("library.xml"));
    }
}
