// Template Tree
// Arena of element/text nodes with stable handles, mutated in place by the processor

use indexmap::IndexMap;

/// Stable handle to a node in a `Document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An element: qualified tag name plus ordered attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
}

impl Element {
    /// Tag name without its namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Container for top-level nodes
    Document,
    Element(Element),
    /// Character data, escaped on output
    Text(String),
    /// Markup emitted verbatim
    Raw(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Node arena. Detached nodes stay allocated so handles never dangle.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First element child of the document node
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some())
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element(Element {
            name: name.into(),
            attributes: IndexMap::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn create_raw(&mut self, markup: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Raw(markup.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Element children only
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.element(child).is_some())
            .collect()
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) | NodeKind::Raw(text) => out.push_str(text),
            _ => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.insert(name.into(), value.into());
        }
    }

    /// Remove an attribute, keeping the order of the rest
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)
            .and_then(|e| e.attributes.shift_remove(name))
    }

    // =========================================================================
    // Structure
    // =========================================================================

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` before `reference`, a child of `parent`. Appends when
    /// `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let siblings = &mut self.nodes[parent.0].children;
        match siblings.iter().position(|&c| c == reference) {
            Some(pos) => siblings.insert(pos, child),
            None => siblings.push(child),
        }
    }

    /// Unlink a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Copy a subtree; the copy is unattached
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let copy = self.alloc(kind);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Copy a subtree from another document into this one, unattached
    pub fn import(&mut self, source: &Document, id: NodeId) -> NodeId {
        let copy = self.alloc(source.kind(id).clone());
        for &child in source.children(id) {
            let child_copy = self.import(source, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize a node and its subtree
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize the children of a node without the node itself
    pub fn inner_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Document => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Raw(markup) => out.push_str(markup),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "card");
        doc.append_child(root, div);
        let first = doc.create_text("a");
        let second = doc.create_element("b");
        doc.append_child(div, first);
        doc.append_child(div, second);
        (doc, div, first, second)
    }

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attribute(p, "title", "\"x\" & y");
        let text = doc.create_text("1 < 2");
        doc.append_child(p, text);
        assert_eq!(doc.to_xml(p), r#"<p title="&quot;x&quot; &amp; y">1 &lt; 2</p>"#);
    }

    #[test]
    fn test_raw_is_verbatim() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let raw = doc.create_raw("<b>bold</b>");
        doc.append_child(p, raw);
        assert_eq!(doc.to_xml(p), "<p><b>bold</b></p>");
    }

    #[test]
    fn test_insert_before_and_detach() {
        let (mut doc, div, first, second) = sample();
        let inserted = doc.create_element("i");
        doc.insert_before(div, inserted, second);
        assert_eq!(doc.children(div), &[first, inserted, second]);

        doc.detach(first);
        assert_eq!(doc.children(div), &[inserted, second]);
        assert_eq!(doc.parent(first), None);
        assert_eq!(doc.to_xml(doc.root()), r#"<div class="card"><i/><b/></div>"#);
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let (mut doc, div, _, _) = sample();
        let copy = doc.deep_clone(div);
        doc.set_attribute(copy, "class", "other");
        assert_eq!(doc.attribute(div, "class"), Some("card"));
        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.inner_xml(copy), "a<b/>");
    }

    #[test]
    fn test_import_from_other_document() {
        let (source, div, _, _) = sample();
        let mut target = Document::new();
        let imported = target.import(&source, div);
        let root = target.root();
        target.append_child(root, imported);
        assert_eq!(target.to_xml(root), source.to_xml(source.root()));
    }

    #[test]
    fn test_remove_attribute_keeps_order() {
        let mut doc = Document::new();
        let el = doc.create_element("input");
        doc.set_attribute(el, "a", "1");
        doc.set_attribute(el, "b", "2");
        doc.set_attribute(el, "c", "3");
        assert_eq!(doc.remove_attribute(el, "b"), Some("2".to_string()));
        assert_eq!(doc.to_xml(el), r#"<input a="1" c="3"/>"#);
    }

    #[test]
    fn test_local_name() {
        let mut doc = Document::new();
        let el = doc.create_element("os:Repeat");
        assert_eq!(doc.element(el).unwrap().local_name(), "Repeat");
        assert_eq!(doc.text_content(el), "");
    }
}
