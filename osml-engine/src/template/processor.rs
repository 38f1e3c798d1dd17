// Template Processor
// Rewrites a template tree in place: markers, OSML control tags and custom tag expansion

use crate::config::ProcessorConfig;
use crate::context::DataContext;
use crate::expression::{contains_expression, ExpressionEngine};
use crate::template::dom::{Document, NodeId, NodeKind};
use crate::template::error::{TemplateError, TemplateErrorKind};
use crate::template::library::TemplateLibrary;
use crate::value::{Array, Value};

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Nesting limit for custom template expansion
const MAX_TEMPLATE_DEPTH: usize = 64;

const ATTR_REPEAT: &str = "repeat";
const ATTR_VAR: &str = "var";
const ATTR_IF: &str = "if";

/// Processes template trees against a data context
#[derive(Debug, Clone)]
pub struct TemplateProcessor {
    config: ProcessorConfig,
    engine: ExpressionEngine,
    flash_embedded: bool,
}

impl TemplateProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        let engine = ExpressionEngine::new(config.evaluator);
        Self {
            config,
            engine,
            flash_embedded: false,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Whether any `os:Flash` tag has been rendered, so the host can
    /// include the flash embedding script
    pub fn flash_embedded(&self) -> bool {
        self.flash_embedded
    }

    /// Rewrite the subtree below `root` in place with `top` as the `Top`
    /// scope. `root` itself is kept; its descendants are processed.
    ///
    /// Any error aborts the pass and leaves the tree partially rewritten.
    pub fn process(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        top: Value,
        library: &mut TemplateLibrary,
    ) -> Result<(), TemplateError> {
        let unique_id = Uuid::new_v4().simple().to_string();
        debug!(unique_id = %unique_id, "processing template");

        let scope = Scope {
            context: DataContext::new(top).with_unique_id(unique_id),
            render_nodes: IndexMap::new(),
            depth: 0,
        };

        let mut rewriter = Rewriter {
            doc,
            library,
            engine: self.engine,
            config: &self.config,
            flash_embedded: false,
        };
        rewriter.process_children(root, &scope)?;
        let flash_embedded = rewriter.flash_embedded;

        self.flash_embedded |= flash_embedded;
        Ok(())
    }
}

/// Everything visible to the nodes currently being processed
#[derive(Debug, Clone)]
struct Scope {
    context: DataContext,
    /// Named child elements of the current custom tag invocation
    render_nodes: IndexMap<String, NodeId>,
    depth: usize,
}

impl Scope {
    fn with_context(&self, context: DataContext) -> Self {
        Self {
            context,
            render_nodes: self.render_nodes.clone(),
            depth: self.depth,
        }
    }
}

/// What the parent loop should do with a processed node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Keep,
    Remove,
}

struct Rewriter<'a> {
    doc: &'a mut Document,
    library: &'a mut TemplateLibrary,
    engine: ExpressionEngine,
    config: &'a ProcessorConfig,
    flash_embedded: bool,
}

impl Rewriter<'_> {
    // =========================================================================
    // Traversal
    // =========================================================================

    fn process_children(&mut self, parent: NodeId, scope: &Scope) -> Result<(), TemplateError> {
        let children = self.doc.children(parent).to_vec();
        self.process_nodes(children, scope)
    }

    /// Process sibling nodes, detaching the ones flagged for removal only
    /// after all of them have been walked
    fn process_nodes(&mut self, nodes: Vec<NodeId>, scope: &Scope) -> Result<(), TemplateError> {
        let mut removals = Vec::new();
        for node in nodes {
            if self.process_node(node, scope)? == Outcome::Remove {
                removals.push(node);
            }
        }
        for node in removals {
            self.doc.detach(node);
        }
        Ok(())
    }

    fn process_node(&mut self, node: NodeId, scope: &Scope) -> Result<Outcome, TemplateError> {
        let text = match self.doc.kind(node) {
            NodeKind::Element(_) => return self.process_element(node, scope),
            NodeKind::Text(text) if contains_expression(text) => text.clone(),
            _ => return Ok(Outcome::Keep),
        };
        let value = self.interpolate(&text, scope)?;
        *self.doc.kind_mut(node) = NodeKind::Text(value);
        Ok(Outcome::Keep)
    }

    fn process_element(&mut self, node: NodeId, scope: &Scope) -> Result<Outcome, TemplateError> {
        if self.doc.has_attribute(node, ATTR_REPEAT) {
            return self.repeat_element(node, scope);
        }

        if let Some(condition) = self.doc.attribute(node, ATTR_IF).map(str::to_string) {
            if !self.condition(&condition, scope)? {
                return Ok(Outcome::Remove);
            }
            self.doc.remove_attribute(node, ATTR_IF);
        }

        let tag = self.doc.tag_name(node).unwrap_or_default().to_string();
        match tag.split_once(':') {
            Some(("os", local)) => self
                .process_os_tag(node, &tag, local, scope)
                .map_err(|e| e.with_tag(tag.as_str())),
            Some(("osx", local)) if local.eq_ignore_ascii_case("flash") => self
                .os_flash(node, &tag, scope)
                .map_err(|e| e.with_tag(tag.as_str())),
            Some(("osx", _)) => {
                warn!(tag = %tag, "leaving unsupported osx tag in place");
                Ok(Outcome::Keep)
            }
            Some(_) if self.library.has_template(&tag) => self
                .expand_template(node, &tag, &tag, scope)
                .map_err(|e| e.with_tag(tag.as_str())),
            _ => self.process_generic(node, &tag, scope),
        }
    }

    fn process_os_tag(
        &mut self,
        node: NodeId,
        tag: &str,
        local: &str,
        scope: &Scope,
    ) -> Result<Outcome, TemplateError> {
        match local.to_ascii_lowercase().as_str() {
            "repeat" => self.os_repeat(node, tag, scope),
            "if" => self.os_if(node, tag, scope),
            "html" => self.os_html(node, tag, scope),
            "render" => self.os_render(node, tag, scope),
            "flash" => self.os_flash(node, tag, scope),
            "name" => self.expand_template(node, tag, "os:Name", scope),
            "badge" => self.expand_template(node, tag, "os:Badge", scope),
            "peopleselector" => self.expand_template(node, tag, "os:PeopleSelector", scope),
            _ => {
                debug!(tag, "leaving unhandled os tag in place");
                Ok(Outcome::Keep)
            }
        }
    }

    // =========================================================================
    // Control tags
    // =========================================================================

    fn os_repeat(&mut self, node: NodeId, tag: &str, scope: &Scope) -> Result<Outcome, TemplateError> {
        let expression = self.required(node, tag, "expression")?;
        let var = self.doc.attribute(node, ATTR_VAR).map(str::to_string);
        let items = self.iteration_items(&expression, scope)?;
        let body = self.doc.children(node).to_vec();
        let count = items.len();
        debug!(expression = %expression, count, "expanding os:Repeat");

        for (index, item) in items.into_iter().enumerate() {
            let iteration = scope.with_context(scope.context.with_loop(item, var.as_deref(), index, count));
            let mut copies = Vec::with_capacity(body.len());
            for &child in &body {
                let copy = self.doc.deep_clone(child);
                self.insert_before(node, copy);
                copies.push(copy);
            }
            self.process_nodes(copies, &iteration)?;
        }
        Ok(Outcome::Remove)
    }

    fn os_if(&mut self, node: NodeId, tag: &str, scope: &Scope) -> Result<Outcome, TemplateError> {
        let condition = self.required(node, tag, "condition")?;
        if self.condition(&condition, scope)? {
            let children = self.doc.children(node).to_vec();
            for &child in &children {
                self.insert_before(node, child);
            }
            self.process_nodes(children, scope)?;
        }
        Ok(Outcome::Remove)
    }

    fn os_html(&mut self, node: NodeId, tag: &str, scope: &Scope) -> Result<Outcome, TemplateError> {
        let code = self.required(node, tag, "code")?;
        let markup = self.evaluate(&code, scope)?.as_string();
        let raw = self.doc.create_raw(markup);
        self.insert_before(node, raw);
        Ok(Outcome::Remove)
    }

    fn os_render(&mut self, node: NodeId, tag: &str, scope: &Scope) -> Result<Outcome, TemplateError> {
        let content = self.required(node, tag, "content")?;
        let source = scope.render_nodes.get(&content).copied().ok_or_else(|| {
            TemplateError::new(
                format!("no child element named '{}' to render", content),
                TemplateErrorKind::UnknownRenderNode,
            )
        })?;

        let mut copies = Vec::new();
        for child in self.doc.children(source).to_vec() {
            let copy = self.doc.deep_clone(child);
            self.insert_before(node, copy);
            copies.push(copy);
        }
        self.process_nodes(copies, scope)?;
        Ok(Outcome::Remove)
    }

    fn os_flash(&mut self, node: NodeId, tag: &str, scope: &Scope) -> Result<Outcome, TemplateError> {
        let swf = self.required(node, tag, "swf")?;
        let swf = self.interpolate(&swf, scope)?;

        let mut params = serde_json::Map::new();
        params.insert("width".to_string(), "100px".into());
        params.insert("height".to_string(), "100px".into());
        params.insert("play".to_string(), "immediate".into());

        for (name, value) in self.attributes(node) {
            if name == "swf" {
                continue;
            }
            let value = self.interpolate(&value, scope)?;
            params.insert(name, value.into());
        }

        if let Some(token) = &self.config.security_token {
            let st = format!("st={}", urlencoding::encode(token));
            let flashvars = match params.get("flashvars").and_then(|v| v.as_str()) {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, st),
                _ => st,
            };
            params.insert("flashvars".to_string(), flashvars.into());
        }

        if self.config.sanitize_flash {
            params.insert("allowscriptaccess".to_string(), "never".into());
            params.insert("swliveconnect".to_string(), "false".into());
            params.insert("allownetworking".to_string(), "internal".into());
        }

        let alt_id = format!("os_Flash_alt_{}", Uuid::new_v4().simple());
        let alt = self.doc.create_element("div");
        self.doc.set_attribute(alt, "id", alt_id.as_str());
        for child in self.doc.children(node).to_vec() {
            self.doc.append_child(alt, child);
        }
        self.insert_before(node, alt);
        self.process_children(alt, scope)?;

        let call = format!(
            "opensocial.template.Flash.embedFlash({}, {}, {}, {});",
            serde_json::Value::from(swf),
            serde_json::Value::from(alt_id),
            serde_json::Value::from(self.config.flash_version.as_str()),
            serde_json::Value::Object(params),
        );
        let script = self.block_element("script", "text/javascript", call);
        self.insert_before(node, script);

        debug!("embedded os:Flash");
        self.flash_embedded = true;
        Ok(Outcome::Remove)
    }

    // =========================================================================
    // Custom templates
    // =========================================================================

    /// Replace an invocation of a library template with the template's
    /// content, processed under a `My` scope built from the invocation
    fn expand_template(
        &mut self,
        node: NodeId,
        tag: &str,
        template_tag: &str,
        scope: &Scope,
    ) -> Result<Outcome, TemplateError> {
        if scope.depth >= MAX_TEMPLATE_DEPTH {
            return Err(TemplateError::new(
                format!("template nesting exceeds {} levels", MAX_TEMPLATE_DEPTH),
                TemplateErrorKind::MaxDepthExceeded,
            ));
        }
        let entry = self.library.get_template(template_tag)?;

        let mut my = IndexMap::new();
        for (name, value) in self.attributes(node) {
            let value = self.attribute_value(&value, scope)?;
            my.insert(name, value);
        }

        let mut render_nodes = IndexMap::new();
        for child in self.doc.child_elements(node) {
            let Some(element) = self.doc.element(child) else {
                continue;
            };
            let name = element.local_name().to_string();
            let mut fields = IndexMap::new();
            for (key, value) in self.attributes(child) {
                let value = self.attribute_value(&value, scope)?;
                fields.insert(key, value);
            }
            my.entry(name.clone())
                .or_insert(Value::Array(Array::Map(fields)));
            render_nodes.insert(name, child);
        }

        debug!(tag, template = template_tag, depth = scope.depth, "expanding custom tag");
        let inner = Scope {
            context: scope.context.with_my(my),
            render_nodes,
            depth: scope.depth + 1,
        };

        for style in self.library.claim_blocks(&entry.styles) {
            let element = self.block_element("style", "text/css", style);
            self.insert_before(node, element);
        }
        for script in self.library.claim_blocks(&entry.scripts) {
            let element = self.block_element("script", "text/javascript", script);
            self.insert_before(node, element);
        }

        let mut expanded = Vec::new();
        for source in self.library.document().children(entry.node).to_vec() {
            let copy = self.doc.import(self.library.document(), source);
            self.insert_before(node, copy);
            expanded.push(copy);
        }
        self.process_nodes(expanded, &inner)?;
        Ok(Outcome::Remove)
    }

    // =========================================================================
    // Plain elements
    // =========================================================================

    fn process_generic(&mut self, node: NodeId, tag: &str, scope: &Scope) -> Result<Outcome, TemplateError> {
        for (name, value) in self.attributes(node) {
            match name.as_str() {
                "selected" | "checked" | "disabled" => {
                    if !boolean_attribute_allowed(&name, tag) {
                        return Err(TemplateError::new(
                            format!("'{}' attribute is not allowed on <{}>", name, tag),
                            TemplateErrorKind::InvalidAttribute,
                        )
                        .with_tag(tag));
                    }
                    if self.condition(&value, scope)? {
                        self.doc.set_attribute(node, name.as_str(), name.as_str());
                    } else {
                        self.doc.remove_attribute(node, &name);
                    }
                }
                _ if contains_expression(&value) => {
                    let value = self.interpolate(&value, scope)?;
                    self.doc.set_attribute(node, name, value);
                }
                _ => {}
            }
        }
        self.process_children(node, scope)?;
        Ok(Outcome::Keep)
    }

    /// One clone of the element per array entry, each processed with its
    /// own loop scope. `if` on the element is evaluated per iteration.
    fn repeat_element(&mut self, node: NodeId, scope: &Scope) -> Result<Outcome, TemplateError> {
        let expression = self.doc.attribute(node, ATTR_REPEAT).unwrap_or_default().to_string();
        let var = self.doc.attribute(node, ATTR_VAR).map(str::to_string);
        let items = self.iteration_items(&expression, scope)?;
        let count = items.len();
        debug!(expression = %expression, count, "expanding repeat attribute");

        for (index, item) in items.into_iter().enumerate() {
            let copy = self.doc.deep_clone(node);
            self.doc.remove_attribute(copy, ATTR_REPEAT);
            if var.is_some() {
                self.doc.remove_attribute(copy, ATTR_VAR);
            }
            self.insert_before(node, copy);

            let iteration = scope.with_context(scope.context.with_loop(item, var.as_deref(), index, count));
            self.process_nodes(vec![copy], &iteration)?;
        }
        Ok(Outcome::Remove)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn evaluate(&self, text: &str, scope: &Scope) -> Result<Value, TemplateError> {
        self.engine
            .evaluate_markers(text, &scope.context)
            .map_err(|e| TemplateError::expression(text, e))
    }

    fn interpolate(&self, text: &str, scope: &Scope) -> Result<String, TemplateError> {
        self.engine
            .interpolate(text, &scope.context)
            .map_err(|e| TemplateError::expression(text, e))
    }

    fn condition(&self, text: &str, scope: &Scope) -> Result<bool, TemplateError> {
        Ok(self.evaluate(text, scope)?.is_truthy())
    }

    /// Marker-bearing values keep their raw type; literals stay strings
    fn attribute_value(&self, text: &str, scope: &Scope) -> Result<Value, TemplateError> {
        if contains_expression(text) {
            self.evaluate(text, scope)
        } else {
            Ok(Value::String(text.to_string()))
        }
    }

    fn iteration_items(&self, expression: &str, scope: &Scope) -> Result<Vec<Value>, TemplateError> {
        match self.evaluate(expression, scope)? {
            Value::Array(array) => Ok(array.values()),
            other => Err(TemplateError::new(
                format!(
                    "repeat expression '{}' did not evaluate to an array (got '{}')",
                    expression, other
                ),
                TemplateErrorKind::NotAnArray,
            )),
        }
    }

    fn required(&self, node: NodeId, tag: &str, name: &str) -> Result<String, TemplateError> {
        self.doc
            .attribute(node, name)
            .map(str::to_string)
            .ok_or_else(|| TemplateError::missing_attribute(tag, name))
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.doc
            .element(node)
            .map(|e| {
                e.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        if let Some(parent) = self.doc.parent(anchor) {
            self.doc.insert_before(parent, node, anchor);
        }
    }

    /// `<script>`/`<style>` element whose body is emitted unescaped
    fn block_element(&mut self, name: &str, mime: &str, body: String) -> NodeId {
        let element = self.doc.create_element(name);
        self.doc.set_attribute(element, "type", mime);
        let raw = self.doc.create_raw(body);
        self.doc.append_child(element, raw);
        element
    }
}

fn boolean_attribute_allowed(attribute: &str, tag: &str) -> bool {
    let tag = tag.to_ascii_lowercase();
    match attribute {
        "selected" => tag == "option",
        "checked" => tag == "input",
        "disabled" => matches!(tag.as_str(), "input" | "button" | "select" | "textarea"),
        _ => true,
    }
}
