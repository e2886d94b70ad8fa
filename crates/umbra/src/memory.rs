//! An in-memory [`Document`] with a minimal cascade.
//!
//! Rendered style of a property resolves, in order, to: the inline value if
//! one is set, the element's own base style, the last matching class/tag
//! rule, and finally a fixed initial value (`rgb(0, 0, 0)` for `color`,
//! transparent for other solid colors, `none` for composites and filter).
//! There is no inheritance.
//!
//! Selectors are compound only: an optional tag followed by any number of
//! `.class` and `#id` parts, comma-separated. Anything else is an invalid
//! selector and matches nothing.
//!
//! While observed, structural and class changes are recorded and can be
//! collected with [`MemoryDocument::take_records`], the way a browser
//! observer delivers batches.
//!
//! ```rust
//! use umbra::memory::MemoryDocument;
//! use umbra::property::StyleProperty;
//! use umbra::Document;
//!
//! let mut doc = MemoryDocument::new();
//! let body = doc.body().unwrap();
//! let item = doc.append(&body, "li");
//! doc.add_rule(".active", StyleProperty::Color, "rgb(64, 158, 255)");
//! doc.add_class(&item, "active");
//! assert_eq!(doc.computed_style(&item, StyleProperty::Color), "rgb(64, 158, 255)");
//! ```

use std::collections::HashMap;

use crate::dom::{Document, ElementId, NodeKind};
use crate::property::StyleProperty;
use crate::watcher::{MutationRecord, ObserveOptions};

/// Handle to a node of a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(usize);

impl NodeRef {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    kind: NodeKind,
    id: Option<String>,
    classes: Vec<String>,
    parent: Option<usize>,
    children: Vec<usize>,
    base: HashMap<StyleProperty, String>,
    inline: HashMap<StyleProperty, String>,
}

impl Node {
    fn new(tag: &str, kind: NodeKind) -> Self {
        Self {
            tag: tag.to_string(),
            kind,
            id: None,
            classes: Vec::new(),
            parent: None,
            children: Vec::new(),
            base: HashMap::new(),
            inline: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        let mut out = Compound {
            tag: None,
            id: None,
            classes: Vec::new(),
        };

        let tag_end = input.find(|c: char| !is_ident(c)).unwrap_or(input.len());
        if tag_end > 0 {
            out.tag = Some(input[..tag_end].to_ascii_lowercase());
        }

        let mut rest = &input[tag_end..];
        while let Some(marker) = rest.chars().next() {
            if marker != '.' && marker != '#' {
                return None;
            }
            let body = &rest[1..];
            let end = body.find(|c: char| !is_ident(c)).unwrap_or(body.len());
            if end == 0 {
                return None;
            }
            let name = body[..end].to_string();
            if marker == '.' {
                out.classes.push(name);
            } else {
                out.id = Some(name);
            }
            rest = &body[end..];
        }
        Some(out)
    }

    fn matches(&self, node: &Node) -> bool {
        if node.kind == NodeKind::Other {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.classes.contains(c))
    }
}

fn parse_selector_list(list: &str) -> Option<Vec<Compound>> {
    list.split(',').map(Compound::parse).collect()
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Compound,
    property: StyleProperty,
    value: String,
}

/// Arena-backed document tree.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Node>,
    rules: Vec<Rule>,
    observing: Option<(usize, ObserveOptions)>,
    records: Vec<MutationRecord<NodeRef>>,
    inline_writes: usize,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A document holding `<html><body></body></html>`.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node::new("html", NodeKind::Html)],
            rules: Vec::new(),
            observing: None,
            records: Vec::new(),
            inline_writes: 0,
        };
        let body = doc.create_element("body");
        doc.attach(0, body.0);
        doc
    }

    /// The `<html>` element.
    pub const fn root(&self) -> NodeRef {
        NodeRef(0)
    }

    /// A detached HTML element.
    pub fn create_element(&mut self, tag: &str) -> NodeRef {
        self.push_node(Node::new(tag, NodeKind::Html))
    }

    /// A detached SVG element.
    pub fn create_svg_element(&mut self, tag: &str) -> NodeRef {
        self.push_node(Node::new(tag, NodeKind::Svg))
    }

    /// Create an HTML element and append it to `parent`.
    pub fn append(&mut self, parent: &NodeRef, tag: &str) -> NodeRef {
        let el = self.create_element(tag);
        self.append_child(parent, &el);
        el
    }

    /// Create an SVG element and append it to `parent`.
    pub fn append_svg(&mut self, parent: &NodeRef, tag: &str) -> NodeRef {
        let el = self.create_svg_element(tag);
        self.append_child(parent, &el);
        el
    }

    /// Append a text node to `parent`.
    pub fn append_text(&mut self, parent: &NodeRef) -> NodeRef {
        let text = self.push_node(Node::new("#text", NodeKind::Other));
        self.append_child(parent, &text);
        text
    }

    /// Move `child` (and its subtree) under `parent`.
    pub fn append_child(&mut self, parent: &NodeRef, child: &NodeRef) {
        if let Some(old) = self.nodes[child.0].parent {
            self.detach(old, child.0);
            self.record_if_observed(old, || MutationRecord::removed(NodeRef(old), vec![*child]));
        }
        self.attach(parent.0, child.0);
        self.record_if_observed(parent.0, || MutationRecord::added(*parent, vec![*child]));
    }

    /// Detach `node` from its parent.
    pub fn remove(&mut self, node: &NodeRef) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        self.detach(parent, node.0);
        self.record_if_observed(parent, || MutationRecord::removed(NodeRef(parent), vec![*node]));
    }

    /// Returns true if `node` is reachable from the root.
    pub fn is_connected(&self, node: &NodeRef) -> bool {
        self.chain(node.0).any(|i| i == 0)
    }

    pub fn set_id(&mut self, node: &NodeRef, id: &str) {
        self.nodes[node.0].id = Some(id.to_string());
    }

    /// Add a class; records a class mutation while observed.
    pub fn add_class(&mut self, node: &NodeRef, class: &str) {
        if !self.nodes[node.0].classes.iter().any(|c| c == class) {
            self.nodes[node.0].classes.push(class.to_string());
            self.record_if_observed(node.0, || MutationRecord::class_changed(*node));
        }
    }

    /// Remove a class; records a class mutation while observed.
    pub fn remove_class(&mut self, node: &NodeRef, class: &str) {
        let before = self.nodes[node.0].classes.len();
        self.nodes[node.0].classes.retain(|c| c != class);
        if self.nodes[node.0].classes.len() != before {
            self.record_if_observed(node.0, || MutationRecord::class_changed(*node));
        }
    }

    pub fn has_class(&self, node: &NodeRef, class: &str) -> bool {
        self.nodes[node.0].classes.iter().any(|c| c == class)
    }

    /// Style the element gets from the stylesheet, below any matching rule.
    pub fn set_base_style(&mut self, node: &NodeRef, property: StyleProperty, value: &str) {
        self.nodes[node.0].base.insert(property, value.to_string());
    }

    /// Add a stylesheet rule. Later rules win over earlier ones.
    ///
    /// Returns false (and adds nothing) for an invalid selector.
    pub fn add_rule(&mut self, selector: &str, property: StyleProperty, value: &str) -> bool {
        let Some(compounds) = parse_selector_list(selector) else {
            return false;
        };
        for selector in compounds {
            self.rules.push(Rule {
                selector,
                property,
                value: value.to_string(),
            });
        }
        true
    }

    /// Collect the mutation records gathered since the last call.
    pub fn take_records(&mut self) -> Vec<MutationRecord<NodeRef>> {
        std::mem::take(&mut self.records)
    }

    /// Returns true while an observer is attached.
    pub fn is_observing(&self) -> bool {
        self.observing.is_some()
    }

    /// Total inline style writes made through [`Document::set_inline_style`].
    pub fn inline_writes(&self) -> usize {
        self.inline_writes
    }

    fn push_node(&mut self, node: Node) -> NodeRef {
        self.nodes.push(node);
        NodeRef(self.nodes.len() - 1)
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn detach(&mut self, parent: usize, child: usize) {
        self.nodes[parent].children.retain(|&c| c != child);
        self.nodes[child].parent = None;
    }

    /// `start` and its ancestors, nearest first.
    fn chain(&self, start: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(start), move |&i| self.nodes[i].parent)
    }

    fn record_if_observed<F>(&mut self, target: usize, record: F)
    where
        F: FnOnce() -> MutationRecord<NodeRef>,
    {
        let Some((root, options)) = &self.observing else {
            return;
        };
        let inside = if options.subtree {
            self.chain(target).any(|i| i == *root)
        } else {
            target == *root
        };
        if !inside {
            return;
        }
        let record = record();
        let wanted = match &record {
            MutationRecord::ChildList { .. } => options.child_list,
            MutationRecord::Attributes { name, .. } => {
                options.attribute_filter.iter().any(|a| a == name)
            }
        };
        if wanted {
            self.records.push(record);
        }
    }

    fn collect_descendants(&self, index: usize, out: &mut Vec<NodeRef>) {
        for &child in &self.nodes[index].children {
            out.push(NodeRef(child));
            self.collect_descendants(child, out);
        }
    }
}

fn initial_value(property: StyleProperty) -> &'static str {
    match property {
        StyleProperty::Color => "rgb(0, 0, 0)",
        StyleProperty::BackgroundImage
        | StyleProperty::BoxShadow
        | StyleProperty::TextShadow
        | StyleProperty::Filter => "none",
        _ => "rgba(0, 0, 0, 0)",
    }
}

impl Document for MemoryDocument {
    type Element = NodeRef;

    fn query_selector(&self, selector: &str) -> Option<NodeRef> {
        let compounds = parse_selector_list(selector)?;
        let root = self.root();
        self.subtree(&root)
            .into_iter()
            .find(|n| compounds.iter().any(|c| c.matches(&self.nodes[n.0])))
    }

    fn body(&self) -> Option<NodeRef> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|&i| self.nodes[i].tag == "body")
            .map(NodeRef)
    }

    fn descendants(&self, element: &NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.collect_descendants(element.0, &mut out);
        out
    }

    fn parent(&self, element: &NodeRef) -> Option<NodeRef> {
        self.nodes[element.0].parent.map(NodeRef)
    }

    fn node_kind(&self, element: &NodeRef) -> NodeKind {
        self.nodes[element.0].kind
    }

    fn tag_name(&self, element: &NodeRef) -> String {
        let node = &self.nodes[element.0];
        match node.kind {
            NodeKind::Html => node.tag.to_ascii_uppercase(),
            _ => node.tag.clone(),
        }
    }

    fn computed_style(&self, element: &NodeRef, property: StyleProperty) -> String {
        let node = &self.nodes[element.0];
        if node.kind == NodeKind::Other {
            return String::new();
        }
        if let Some(v) = node.inline.get(&property).filter(|v| !v.is_empty()) {
            return v.clone();
        }
        if let Some(v) = node.base.get(&property) {
            return v.clone();
        }
        self.rules
            .iter()
            .rev()
            .find(|r| r.property == property && r.selector.matches(node))
            .map_or_else(|| initial_value(property).to_string(), |r| r.value.clone())
    }

    fn inline_style(&self, element: &NodeRef, property: StyleProperty) -> String {
        self.nodes[element.0]
            .inline
            .get(&property)
            .cloned()
            .unwrap_or_default()
    }

    fn set_inline_style(&mut self, element: &NodeRef, property: StyleProperty, value: &str) {
        let node = &mut self.nodes[element.0];
        if node.kind == NodeKind::Other {
            return;
        }
        self.inline_writes += 1;
        if value.is_empty() {
            node.inline.remove(&property);
        } else {
            node.inline.insert(property, value.to_string());
        }
    }

    fn closest(&self, element: &NodeRef, selector: &str) -> bool {
        let Some(compounds) = parse_selector_list(selector) else {
            return false;
        };
        self.chain(element.0)
            .any(|i| compounds.iter().any(|c| c.matches(&self.nodes[i])))
    }

    fn element_id(&self, element: &NodeRef) -> ElementId {
        ElementId(element.0 as u64)
    }

    fn observe(&mut self, root: &NodeRef, options: &ObserveOptions) {
        self.observing = Some((root.0, options.clone()));
    }

    fn disconnect(&mut self) {
        self.observing = None;
        self.records.clear();
    }
}
