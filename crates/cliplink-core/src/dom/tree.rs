//! Arena-backed document tree.
//!
//! Nodes are never freed: removing a node only detaches it, so a `NodeId`
//! handed out once stays valid (though possibly disconnected) for the life of
//! the document. Every structural change is journaled as a [`MutationRecord`].

use std::fmt;

use super::error::DomError;
use super::record::MutationRecord;
use super::selector::Selector;

/// Stable handle to a node within one [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element payload: lowercase tag name plus attributes in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag_name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => self
                .attrs
                .push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.attrs.len() != before
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// In-memory document: a document node with a single `<body>` child.
///
/// The node arena only grows for the lifetime of one page load;
/// `Page::reload` starts a fresh one.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    journal: Vec<MutationRecord>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta", "source"];

impl Dom {
    pub fn new() -> Self {
        let root = NodeId(0);
        let body = NodeId(1);
        let nodes = vec![
            Node {
                parent: None,
                children: vec![body],
                kind: NodeKind::Document,
            },
            Node {
                parent: Some(root),
                children: Vec::new(),
                kind: NodeKind::Element(Element::new("body")),
            },
        ];
        Self {
            nodes,
            root,
            body,
            journal: Vec::new(),
        }
    }

    pub fn document(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Document | NodeKind::Text(_) => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag_name)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// True if `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    /// Concatenated text of all descendant text nodes, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current.0) else {
                continue;
            };
            if let NodeKind::Text(text) = &node.kind {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Create a detached element. Attribute names are lowercased.
    pub fn create_element<I, K, V>(&mut self, tag_name: &str, attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut element = Element::new(tag_name);
        for (k, v) in attrs {
            element.set_attr(k.as_ref(), v.as_ref());
        }
        self.push_node(NodeKind::Element(element))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Text(text.into()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn check_container(&self, parent: NodeId) -> Result<(), DomError> {
        match self.node(parent)?.kind {
            NodeKind::Document | NodeKind::Element(_) => Ok(()),
            NodeKind::Text(_) => Err(DomError::NotAContainer(parent)),
        }
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_container(parent)?;
        self.node(child)?;
        if child == self.root || child == parent || self.is_ancestor(child, parent) {
            return Err(DomError::HierarchyCycle { parent, child });
        }
        Ok(())
    }

    /// Unlink `child` from its current parent, journaling the removal.
    fn detach(&mut self, child: NodeId) -> Result<(), DomError> {
        let Some(old_parent) = self.node(child)?.parent else {
            return Ok(());
        };
        self.node_mut(old_parent)?.children.retain(|c| *c != child);
        self.node_mut(child)?.parent = None;
        self.journal.push(MutationRecord::ChildList {
            target: old_parent,
            added: Vec::new(),
            removed: vec![child],
        });
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insert(parent, child)?;
        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.journal.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        self.check_insert(parent, child)?;
        if self.parent(reference) != Some(parent) || reference == child {
            return Err(DomError::NotAChild { parent, reference });
        }
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let at = siblings
            .iter()
            .position(|c| *c == reference)
            .ok_or(DomError::NotAChild { parent, reference })?;
        siblings.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        self.journal.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detach `id` (and its subtree) from the document.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), DomError> {
        self.node(id)?;
        if id == self.root || id == self.body {
            return Err(DomError::Unremovable(id));
        }
        self.detach(id)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(element) => element.set_attr(name, value),
            NodeKind::Document | NodeKind::Text(_) => return Err(DomError::NotAnElement(id)),
        }
        self.journal.push(MutationRecord::Attributes {
            target: id,
            name: name.to_ascii_lowercase(),
        });
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool, DomError> {
        let removed = match &mut self.node_mut(id)?.kind {
            NodeKind::Element(element) => element.remove_attr(name),
            NodeKind::Document | NodeKind::Text(_) => return Err(DomError::NotAnElement(id)),
        };
        if removed {
            self.journal.push(MutationRecord::Attributes {
                target: id,
                name: name.to_ascii_lowercase(),
            });
        }
        Ok(removed)
    }

    /// Replace all children of `id` in one child-list record.
    pub fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) -> Result<(), DomError> {
        self.check_container(id)?;
        for child in &children {
            self.check_insert(id, *child)?;
        }
        let removed = std::mem::take(&mut self.node_mut(id)?.children);
        for old in &removed {
            self.node_mut(*old)?.parent = None;
        }
        for child in &children {
            self.detach(*child)?;
            self.node_mut(*child)?.parent = Some(id);
        }
        self.node_mut(id)?.children = children.clone();
        self.journal.push(MutationRecord::ChildList {
            target: id,
            added: children,
            removed,
        });
        Ok(())
    }

    /// Replace the children of `id` with a single text node (none if `text` is empty).
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        self.check_container(id)?;
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![self.create_text(text)]
        };
        self.replace_children(id, children)
    }

    /// All connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        let mut matched = Vec::new();
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            if self.element(current).is_some() && selector.matches(self, current) {
                matched.push(current);
            }
            stack.extend(self.children(current).iter().rev());
        }
        matched
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    /// Drain the mutation journal.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.journal)
    }

    /// Serialize `id` and its subtree as HTML.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (k, v) in element.attrs() {
                    out.push(' ');
                    out.push_str(k);
                    if !v.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(v, true));
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag_name.as_str()) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        }
    }
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
