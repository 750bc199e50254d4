//! Views handed to predicates and the snapshot returned on a match.

use crate::dom::{Dom, NodeId};

/// Borrowed view of a candidate element, valid during one scan.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    dom: &'a Dom,
    node: NodeId,
}

impl<'a> ElementRef<'a> {
    pub(super) fn new(dom: &'a Dom, node: NodeId) -> Self {
        Self { dom, node }
    }

    pub fn tag_name(&self) -> &'a str {
        self.dom.tag_name(self.node).unwrap_or_default()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.dom.attribute(self.node, name)
    }

    pub fn text(&self) -> String {
        self.dom.text_content(self.node)
    }

    pub(super) fn snapshot(&self) -> MatchedElement {
        let attrs = self
            .dom
            .element(self.node)
            .map(|e| {
                e.attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        MatchedElement {
            node: self.node,
            tag_name: self.tag_name().to_string(),
            attrs,
            text: self.text(),
        }
    }
}

/// The element a watch resolved with, as it was at match time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedElement {
    pub node: NodeId,
    pub tag_name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
}

impl MatchedElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
