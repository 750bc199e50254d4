//! Minimal CSS selector support.
//!
//! Covers what page-recognition rules need: type, universal, `#id`, `.class`,
//! `[attr]`, `[attr="v"]`, `[attr^="v"]`, descendant and child combinators,
//! and comma-separated groups. Chains are matched right to left.

use std::fmt;
use std::str::FromStr;

use super::tree::{Dom, Element, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected {found:?} at offset {offset} in selector {selector:?}")]
    Unexpected {
        selector: String,
        found: char,
        offset: usize,
    },
    #[error("unterminated attribute or string in selector {selector:?}")]
    Unterminated { selector: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists(String),
    Equals(String, String),
    Prefix(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    /// Relation to the previous step; ignored for the first step.
    combinator: Combinator,
    compound: Compound,
}

/// Parsed selector. Keeps its source text for display and error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Vec<Step>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        source.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True if element `id` in `dom` matches any group.
    pub fn matches(&self, dom: &Dom, id: NodeId) -> bool {
        self.groups.iter().any(|steps| matches_chain(dom, id, steps))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        };
        let groups = parser.parse_groups()?;
        Ok(Selector {
            source: source.trim().to_string(),
            groups,
        })
    }
}

fn matches_chain(dom: &Dom, id: NodeId, steps: &[Step]) -> bool {
    let Some((last, rest)) = steps.split_last() else {
        return false;
    };
    matches_compound(dom, id, &last.compound) && matches_ancestors(dom, id, last.combinator, rest)
}

/// Whether `rest` matches the ancestors of `current`, where `combinator`
/// links `current` to the last step of `rest`. Descendant steps try every
/// matching ancestor, not only the nearest.
fn matches_ancestors(dom: &Dom, current: NodeId, combinator: Combinator, rest: &[Step]) -> bool {
    let Some((step, earlier)) = rest.split_last() else {
        return true;
    };
    let fits = |p: NodeId| {
        matches_compound(dom, p, &step.compound) && matches_ancestors(dom, p, step.combinator, earlier)
    };
    match combinator {
        Combinator::Child => dom.parent(current).is_some_and(fits),
        Combinator::Descendant => {
            let mut cursor = dom.parent(current);
            while let Some(p) = cursor {
                if fits(p) {
                    return true;
                }
                cursor = dom.parent(p);
            }
            false
        }
    }
}

fn matches_compound(dom: &Dom, id: NodeId, compound: &Compound) -> bool {
    let Some(element) = dom.element(id) else {
        return false;
    };
    if let Some(tag) = &compound.tag {
        if !element.tag_name().eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(want) = &compound.id {
        if element.attr("id") != Some(want.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| element.has_class(c)) {
        return false;
    }
    compound.attrs.iter().all(|cond| attr_matches(element, cond))
}

fn attr_matches(element: &Element, cond: &AttrCondition) -> bool {
    match cond {
        AttrCondition::Exists(name) => element.attr(name).is_some(),
        AttrCondition::Equals(name, value) => element.attr(name) == Some(value.as_str()),
        AttrCondition::Prefix(name, value) => element
            .attr(name)
            .map(|v| !value.is_empty() && v.starts_with(value.as_str()))
            .unwrap_or(false),
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn unexpected(&self) -> SelectorError {
        match self.chars.get(self.pos) {
            Some((offset, found)) => SelectorError::Unexpected {
                selector: self.source.to_string(),
                found: *found,
                offset: *offset,
            },
            None => SelectorError::Unterminated {
                selector: self.source.to_string(),
            },
        }
    }

    fn parse_groups(&mut self) -> Result<Vec<Vec<Step>>, SelectorError> {
        if self.source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut groups = Vec::new();
        loop {
            groups.push(self.parse_chain()?);
            match self.peek() {
                None => return Ok(groups),
                Some(',') => {
                    self.pos += 1;
                }
                Some(_) => return Err(self.unexpected()),
            }
        }
    }

    fn parse_chain(&mut self) -> Result<Vec<Step>, SelectorError> {
        let mut steps = Vec::new();
        self.skip_whitespace();
        loop {
            let combinator = if steps.is_empty() {
                Combinator::Descendant
            } else {
                let had_space = self.skip_whitespace();
                match self.peek() {
                    None | Some(',') => break,
                    Some('>') => {
                        self.pos += 1;
                        self.skip_whitespace();
                        Combinator::Child
                    }
                    Some(_) if had_space => Combinator::Descendant,
                    Some(_) => return Err(self.unexpected()),
                }
            };
            let compound = self.parse_compound()?;
            steps.push(Step {
                combinator,
                compound,
            });
        }
        Ok(steps)
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let start = self.pos;
        if self.peek() == Some('*') {
            self.pos += 1;
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.ident()?);
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
            out.push(c);
            self.pos += 1;
        }
        if out.is_empty() {
            return Err(self.unexpected());
        }
        Ok(out)
    }

    fn attribute(&mut self) -> Result<AttrCondition, SelectorError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let prefix = match self.bump() {
            Some(']') => return Ok(AttrCondition::Exists(name)),
            Some('=') => false,
            Some('^') if self.peek() == Some('=') => {
                self.pos += 1;
                true
            }
            Some(_) => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
            None => return Err(self.unexpected()),
        };
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                        None => {
                            return Err(SelectorError::Unterminated {
                                selector: self.source.to_string(),
                            })
                        }
                    }
                }
                value
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.bump() != Some(']') {
            return Err(SelectorError::Unterminated {
                selector: self.source.to_string(),
            });
        }
        Ok(if prefix {
            AttrCondition::Prefix(name, value)
        } else {
            AttrCondition::Equals(name, value)
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (Dom, NodeId, NodeId) {
        let mut dom = Dom::new();
        let body = dom.body();
        let player = dom.create_element("div", [("class", "player main"), ("id", "player")]);
        let video = dom.create_element(
            "video",
            [("src", "https://production.assets.clips.twitchcdn.net/x.mp4")],
        );
        let title = dom.create_element("h2", [("data-a-target", "stream-title")]);
        dom.append_child(body, player).unwrap();
        dom.append_child(player, video).unwrap();
        dom.append_child(body, title).unwrap();
        (dom, video, title)
    }

    #[test]
    fn matches_type_attribute_and_prefix() {
        let (dom, video, title) = page();
        let by_tag: Selector = "video".parse().unwrap();
        assert!(by_tag.matches(&dom, video));
        assert!(!by_tag.matches(&dom, title));

        let by_attr: Selector = r#"[data-a-target="stream-title"]"#.parse().unwrap();
        assert_eq!(dom.query_selector(&by_attr), Some(title));

        let by_prefix: Selector = r#"video[src^="https://production.assets"]"#.parse().unwrap();
        assert!(by_prefix.matches(&dom, video));
    }

    #[test]
    fn matches_combinators_classes_and_groups() {
        let (dom, video, title) = page();
        let child: Selector = "div.player > video".parse().unwrap();
        assert!(child.matches(&dom, video));
        let descendant: Selector = "body video".parse().unwrap();
        assert!(descendant.matches(&dom, video));
        let wrong_parent: Selector = "section > video".parse().unwrap();
        assert!(!wrong_parent.matches(&dom, video));
        let group: Selector = "#missing, h2".parse().unwrap();
        assert!(group.matches(&dom, title));
        let universal: Selector = "#player > *".parse().unwrap();
        assert_eq!(dom.query_selector_all(&universal), vec![video]);
    }

    #[test]
    fn descendant_step_tries_every_matching_ancestor() {
        // body > div > section > section > video: only the outer section
        // sits directly under the div.
        let mut dom = Dom::new();
        let body = dom.body();
        let div = dom.create_element("div", Vec::<(&str, &str)>::new());
        let outer = dom.create_element("section", Vec::<(&str, &str)>::new());
        let inner = dom.create_element("section", Vec::<(&str, &str)>::new());
        let video = dom.create_element("video", Vec::<(&str, &str)>::new());
        dom.append_child(body, div).unwrap();
        dom.append_child(div, outer).unwrap();
        dom.append_child(outer, inner).unwrap();
        dom.append_child(inner, video).unwrap();

        let s: Selector = "div > section video".parse().unwrap();
        assert!(s.matches(&dom, video));
        let deep: Selector = "body > div section > section > video".parse().unwrap();
        assert!(deep.matches(&dom, video));
        let none: Selector = "body > section video".parse().unwrap();
        assert!(!none.matches(&dom, video));
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("video[src"),
            Err(SelectorError::Unterminated { .. })
        ));
        assert!(matches!(
            Selector::parse("video!"),
            Err(SelectorError::Unexpected { found: '!', .. })
        ));
        assert!(matches!(
            Selector::parse("[src=\"abc]"),
            Err(SelectorError::Unterminated { .. })
        ));
    }

    #[test]
    fn display_keeps_source() {
        let s: Selector = " video ".parse().unwrap();
        assert_eq!(s.to_string(), "video");
        assert_eq!(s.as_str(), "video");
    }
}
