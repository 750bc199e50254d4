//! Replay scripts: a starting location and a list of steps that play the
//! part of the host application (route changes and re-renders).
//!
//! ```toml
//! location = "https://www.twitch.tv/someone/clip/x"
//!
//! [[step]]
//! action = "append"
//! tag = "video"
//! attrs = { src = "https://production.assets.clips.twitchcdn.net/x.mp4" }
//!
//! [[step]]
//! action = "navigate"
//! to = "https://www.twitch.tv/someone/clip/y"
//! ```

use anyhow::{anyhow, bail, Context, Result};
use cliplink_core::dom::{Dom, NodeId, Selector};
use cliplink_core::Page;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplayScript {
    /// Location of the page when the script starts.
    pub location: String,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read replay script: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("parse replay script: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// `history.pushState`: the location changes, the document does not.
    Navigate { to: String },
    /// `history.replaceState`.
    ReplaceLocation { to: String },
    Back,
    Forward,
    /// Append a new element to the first match of `parent` (default `body`).
    Append {
        #[serde(default)]
        parent: Option<String>,
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        text: Option<String>,
    },
    /// Remove the first match of `selector`.
    Remove { selector: String },
    SetAttr {
        selector: String,
        name: String,
        value: String,
    },
    SetText { selector: String, text: String },
    SleepMs { ms: u64 },
    /// Give pending watches a chance to run.
    Settle,
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Navigate { .. } => "navigate",
            Step::ReplaceLocation { .. } => "replace_location",
            Step::Back => "back",
            Step::Forward => "forward",
            Step::Append { .. } => "append",
            Step::Remove { .. } => "remove",
            Step::SetAttr { .. } => "set_attr",
            Step::SetText { .. } => "set_text",
            Step::SleepMs { .. } => "sleep_ms",
            Step::Settle => "settle",
        }
    }

    pub async fn play(&self, page: &Page) -> Result<()> {
        match self {
            Step::Navigate { to } => page.push_location(to.as_str()),
            Step::ReplaceLocation { to } => page.replace_location(to.as_str()),
            Step::Back => {
                if !page.back() {
                    bail!("no earlier history entry");
                }
            }
            Step::Forward => {
                if !page.forward() {
                    bail!("no later history entry");
                }
            }
            Step::Append {
                parent,
                tag,
                attrs,
                text,
            } => {
                let parent: Selector = parent.as_deref().unwrap_or("body").parse()?;
                page.mutate(|dom| -> Result<()> {
                    let target = first_match(dom, &parent)?;
                    let el = dom.create_element(tag, attrs);
                    if let Some(text) = text {
                        let t = dom.create_text(text.as_str());
                        dom.append_child(el, t)?;
                    }
                    dom.append_child(target, el)?;
                    Ok(())
                })?;
            }
            Step::Remove { selector } => {
                let selector: Selector = selector.parse()?;
                page.mutate(|dom| -> Result<()> {
                    let target = first_match(dom, &selector)?;
                    dom.remove_node(target)?;
                    Ok(())
                })?;
            }
            Step::SetAttr {
                selector,
                name,
                value,
            } => {
                let selector: Selector = selector.parse()?;
                page.mutate(|dom| -> Result<()> {
                    let target = first_match(dom, &selector)?;
                    dom.set_attribute(target, name, value)?;
                    Ok(())
                })?;
            }
            Step::SetText { selector, text } => {
                let selector: Selector = selector.parse()?;
                page.mutate(|dom| -> Result<()> {
                    let target = first_match(dom, &selector)?;
                    dom.set_text_content(target, text)?;
                    Ok(())
                })?;
            }
            Step::SleepMs { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Settle => settle().await,
        }
        Ok(())
    }
}

fn first_match(dom: &Dom, selector: &Selector) -> Result<NodeId> {
    dom.query_selector(selector)
        .ok_or_else(|| anyhow!("no element matches {selector}"))
}

/// Yield until spawned work has had a turn, then a short real-time pause
/// for tasks on other worker threads.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
}
