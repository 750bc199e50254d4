//! A fake clip site: one `<main>` region the "application" re-renders on
//! every route change, plus helpers to drive and inspect it.

use cliplink_core::config::CliplinkConfig;
use cliplink_core::dom::{Dom, NodeId, Selector};
use cliplink_core::orchestrator::{NavigationOutcome, Orchestrator, Running};
use cliplink_core::{Page, Session};
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub const TITLE: &str = r#"[data-a-target="stream-title"]"#;

pub fn config(cancel_superseded: bool) -> CliplinkConfig {
    CliplinkConfig {
        clip_url_prefix: "cdn://".into(),
        cancel_superseded,
        ..CliplinkConfig::default()
    }
}

pub struct ClipSite {
    pub page: Page,
    pub session: Session,
    main: NodeId,
}

impl ClipSite {
    pub fn open(location: &str) -> Self {
        let page = Page::new(location);
        let main = page.mutate(|dom| {
            let body = dom.body();
            let main = dom.create_element("main", no_attrs());
            dom.append_child(body, main).unwrap();
            main
        });
        Self {
            page,
            session: Session::new(),
            main,
        }
    }

    pub fn start(&self, cfg: &CliplinkConfig) -> (Running, UnboundedReceiver<NavigationOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let running = Orchestrator::new(self.page.clone(), self.session.clone(), cfg)
            .unwrap()
            .with_outcomes(tx)
            .start();
        (running, rx)
    }

    /// Route change that clears the content and shows a spinner.
    pub fn navigate(&self, location: &str) {
        self.page.push_location(location);
        self.page.mutate(|dom| {
            let spinner = dom.create_element("div", [("class", "spinner")]);
            dom.replace_children(self.main, vec![spinner]).unwrap();
        });
    }

    /// Route change where the previous player and title stay on screen.
    pub fn navigate_in_place(&self, location: &str) {
        self.page.push_location(location);
        self.page.mutate(|dom| {
            let spinner = dom.create_element("div", [("class", "spinner")]);
            dom.append_child(self.main, spinner).unwrap();
        });
    }

    pub fn back(&self) {
        assert!(self.page.back());
        self.page.mutate(|dom| {
            dom.replace_children(self.main, Vec::new()).unwrap();
        });
    }

    pub fn render_clip(&self, src: &str, title: &str) {
        self.page.mutate(|dom| {
            let video = player(dom, src);
            let heading = heading(dom, title);
            dom.replace_children(self.main, vec![video, heading]).unwrap();
        });
    }

    pub fn render_player(&self, src: &str) {
        self.page.mutate(|dom| {
            let video = player(dom, src);
            dom.replace_children(self.main, vec![video]).unwrap();
        });
    }

    pub fn title_html(&self) -> Option<String> {
        let selector: Selector = TITLE.parse().unwrap();
        self.page
            .read(|dom| dom.query_selector(&selector).map(|n| dom.outer_html(n)))
    }
}

fn no_attrs() -> Vec<(&'static str, &'static str)> {
    Vec::new()
}

fn player(dom: &mut Dom, src: &str) -> NodeId {
    dom.create_element("video", [("src", src)])
}

fn heading(dom: &mut Dom, title: &str) -> NodeId {
    let h = dom.create_element("h2", [("data-a-target", "stream-title")]);
    let text = dom.create_text(title);
    dom.append_child(h, text).unwrap();
    h
}

/// Let spawned tasks run until nothing is ready.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
