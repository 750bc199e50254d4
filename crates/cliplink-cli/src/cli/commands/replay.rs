//! `cliplink replay` – play a page session script and report what the
//! injector did with each navigation.

use anyhow::{Context, Result};
use cliplink_core::config::CliplinkConfig;
use cliplink_core::dom::Selector;
use cliplink_core::orchestrator::{NavigationOutcome, Orchestrator};
use cliplink_core::resolve::ResolutionSource;
use cliplink_core::{Location, Page, ResourceRef, Session};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::mpsc;

use crate::cli::script::{settle, ReplayScript};

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub final_location: Location,
    pub outcomes: Vec<NavigationOutcome>,
    pub cache: BTreeMap<Location, ResourceRef>,
    /// Markup of the title element at the end, if there is one.
    pub title: Option<String>,
}

pub async fn run_replay(cfg: &CliplinkConfig, script_path: &Path, json: bool) -> Result<()> {
    let script = ReplayScript::load(script_path)?;
    let report = replay(cfg, &script).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub async fn replay(cfg: &CliplinkConfig, script: &ReplayScript) -> Result<ReplayReport> {
    let page = Page::new(script.location.as_str());
    replay_on(cfg, script, &page).await
}

/// Play `script` against `page`. The navigation loop is shut down before
/// this returns, whether or not every step succeeded.
async fn replay_on(cfg: &CliplinkConfig, script: &ReplayScript, page: &Page) -> Result<ReplayReport> {
    let title_selector: Selector = cfg
        .title_selector
        .parse()
        .context("invalid title_selector in config")?;
    let session = Session::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let running = Orchestrator::new(page.clone(), session.clone(), cfg)
        .context("invalid selector in config")?
        .with_outcomes(tx)
        .start();

    let played = play_steps(page, script).await;
    if played.is_ok() {
        settle().await;
    }
    running.shutdown().await;
    played?;

    let mut outcomes = Vec::new();
    while let Ok(outcome) = rx.try_recv() {
        outcomes.push(outcome);
    }
    let title = page.read(|dom| dom.query_selector(&title_selector).map(|n| dom.outer_html(n)));
    Ok(ReplayReport {
        final_location: page.location(),
        outcomes,
        cache: session.cache_snapshot(),
        title,
    })
}

async fn play_steps(page: &Page, script: &ReplayScript) -> Result<()> {
    for (i, step) in script.steps.iter().enumerate() {
        tracing::debug!(step = i + 1, action = step.action(), "replay step");
        step.play(page)
            .await
            .with_context(|| format!("step {} ({})", i + 1, step.action()))?;
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    println!("Final location: {}", report.final_location);
    if report.outcomes.is_empty() {
        println!("No navigations observed.");
    } else {
        println!("{:<10} {:<10} {:<40} {}", "OUTCOME", "SOURCE", "LOCATION", "DETAIL");
        for o in &report.outcomes {
            let (kind, source, detail) = match o {
                NavigationOutcome::Applied {
                    resource, source, ..
                } => ("applied", source_name(*source), resource.to_string()),
                NavigationOutcome::Abandoned { resource, .. } => ("abandoned", "-", resource.to_string()),
                NavigationOutcome::Cancelled { .. } => ("cancelled", "-", String::new()),
                NavigationOutcome::Failed { error, .. } => ("failed", "-", error.clone()),
            };
            println!("{:<10} {:<10} {:<40} {}", kind, source, o.location().as_str(), detail);
        }
    }
    println!("Cache:");
    for (location, resource) in &report.cache {
        println!("  {location} -> {resource}");
    }
    match &report.title {
        Some(html) => println!("Title: {html}"),
        None => println!("Title: (none)"),
    }
}

fn source_name(source: ResolutionSource) -> &'static str {
    match source {
        ResolutionSource::Cache => "cache",
        ResolutionSource::Discovered => "discovered",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CliplinkConfig {
        CliplinkConfig {
            clip_url_prefix: "cdn://".into(),
            ..CliplinkConfig::default()
        }
    }

    #[tokio::test]
    async fn replay_links_the_clip_and_reports_cache() {
        let script = ReplayScript::parse(
            r#"
            location = "/a/clip/x"

            [[step]]
            action = "append"
            tag = "video"
            attrs = { src = "cdn://clip1" }

            [[step]]
            action = "append"
            tag = "h2"
            attrs = { "data-a-target" = "stream-title" }
            text = "Clip X"

            [[step]]
            action = "settle"
            "#,
        )
        .unwrap();
        let report = replay(&cfg(), &script).await.unwrap();
        assert_eq!(report.final_location.as_str(), "/a/clip/x");
        assert!(matches!(
            report.outcomes.as_slice(),
            [NavigationOutcome::Applied { .. }]
        ));
        assert_eq!(
            report.cache.get(&Location::from("/a/clip/x")),
            Some(&ResourceRef::from("cdn://clip1"))
        );
        assert_eq!(
            report.title.as_deref(),
            Some(r#"<h2 data-a-target="stream-title"><a download href="cdn://clip1">Clip X</a></h2>"#)
        );
    }

    #[tokio::test]
    async fn failing_step_names_its_position() {
        let script = ReplayScript::parse(
            r#"
            location = "/"

            [[step]]
            action = "remove"
            selector = "video"
            "#,
        )
        .unwrap();
        let err = replay(&cfg(), &script).await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("step 1 (remove)"), "{msg}");
        assert!(msg.contains("no element matches video"), "{msg}");
    }

    #[tokio::test]
    async fn failing_step_still_stops_the_navigation_loop() {
        let script = ReplayScript::parse(
            r#"
            location = "/a/clip/x"

            [[step]]
            action = "append"
            tag = "div"

            [[step]]
            action = "settle"

            [[step]]
            action = "back"
            "#,
        )
        .unwrap();
        let page = Page::new(script.location.as_str());
        let err = replay_on(&cfg(), &script, &page).await.unwrap_err();
        assert!(format!("{err:#}").contains("step 3 (back)"));
        // Neither the detector nor the pending media watch is left listening.
        assert_eq!(page.observer_count(), 0);
    }
}
