use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

use newsreel::config::FeedConfig;
use newsreel::controller::{FeedController, Phase};
use newsreel::engagement::{EngagementHub, EngagementRecord};
use newsreel::feed::{HttpNewsSource, Subview};
use newsreel::scroll::ScrollMetrics;

/// Assumed card height when simulating scroll geometry from the terminal.
const CARD_HEIGHT: f32 = 120.0;
const VIEWPORT_HEIGHT: f32 = 800.0;

#[derive(Parser, Debug)]
#[command(name = "newsreel", about = "Terminal driver for the news feed controller")]
struct Args {
    /// Base URL of the personalization backend
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    api_base: Url,

    /// User identifier sent with personalized fetches
    #[arg(long)]
    user_id: String,

    /// Subview to start on (1 = for you, 3 = all news)
    #[arg(long, default_value_t = 1)]
    subview: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if Subview::from_id(args.subview).is_none() {
        anyhow::bail!("unsupported subview id {} (use 1 or 3)", args.subview);
    }

    let source = HttpNewsSource::new(args.api_base.clone());
    let hub = EngagementHub::new(16);
    let config = FeedConfig::new(args.api_base, args.user_id);
    let (mut controller, mut events) = FeedController::new(config, Arc::new(source), &hub);

    controller.on_subview_selected(args.subview);
    controller.mount();

    println!("Commands: s <id> = switch subview, r = refresh, m = scroll to bottom,");
    println!("          e <id> <pct> = engagement record, t = scroll to top, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                controller.apply(event);
                if controller.is_idle() {
                    print_snapshot(&controller);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_command(&mut controller, &hub, line.trim()) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Dispatch one console command. Returns false to quit.
fn handle_command(controller: &mut FeedController, hub: &EngagementHub, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("q") => return false,
        Some("r") => controller.on_refresh_requested(),
        Some("t") => controller.on_logo_pressed(),
        Some("s") => match parts.next().and_then(|id| id.parse().ok()) {
            Some(id) => controller.on_subview_selected(id),
            None => println!("usage: s <subview-id>"),
        },
        Some("m") => {
            // Fabricate geometry that puts the viewport at the content end.
            let content_height = (controller.articles().len() as f32) * CARD_HEIGHT;
            controller.on_scrolled_near_bottom(ScrollMetrics {
                viewport_height: VIEWPORT_HEIGHT,
                scroll_offset: (content_height - VIEWPORT_HEIGHT).max(0.0),
                content_height,
            });
        }
        Some("e") => {
            let id = parts.next().and_then(|v| v.parse().ok());
            let pct = parts.next().and_then(|v| v.parse().ok());
            match (id, pct) {
                (Some(article_id), Some(scroll_percentage)) => hub.emit(EngagementRecord {
                    article_id,
                    scroll_percentage,
                }),
                _ => println!("usage: e <article-id> <percent>"),
            }
        }
        Some(other) => println!("unknown command: {}", other),
        None => {}
    }
    true
}

fn print_snapshot(controller: &FeedController) {
    let snapshot = controller.snapshot();
    println!(
        "-- {} | {:?}{}{}{}",
        snapshot.subview.label(),
        snapshot.phase,
        if snapshot.refreshing { " [refreshing]" } else { "" },
        if snapshot.waiting { " [waiting]" } else { "" },
        if snapshot.loading { " [loading]" } else { "" },
    );
    if let Some(error) = &snapshot.last_error {
        println!("   last error: {}", error);
    }
    match snapshot.phase {
        Phase::Empty => println!("   no articles"),
        Phase::Failed => println!("   nothing to show; try r to refresh"),
        _ => {
            for article in snapshot.articles.iter() {
                let depth = controller.engagement_for(article.id);
                if depth > 0.0 {
                    println!("   [{:>4}] {} (read {:.0}%)", article.id, article.title, depth);
                } else {
                    println!("   [{:>4}] {}", article.id, article.title);
                }
            }
        }
    }
}
