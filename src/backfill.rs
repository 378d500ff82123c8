//! Historical backfill: page backward through the conversation until the
//! source runs dry.
//!
//! The cursor starts at 0 ("most recent") and after each page moves to the
//! id of the oldest message in it, so every request returns strictly older
//! messages than the last. Only an empty page means exhaustion; a page
//! shorter than the limit does not, and the scanner always asks again.
//!
//! Before walking a page the set of already-published ids is pulled once,
//! so messages done in earlier runs are skipped without touching the
//! database per message. The ledger upsert inside the pipeline remains the
//! real dedup authority; the set is just a fast path.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::analysis::Analyzer;
use crate::chat::ChatHistory;
use crate::config::Config;
use crate::ledger::Ledger;
use crate::pipeline::{self, AppContext, Outcome};
use crate::wiki::PageStore;

/// End-of-run totals for one backfill pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackfillReport {
    /// Pages that contained at least one message.
    pub pages: u64,
    /// Messages returned by the source across all pages.
    pub fetched: u64,
    pub published: u64,
    pub skipped: u64,
    pub skipped_empty: u64,
    pub failed: u64,
}

impl BackfillReport {
    pub fn print(&self) {
        println!("backfill");
        println!("  pages:         {}", self.pages);
        println!("  fetched:       {}", self.fetched);
        println!("  published:     {}", self.published);
        println!("  skipped:       {}", self.skipped);
        println!("  skipped empty: {}", self.skipped_empty);
        println!("  failed:        {}", self.failed);
    }
}

/// Run the backfill command: one historical pass, then a summary.
pub async fn run_once(config: Config, max_pages: Option<u64>) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    let report = run_backfill(
        &ctx.bridge,
        &ctx.ledger,
        &ctx.analyzer,
        &ctx.store,
        ctx.config.chat.page_size,
        max_pages,
        &ctx.config.wiki.edit_summary,
    )
    .await;
    report.print();

    ctx.close().await;
    Ok(())
}

/// One full pass over the conversation's history.
///
/// Never fails the process: a page-fetch error ends the pass early with
/// what was counted so far, and per-message failures are absorbed by the
/// pipeline's own boundary.
pub async fn run_backfill(
    history: &dyn ChatHistory,
    ledger: &Ledger,
    analyzer: &dyn Analyzer,
    store: &dyn PageStore,
    page_size: usize,
    max_pages: Option<u64>,
    edit_summary: &str,
) -> BackfillReport {
    let mut report = BackfillReport::default();
    let mut cursor = 0i64;

    info!(page_size, "starting backfill");

    loop {
        if let Some(max) = max_pages {
            if report.pages >= max {
                info!(pages = report.pages, "page limit reached, stopping backfill");
                break;
            }
        }

        let page = match history.messages_before(cursor, page_size).await {
            Ok(page) => page,
            Err(e) => {
                error!(cursor, error = %e, "page fetch failed, ending backfill pass");
                break;
            }
        };

        if page.is_empty() {
            debug!(cursor, "no more messages");
            break;
        }

        report.pages += 1;
        report.fetched += page.len() as u64;

        let done: HashSet<i64> = match ledger.processed_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not load processed ids, relying on per-message dedup");
                HashSet::new()
            }
        };

        for msg in &page {
            // Never give an empty message a ledger entry.
            if msg.text.is_empty() {
                debug!(message_id = msg.id, "empty message dropped");
                report.skipped_empty += 1;
                continue;
            }

            if done.contains(&msg.id) {
                report.skipped += 1;
                continue;
            }

            match pipeline::process_message(ledger, analyzer, store, msg, edit_summary).await {
                Outcome::Published(_) => report.published += 1,
                Outcome::AlreadySeen => report.skipped += 1,
                Outcome::SkippedEmpty => report.skipped_empty += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        // Continue strictly older than everything seen so far.
        if let Some(oldest) = page.last() {
            cursor = oldest.id;
        }

        debug!(
            pages = report.pages,
            published = report.published,
            skipped = report.skipped,
            "page complete"
        );
    }

    info!(
        pages = report.pages,
        fetched = report.fetched,
        published = report.published,
        skipped = report.skipped,
        failed = report.failed,
        "backfill complete"
    );

    report
}
