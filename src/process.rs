use std::sync::Arc;

use chrono::Local;
use tokio::task::spawn_blocking;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;
use crate::pacing::PacingPolicy;
use crate::parse::{Review, ReviewExtractor};
use crate::request::PageFetcher;
use crate::{info_time, Error, Result};

/// Pulls the product id out of a product page URL: the path segment after `/dp/`.
pub fn extract_product_id(url: &str) -> Result<String> {
    let (_, rest) = url
        .split_once("/dp/")
        .ok_or_else(|| Error::InvalidProductUrl(url.into()))?;
    let id = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if id.is_empty() {
        return Err(Error::InvalidProductUrl(url.into()));
    }
    Ok(id.to_string())
}

/// Progress of one harvest. Owned and mutated by [`Harvester::harvest`] only.
#[derive(Debug)]
struct HarvestState {
    product_id: String,
    collected: Vec<Review>,
    page_num: u32,
    consecutive_weak_pages: usize,
    page_failures: u32,
    page_blocks: u32,
}

impl HarvestState {
    fn new(product_id: String) -> Self {
        Self {
            product_id,
            collected: Vec::new(),
            page_num: 1,
            consecutive_weak_pages: 0,
            page_failures: 0,
            page_blocks: 0,
        }
    }

    /// Consumes the state, never returning more than `max_reviews`.
    fn into_reviews(mut self, max_reviews: usize) -> Vec<Review> {
        self.collected.truncate(max_reviews);
        self.collected
    }
}

/// What a single fetch + extract step produced.
enum PageOutcome {
    Reviews(Vec<Review>),
    Blocked,
}

/// Walks the review pages of a product one request at a time, pacing itself
/// between requests, until enough reviews are collected or pages run dry.
pub struct Harvester<F> {
    fetcher: F,
    extractor: Arc<ReviewExtractor>,
    pacing: PacingPolicy,
    config: HarvestConfig,
}

impl<F: PageFetcher> Harvester<F> {
    pub fn new(fetcher: F, pacing: PacingPolicy, config: HarvestConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            extractor: Arc::new(ReviewExtractor::new()?),
            pacing,
            config,
        })
    }

    /// Harvests up to `max_reviews` reviews in fetch order.
    ///
    /// Fails only on a URL without a product id. Everything that goes wrong
    /// once harvesting started is logged, and the reviews collected so far
    /// are returned.
    pub async fn harvest(&self, url: &str, max_reviews: usize) -> Result<Vec<Review>> {
        let start_time = Local::now();
        let product_id = extract_product_id(url)?;
        let mut state = HarvestState::new(product_id);

        info_time!("Started harvesting reviews for product {}", state.product_id);

        while state.collected.len() < max_reviews
            && state.consecutive_weak_pages < self.config.max_weak_pages
        {
            info!(page = state.page_num, "Harvesting page {}", state.page_num);

            match self.fetch_page(&state).await {
                Ok(PageOutcome::Reviews(reviews)) => {
                    self.record_page(&mut state, reviews);
                    if state.collected.len() >= max_reviews
                        || state.consecutive_weak_pages >= self.config.max_weak_pages
                    {
                        break;
                    }
                    sleep(self.pacing.next_delay()).await;
                    state.page_num += 1;
                }
                Ok(PageOutcome::Blocked) => {
                    state.page_blocks += 1;
                    if state.page_blocks > self.config.max_block_retries {
                        warn!(
                            page = state.page_num,
                            "Still blocked after {} attempts, giving up", state.page_blocks
                        );
                        break;
                    }
                    warn!(page = state.page_num, "Block challenge detected, waiting longer");
                    sleep(self.pacing.block_detected()).await;
                }
                Err(e) => {
                    state.page_failures += 1;
                    if state.page_failures > self.config.max_page_retries {
                        warn!(
                            page = state.page_num,
                            "Page failed {} times in a row, giving up: {e}", state.page_failures
                        );
                        break;
                    }
                    if e.is_transport() {
                        warn!(page = state.page_num, attempt = state.page_failures, "Transport failure: {e}");
                    } else {
                        warn!(page = state.page_num, attempt = state.page_failures, "Unexpected error: {e}");
                    }
                    sleep(self.pacing.retry_delay(state.page_failures)).await;
                }
            }
        }

        let reviews = state.into_reviews(max_reviews);
        info_time!(start_time, "Finished harvesting. Total reviews collected: {}", reviews.len());
        Ok(reviews)
    }

    async fn fetch_page(&self, state: &HarvestState) -> Result<PageOutcome> {
        let page = self.fetcher.fetch(&state.product_id, state.page_num).await?;
        debug!(page = state.page_num, status = page.status, "Fetched {} bytes", page.body.len());
        if page.body.contains(&self.config.block_marker) {
            return Ok(PageOutcome::Blocked);
        }

        let reviews = spawn_blocking({
            let extractor = self.extractor.clone();
            move || extractor.extract(&page.body)
        })
        .await?;
        Ok(PageOutcome::Reviews(reviews))
    }

    /// A page with fewer reviews than a full page counts as weak, any other resets the count.
    fn record_page(&self, state: &mut HarvestState, reviews: Vec<Review>) {
        state.page_failures = 0;
        state.page_blocks = 0;

        if reviews.len() < self.config.full_page_size {
            state.consecutive_weak_pages += 1;
            info!(
                page = state.page_num,
                "Weak page with {} reviews ({} in a row)",
                reviews.len(),
                state.consecutive_weak_pages
            );
        } else {
            state.consecutive_weak_pages = 0;
        }

        state.collected.extend(reviews);
        info!("Total reviews collected: {}", state.collected.len());
    }
}
