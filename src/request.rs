use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::debug;

use crate::config::HarvestConfig;
use crate::{Error, Result};

/// Desktop browser identities, one is picked for every request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// A successfully fetched page of reviews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Fetches one page of a product's reviews. Implementations don't retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, product_id: &str, page_num: u32) -> Result<FetchedPage>;
}

/// [`PageFetcher`] that talks to the marketplace over HTTP.
pub struct HttpPageFetcher {
    client: Client,
    base_url: String,
}

impl HttpPageFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the "all reviews, most recent first" listing.
    pub fn review_url(&self, product_id: &str, page_num: u32) -> String {
        format!(
            "{}/product-reviews/{product_id}/ref=cm_cr_getr_d_paging_btm_next_{page_num}\
             ?ie=UTF8&reviewerType=all_reviews&pageNumber={page_num}&sortBy=recent",
            self.base_url
        )
    }

    /// A fresh header set with a randomly picked user agent.
    pub fn headers(&self) -> HeaderMap {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(user_agent));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", self.base_url)) {
            headers.insert(header::REFERER, referer);
        }
        headers
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    /// Non-success statuses are reported as [`Error::TransportStatus`].
    async fn fetch(&self, product_id: &str, page_num: u32) -> Result<FetchedPage> {
        let url = self.review_url(product_id, page_num);
        debug!("GET {url}");

        let res = self.client.get(&url).headers(self.headers()).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::TransportStatus(status.as_u16()));
        }
        let body = res.text().await?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
        })
    }
}
