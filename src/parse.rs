use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

pub const ANONYMOUS: &str = "Anonymous";
pub const NO_DATE: &str = "No Date";
pub const NO_RATING: &str = "No Rating";
pub const NO_COMMENT: &str = "No Comment";

/// A single review as it appeared on the page. Fields are kept as raw strings,
/// missing ones hold one of the sentinel values above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Review_Date")]
    pub date: String,
    #[serde(rename = "Rating")]
    pub rating: String,
    #[serde(rename = "Comment")]
    pub comment: String,
}

/// Parses numeric-like rating values. Fractional ratings are rejected.
pub fn parse_rating(raw: &str) -> Option<i64> {
    let value: f64 = raw.trim().parse().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Ordered selectors for one field. The first one that yields non-empty text wins.
#[derive(Debug, Clone)]
struct FieldLocator {
    selectors: Vec<Selector>,
    sentinel: &'static str,
}

impl FieldLocator {
    fn new(sel_strs: &[&str], sentinel: &'static str) -> Result<Self> {
        let selectors = sel_strs
            .iter()
            .map(|s| create_selector(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            selectors,
            sentinel,
        })
    }

    fn locate(&self, container: ElementRef<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            let text = container.select(selector).next()?.text().collect::<String>();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }

    fn locate_or_sentinel(&self, container: ElementRef<'_>) -> (String, bool) {
        match self.locate(container) {
            Some(text) => (text, true),
            None => (self.sentinel.to_string(), false),
        }
    }
}

/// Pulls [`Review`]s out of one page of review markup.
/// Markup differs between page revisions, so every field has a fallback selector.
#[derive(Debug, Clone)]
pub struct ReviewExtractor {
    container: Selector,
    username: FieldLocator,
    date: FieldLocator,
    rating: FieldLocator,
    comment: FieldLocator,
}

impl ReviewExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: create_selector(r#"div[data-hook="review"]"#)?,
            username: FieldLocator::new(&["span.a-profile-name", "div.a-profile-content"], ANONYMOUS)?,
            date: FieldLocator::new(&[r#"span[data-hook="review-date"]"#, "span.review-date"], NO_DATE)?,
            rating: FieldLocator::new(
                &[r#"i[data-hook="review-star-rating"]"#, "i.a-icon-star"],
                NO_RATING,
            )?,
            comment: FieldLocator::new(
                &[r#"span[data-hook="review-body"]"#, "div.a-row.review-data"],
                NO_COMMENT,
            )?,
        })
    }

    /// Never fails: a page without review containers gives an empty `Vec`,
    /// and every container yields a review, with sentinels for what's missing.
    pub fn extract(&self, html: &str) -> Vec<Review> {
        let doc = Html::parse_document(html);

        // A full page holds ten reviews.
        let mut reviews = Vec::with_capacity(10);
        for container in doc.select(&self.container) {
            reviews.push(self.extract_review(container));
        }
        debug!("extracted {} reviews", reviews.len());
        reviews
    }

    fn extract_review(&self, container: ElementRef<'_>) -> Review {
        let (username, _) = self.username.locate_or_sentinel(container);
        let (date, found) = self.date.locate_or_sentinel(container);
        let date = if found { normalize_date(&date) } else { date };
        let (rating, found) = self.rating.locate_or_sentinel(container);
        let rating = if found { normalize_rating(&rating) } else { rating };
        let (comment, _) = self.comment.locate_or_sentinel(container);

        Review {
            username,
            date,
            rating,
            comment,
        }
    }
}

/// "Reviewed in India on 4 June 2024" -> "4 June 2024"
pub fn normalize_date(raw: &str) -> String {
    match raw.rsplit_once("on ") {
        Some((_, date)) => date.to_string(),
        None => raw.to_string(),
    }
}

/// "4.0 out of 5 stars" -> "4.0"
pub fn normalize_rating(raw: &str) -> String {
    match raw.split_once(" out") {
        Some((rating, _)) => rating.to_string(),
        None => raw.to_string(),
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseInvalidSelector(sel_str.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ReviewExtractor {
        ReviewExtractor::new().unwrap()
    }

    const FULL_REVIEW: &str = r#"
        <div data-hook="review" id="R1">
          <span class="a-profile-name">Priya</span>
          <i data-hook="review-star-rating"><span class="a-icon-alt">4.0 out of 5 stars</span></i>
          <span data-hook="review-date">Reviewed in India on 4 June 2024</span>
          <span data-hook="review-body"><span>  Charges fast, good build.  </span></span>
        </div>"#;

    #[test]
    fn extracts_all_fields() {
        let reviews = extractor().extract(&format!("<html><body>{FULL_REVIEW}</body></html>"));
        assert_eq!(
            reviews,
            vec![Review {
                username: "Priya".into(),
                date: "4 June 2024".into(),
                rating: "4.0".into(),
                comment: "Charges fast, good build.".into(),
            }]
        );
    }

    #[test]
    fn page_without_containers_is_empty() {
        let html = r#"<html><body><div class="review-like">nothing here</div></body></html>"#;
        assert!(extractor().extract(html).is_empty());
        assert!(extractor().extract("").is_empty());
    }

    #[test]
    fn missing_fields_get_sentinels() {
        let html = r#"<div data-hook="review"><span class="other">just noise</span></div>"#;
        let reviews = extractor().extract(html);
        assert_eq!(reviews.len(), 1);
        let r = &reviews[0];
        assert_eq!(r.username, ANONYMOUS);
        assert_eq!(r.date, NO_DATE);
        assert_eq!(r.rating, NO_RATING);
        assert_eq!(r.comment, NO_COMMENT);
    }

    #[test]
    fn fallback_locators_are_used() {
        let html = r#"
            <div data-hook="review">
              <div class="a-profile-content">Ravi</div>
              <span class="review-date">12 May 2024</span>
              <i class="a-icon a-icon-star a-star-2">2.0 out of 5 stars</i>
              <div class="a-row review-data">Stopped charging.</div>
            </div>"#;
        let reviews = extractor().extract(html);
        assert_eq!(reviews[0].username, "Ravi");
        assert_eq!(reviews[0].date, "12 May 2024");
        assert_eq!(reviews[0].rating, "2.0");
        assert_eq!(reviews[0].comment, "Stopped charging.");
    }

    #[test]
    fn empty_primary_falls_through_to_fallback() {
        let html = r#"
            <div data-hook="review">
              <span class="a-profile-name">   </span>
              <div class="a-profile-content">Fallback Name</div>
            </div>"#;
        assert_eq!(extractor().extract(html)[0].username, "Fallback Name");
    }

    #[test]
    fn container_without_text_gets_all_sentinels() {
        let full_page: String = (0..9).map(|_| FULL_REVIEW).collect();
        let html = format!(r#"{full_page}<div data-hook="review"><img src="x.png"></div>"#);

        let reviews = extractor().extract(&html);

        assert_eq!(reviews.len(), 10);
        assert_eq!(
            reviews[9],
            Review {
                username: ANONYMOUS.into(),
                date: NO_DATE.into(),
                rating: NO_RATING.into(),
                comment: NO_COMMENT.into(),
            }
        );
        assert_eq!(reviews[8].username, "Priya");
    }

    #[test]
    fn date_normalization() {
        assert_eq!(normalize_date("Reviewed on 4 June 2024"), "4 June 2024");
        assert_eq!(normalize_date("Reviewed in India on 4 June 2024"), "4 June 2024");
        assert_eq!(normalize_date("4 June 2024"), "4 June 2024");
    }

    #[test]
    fn rating_normalization() {
        assert_eq!(normalize_rating("4.0 out of 5 stars"), "4.0");
        assert_eq!(normalize_rating("5"), "5");
    }

    #[test]
    fn rating_parsing() {
        assert_eq!(parse_rating("2"), Some(2));
        assert_eq!(parse_rating(" 1.0 "), Some(1));
        assert_eq!(parse_rating("4.5"), None);
        assert_eq!(parse_rating(NO_RATING), None);
    }
}
