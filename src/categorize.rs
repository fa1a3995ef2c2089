use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label given to comments that match no rule.
pub const OTHER: &str = "other";

/// One category and the phrases that trigger it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// The built-in table used for negative reviews.
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "product_quality",
            &["defective", "broken", "poor quality", "damaged", "bad"],
        ),
        CategoryRule::new(
            "customer_service",
            &["service", "support", "staff", "representative", "rude"],
        ),
        CategoryRule::new(
            "delivery",
            &["shipping", "delivery", "late", "delayed", "packaging"],
        ),
        CategoryRule::new(
            "price",
            &["expensive", "overpriced", "cost", "price", "waste of money"],
        ),
        CategoryRule::new(
            "functionality",
            &[
                "doesn't work",
                "stopped working",
                "not working",
                "failed",
                "issues",
                "error",
            ],
        ),
    ]
}

/// Keyword based labeling of review comments.
///
/// Matching is case-insensitive substring containment. The table is fixed at
/// construction, so `categorize` is a pure function of its input.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Categorizer {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule {
                name: rule.name,
                keywords: rule
                    .keywords
                    .into_iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    /// Returns every category with at least one keyword in `comment`, or `{"other"}`.
    pub fn categorize(&self, comment: &str) -> BTreeSet<String> {
        let text = comment.to_lowercase();
        let mut categories: BTreeSet<String> = self
            .rules
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|rule| rule.name.clone())
            .collect();

        if categories.is_empty() {
            categories.insert(OTHER.to_string());
        }
        categories
    }

    pub fn categorize_review(&self, rating: i64, comment: &str) -> CategorizedReview {
        CategorizedReview {
            rating,
            comment: comment.to_string(),
            categories: self.categorize(comment),
            processed_at: Utc::now(),
        }
    }
}

/// A negative review with its labels, as persisted by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedReview {
    pub rating: i64,
    pub comment: String,
    pub categories: BTreeSet<String>,
    pub processed_at: DateTime<Utc>,
}
