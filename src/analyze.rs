use std::collections::BTreeMap;
use std::path::Path;

use chrono::Local;
use tracing::info;

use crate::categorize::{CategorizedReview, Categorizer};
use crate::config::AnalysisConfig;
use crate::output::read_rated_comments;
use crate::parse::parse_rating;
use crate::report::RatingDistribution;
use crate::store::DocumentStore;
use crate::{info_time, Result};

/// Ratings that count as a negative review.
const NEGATIVE_RATINGS: [i64; 2] = [1, 2];

/// Result of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub distribution: RatingDistribution,
    pub negative_reviews: usize,
    /// Number of stored reviews per category, by category name.
    pub categories: BTreeMap<String, usize>,
}

/// Reads a review export, charts its ratings, and replaces the configured
/// collection with the categorized negative reviews.
///
/// Any store failure aborts the run.
pub async fn analyze_reviews<S: DocumentStore + ?Sized>(
    input: &Path,
    config: &AnalysisConfig,
    categorizer: &Categorizer,
    store: &S,
) -> Result<AnalysisSummary> {
    let start_time = Local::now();
    info_time!("Reading reviews from {}", input.display());
    let rows = read_rated_comments(input, &config.rating_column, &config.comment_column)?;

    let distribution = RatingDistribution::from_rows(&rows);
    distribution.write_csv(&config.chart_path)?;
    distribution.log_chart();
    info!("Chart data saved to {}", config.chart_path.display());

    let negatives: Vec<CategorizedReview> = rows
        .iter()
        .filter_map(|row| {
            let rating = parse_rating(&row.rating)?;
            NEGATIVE_RATINGS
                .contains(&rating)
                .then(|| categorizer.categorize_review(rating, &row.comment))
        })
        .collect();
    info!("Found {} negative reviews", negatives.len());

    store.replace_collection(&config.collection, &negatives).await?;
    info!("Negative reviews stored in '{}'", config.collection);

    let stored = store.load_collection(&config.collection).await?;
    let categories = category_counts(&stored);

    info_time!(start_time, "Analysis completed");
    Ok(AnalysisSummary {
        distribution,
        negative_reviews: negatives.len(),
        categories,
    })
}

pub fn category_counts(reviews: &[CategorizedReview]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for category in reviews.iter().flat_map(|r| r.categories.iter()) {
        *counts.entry(category.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::categorize::OTHER;
    use crate::store::SqliteStore;
    use crate::Error;

    const EXPORT: &str = "\u{feff}Username,Review_Date,Rating,Comment
a,1 May 2024,1.0,Arrived broken
b,2 May 2024,5.0,Love it
c,3 May 2024,2,\"Overpriced, and support was rude\"
d,4 May 2024,No Rating,broken too
e,5 May 2024,2.0,meh
";

    fn setup(dir: &tempfile::TempDir) -> (std::path::PathBuf, AnalysisConfig) {
        let input = dir.path().join("reviews.csv");
        std::fs::write(&input, EXPORT).unwrap();
        let config = AnalysisConfig {
            chart_path: dir.path().join("chart.csv"),
            ..AnalysisConfig::default()
        };
        (input, config)
    }

    #[tokio::test]
    async fn categorizes_only_negative_reviews() {
        let dir = tempfile::tempdir().unwrap();
        let (input, config) = setup(&dir);
        let store = SqliteStore::in_memory().await.unwrap();

        let summary = analyze_reviews(&input, &config, &Categorizer::default(), &store)
            .await
            .unwrap();

        assert_eq!(summary.negative_reviews, 3);
        assert_eq!(summary.distribution.total(), 5);
        assert_eq!(summary.categories["product_quality"], 1);
        assert_eq!(summary.categories["price"], 1);
        assert_eq!(summary.categories["customer_service"], 1);
        assert_eq!(summary.categories[OTHER], 1);

        let stored = store.load_collection("negative_reviews").await.unwrap();
        let ratings: Vec<i64> = stored.iter().map(|r| r.rating).collect();
        assert_eq!(ratings, vec![1, 2, 2]);
        assert!(stored.iter().all(|r| !r.categories.is_empty()));
        assert!(config.chart_path.exists());
    }

    #[tokio::test]
    async fn rerun_replaces_previous_results() {
        let dir = tempfile::tempdir().unwrap();
        let (input, config) = setup(&dir);
        let store = SqliteStore::in_memory().await.unwrap();
        let categorizer = Categorizer::default();

        analyze_reviews(&input, &config, &categorizer, &store).await.unwrap();
        analyze_reviews(&input, &config, &categorizer, &store).await.unwrap();

        assert_eq!(store.load_collection("negative_reviews").await.unwrap().len(), 3);
    }

    struct FailingStore {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn replace_collection(&self, _: &str, _: &[CategorizedReview]) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            Err(Error::InvalidCollection("unreachable store".into()))
        }

        async fn load_collection(&self, _: &str) -> Result<Vec<CategorizedReview>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let (input, config) = setup(&dir);
        let store = FailingStore { calls: Mutex::new(0) };

        let res = analyze_reviews(&input, &config, &Categorizer::default(), &store).await;

        assert!(res.is_err());
        assert_eq!(*store.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_column_fails_before_touching_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let (input, mut config) = setup(&dir);
        config.comment_column = "Text".into();
        let store = FailingStore { calls: Mutex::new(0) };

        let err = analyze_reviews(&input, &config, &Categorizer::default(), &store)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingColumn(_)));
        assert_eq!(*store.calls.lock().unwrap(), 0);
    }
}
