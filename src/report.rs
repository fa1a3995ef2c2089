use std::cmp::Ordering;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::info;

use crate::output::RatedComment;
use crate::parse::parse_rating;
use crate::Result;

const BAR_WIDTH: usize = 40;

/// How many rows carry each rating value, ordered like the ratings themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RatingDistribution {
    pub counts: Vec<(String, usize)>,
}

impl RatingDistribution {
    pub fn from_rows(rows: &[RatedComment]) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for row in rows {
            let label = rating_label(&row.rating);
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }
        counts.sort_by(|(a, _), (b, _)| compare_labels(a, b));
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Writes the `Rating,Count` table the chart is drawn from.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
        wtr.write_record(["Rating", "Count"])?;
        for (label, count) in &self.counts {
            wtr.write_record([label.as_str(), count.to_string().as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Horizontal bar chart, one line per rating.
    pub fn render_bars(&self) -> Vec<String> {
        let max = self.counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
        self.counts
            .iter()
            .map(|(label, count)| {
                let width = if max == 0 { 0 } else { (count * BAR_WIDTH).div_ceil(max) };
                format!("{label:>9} | {:<BAR_WIDTH$} {count}", "#".repeat(width))
            })
            .collect()
    }

    pub fn log_chart(&self) {
        info!("Review Ratings Distribution ({} reviews)", self.total());
        for line in self.render_bars() {
            info!("{line}");
        }
    }
}

/// Numeric ratings collapse to their whole number ("4.0" and "4" are one bucket).
fn rating_label(raw: &str) -> String {
    match parse_rating(raw) {
        Some(n) => n.to_string(),
        None => raw.trim().to_string(),
    }
}

/// Numbers first in numeric order, then everything else alphabetically.
fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ratings: &[&str]) -> Vec<RatedComment> {
        ratings
            .iter()
            .map(|r| RatedComment {
                rating: r.to_string(),
                comment: String::new(),
            })
            .collect()
    }

    #[test]
    fn counts_are_grouped_and_ordered() {
        let dist = RatingDistribution::from_rows(&rows(&["5.0", "1", "5", "No Rating", "10", "2.0", "1.0"]));
        assert_eq!(
            dist.counts,
            vec![
                ("1".to_string(), 2),
                ("2".to_string(), 1),
                ("5".to_string(), 2),
                ("10".to_string(), 1),
                ("No Rating".to_string(), 1),
            ]
        );
        assert_eq!(dist.total(), 7);
    }

    #[test]
    fn empty_input_gives_empty_chart() {
        let dist = RatingDistribution::from_rows(&[]);
        assert!(dist.counts.is_empty());
        assert!(dist.render_bars().is_empty());
    }

    #[test]
    fn longest_bar_belongs_to_most_common_rating() {
        let dist = RatingDistribution::from_rows(&rows(&["1", "5", "5", "5", "5"]));
        let bars = dist.render_bars();
        assert!(bars[1].contains(&"#".repeat(BAR_WIDTH)));
        assert!(bars[0].contains(&"#".repeat(BAR_WIDTH / 4)));
        assert!(!bars[0].contains(&"#".repeat(BAR_WIDTH / 4 + 1)));
    }

    #[test]
    fn writes_chart_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dist.csv");
        RatingDistribution::from_rows(&rows(&["4", "4", "2"]))
            .write_csv(&path)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Rating,Count\n2,1\n4,2\n");
    }
}
