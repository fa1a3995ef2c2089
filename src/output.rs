use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::Local;

use crate::parse::Review;
use crate::{info_time, Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes the reviews as CSV with a UTF-8 signature, so spreadsheet tools pick the right encoding.
/// Columns: `Username,Review_Date,Rating,Comment`. Returns the number of rows written.
pub fn write_reviews(path: &Path, reviews: &[Review]) -> Result<usize> {
    if reviews.is_empty() {
        info_time!("No reviews to save");
        return Ok(0);
    }

    let local_now = Local::now();
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut wtr = csv::Writer::from_writer(file);
    for review in reviews {
        wtr.serialize(review)?;
    }
    wtr.flush()?;

    info_time!(local_now, "Saved {} reviews to {}", reviews.len(), path.display());
    Ok(reviews.len())
}

/// Reads back a file written by [`write_reviews`]. Every field stays a string.
pub fn read_reviews(path: &Path) -> Result<Vec<Review>> {
    let bytes = read_without_bom(path)?;
    let mut rdr = csv::Reader::from_reader(bytes.as_slice());
    let reviews = rdr
        .deserialize()
        .collect::<core::result::Result<Vec<Review>, csv::Error>>()?;
    Ok(reviews)
}

/// The two columns the analysis needs from any tabular review export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatedComment {
    pub rating: String,
    pub comment: String,
}

/// Reads `rating_column` and `comment_column` by header name. Other columns are ignored.
pub fn read_rated_comments(
    path: &Path,
    rating_column: &str,
    comment_column: &str,
) -> Result<Vec<RatedComment>> {
    let bytes = read_without_bom(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes.as_slice());

    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };
    let rating_idx = position(rating_column)?;
    let comment_idx = position(comment_column)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(RatedComment {
            rating: record.get(rating_idx).unwrap_or_default().trim().to_string(),
            comment: record.get(comment_idx).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

fn read_without_bom(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    Ok(bytes)
}
