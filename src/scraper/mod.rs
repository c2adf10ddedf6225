//! History page parsing for horse profile pages
//!
//! Pages are fetched elsewhere; this module only turns their markup into
//! `PerformanceRecord`s.
//!
//! # Example
//!
//! ```
//! use keiba::scraper::{ExtractorConfig, HistoryExtractor};
//!
//! let html = r#"<table><tr>
//!     <td><a href="/race/list/20240526/">2024/05/26</a></td>
//!     <td>東京</td><td>晴</td><td>1</td>
//!     <td><a href="/race/202405021011/">東京優駿(G1)</a></td>
//! </tr></table>"#;
//!
//! let extractor = HistoryExtractor::new(ExtractorConfig::with_row_limit(5));
//! let records = extractor.extract(html);
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].race_name.as_deref(), Some("東京優駿(G1)"));
//! ```

mod decode;
pub mod heuristics;
mod history;

pub use decode::decode_markup;
pub use heuristics::{classify_row, Classifier, RowCells, RowLink, CLASSIFIERS};
pub use history::{normalize_whitespace, ExtractorConfig, HistoryExtractor};

use crate::models::{HorseEntry, PerformanceRecord};

/// Decode and extract a raw page in one step
pub fn extract_history(bytes: &[u8], extractor: &HistoryExtractor) -> Vec<PerformanceRecord> {
    extractor.extract(&decode_markup(bytes))
}

/// Parse several profile pages; each page is independent of the others
pub fn extract_entries<'a, I>(pages: I, extractor: &HistoryExtractor) -> Vec<HorseEntry>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    pages
        .into_iter()
        .map(|(horse_id, bytes)| HorseEntry::new(horse_id, extract_history(bytes, extractor)))
        .collect()
}
