//! Race history table extractor
//!
//! Reads the past-performance table from a horse's profile page. Any `<tr>`
//! holding a `/race/` link is treated as one past run. With nested tables the
//! link belongs to its innermost row only.

use super::heuristics::{classify_row, RowCells, RowLink};
use crate::error::ExtractError;
use crate::models::{HorseEntry, PerformanceRecord};
use scraper::{ElementRef, Html, Selector};

/// Extractor configuration
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Maximum number of history rows to keep (`None` = all)
    pub row_limit: Option<usize>,
}

impl ExtractorConfig {
    pub fn with_row_limit(row_limit: usize) -> Self {
        Self {
            row_limit: Some(row_limit),
        }
    }
}

/// Turns history page markup into `PerformanceRecord`s
#[derive(Debug, Clone, Default)]
pub struct HistoryExtractor {
    config: ExtractorConfig,
}

impl HistoryExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract history rows in document order.
    ///
    /// Never fails: markup that cannot be read yields an empty list.
    pub fn extract(&self, markup: &str) -> Vec<PerformanceRecord> {
        match self.try_extract(markup) {
            Ok(records) => {
                tracing::debug!("Extracted {} history rows", records.len());
                records
            }
            Err(ExtractError::EmptyMarkup) => Vec::new(),
            Err(e) => {
                tracing::warn!("History extraction failed: {}", e);
                Vec::new()
            }
        }
    }

    fn try_extract(&self, markup: &str) -> Result<Vec<PerformanceRecord>, ExtractError> {
        if markup.trim().is_empty() {
            return Err(ExtractError::EmptyMarkup);
        }

        let limit = self.config.row_limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let document = Html::parse_document(markup);

        let row_selector =
            Selector::parse("tr").map_err(|e| ExtractError::Selector(e.to_string()))?;
        let cell_selector =
            Selector::parse("td").map_err(|e| ExtractError::Selector(e.to_string()))?;
        let link_selector =
            Selector::parse("a[href]").map_err(|e| ExtractError::Selector(e.to_string()))?;
        let race_link_selector = Selector::parse("a[href*='/race/']")
            .map_err(|e| ExtractError::Selector(e.to_string()))?;

        let records = document
            .select(&row_selector)
            .filter(|row| owns_race_link(row, &race_link_selector))
            .take(limit)
            .map(|row| parse_history_row(&row, &cell_selector, &link_selector))
            .collect();

        Ok(records)
    }
}

impl HorseEntry {
    /// Build an entry from a profile page using the extractor's row limit
    pub fn from_markup(
        horse_id: impl Into<String>,
        markup: &str,
        extractor: &HistoryExtractor,
    ) -> Self {
        HorseEntry::new(horse_id, extractor.extract(markup))
    }
}

/// True when a race link sits in `row` itself rather than in a nested row
fn owns_race_link(row: &ElementRef, race_link_selector: &Selector) -> bool {
    row.select(race_link_selector).any(|link| {
        link.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tr")
            .map_or(false, |tr| tr.id() == row.id())
    })
}

/// Assemble one record from a history row
fn parse_history_row(
    row: &ElementRef,
    cell_selector: &Selector,
    link_selector: &Selector,
) -> PerformanceRecord {
    let columns: Vec<String> = row
        .select(cell_selector)
        .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
        .collect();

    let text = normalize_whitespace(&row.text().collect::<Vec<_>>().join(" "));

    let links: Vec<RowLink> = row
        .select(link_selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(RowLink {
                href: href.to_string(),
                text: normalize_whitespace(&a.text().collect::<String>()),
            })
        })
        .collect();

    classify_row(&RowCells {
        columns: &columns,
        text: &text,
        links: &links,
    })
}

/// Collapse runs of whitespace (including full-width spaces) to one space
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
