//! Field classifiers for race history rows
//!
//! Each classifier reads one field from a row and knows nothing about the
//! others. Two classifiers may claim the same cell: a bare `3.5` is both an
//! odds value and a margin. Nothing arbitrates between them; each simply
//! reports the first cell its own pattern accepts.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{
    FinishPosition, FinishTime, Going, Margin, MarginToken, PerformanceRecord, SpecialStatus,
    Surface, Venue,
};

/// Finish position is only looked for in the leading cells
const FINISH_POSITION_WINDOW: usize = 4;
/// Column holding the race name on the history table (0-based)
const RACE_NAME_COLUMN: usize = 4;
const MAX_FIELD_SIZE: u8 = 18;

static ONE_OR_TWO_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}$").unwrap());
static DISTANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d.])(\d+)(?:m|M|ｍ|米)(?:$|[^A-Za-z])").unwrap());
static WEIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2,3}(?:\.\d)?$").unwrap());
static FINISH_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d):(\d{2})\.(\d)(?:\D|$)").unwrap());
static MARGIN_LENGTHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.\d$").unwrap());
static BARE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+$").unwrap());
static PRIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());
static POPULARITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s*番?人気|人気\s*(\d{1,2})|(?i:pop(?:ularity)?)\s*(\d{1,2})").unwrap()
});

const SPECIAL_STATUSES: [(&str, SpecialStatus); 8] = [
    ("中止", SpecialStatus::DidNotFinish),
    ("取消", SpecialStatus::Scratched),
    ("除外", SpecialStatus::Excluded),
    ("失格", SpecialStatus::Disqualified),
    ("DNF", SpecialStatus::DidNotFinish),
    ("SCR", SpecialStatus::Scratched),
    ("EXC", SpecialStatus::Excluded),
    ("DQ", SpecialStatus::Disqualified),
];

// 障 first: jump races print "障芝3000"
const SURFACE_MARKERS: [(&str, Surface); 6] = [
    ("障", Surface::Jump),
    ("芝", Surface::Turf),
    ("ダ", Surface::Dirt),
    ("Jump", Surface::Jump),
    ("Turf", Surface::Turf),
    ("Dirt", Surface::Dirt),
];

// Longer markers before the ones they contain (不良 ⊃ 良, 稍重 ⊃ 重)
const GOING_MARKERS: [(&str, Going); 8] = [
    ("不良", Going::Heavy),
    ("稍重", Going::Good),
    ("重", Going::Soft),
    ("良", Going::Firm),
    ("Heavy", Going::Heavy),
    ("Soft", Going::Soft),
    ("Good", Going::Good),
    ("Firm", Going::Firm),
];

const MARGIN_TOKENS: [(&str, MarginToken); 10] = [
    ("ハナ", MarginToken::Nose),
    ("アタマ", MarginToken::Head),
    ("クビ", MarginToken::Neck),
    ("大差", MarginToken::Distance),
    ("同着", MarginToken::DeadHeat),
    ("Nose", MarginToken::Nose),
    ("Head", MarginToken::Head),
    ("Neck", MarginToken::Neck),
    ("Dist", MarginToken::Distance),
    ("DH", MarginToken::DeadHeat),
];

/// Hyperlink found inside a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLink {
    pub href: String,
    pub text: String,
}

impl RowLink {
    fn is_race_list(&self) -> bool {
        self.href.contains("/race/list/")
    }

    fn is_race(&self) -> bool {
        self.href.contains("/race/") && !self.is_race_list()
    }

    fn is_jockey(&self) -> bool {
        self.href.contains("/jockey/")
    }
}

/// Normalized view of one table row
#[derive(Debug, Clone, Copy)]
pub struct RowCells<'a> {
    /// Whitespace-normalized cell texts, in column order
    pub columns: &'a [String],
    /// Whitespace-normalized text of the whole row
    pub text: &'a str,
    pub links: &'a [RowLink],
}

/// A classifier writes at most one field of the record
pub type Classifier = fn(&RowCells<'_>, &mut PerformanceRecord);

/// Every classifier, in the order they are applied
pub const CLASSIFIERS: [(&str, Classifier); 14] = [
    ("date", |row, rec| rec.date = date(row)),
    ("race_name", |row, rec| rec.race_name = race_name(row)),
    ("finish_position", |row, rec| rec.finish_position = finish_position(row)),
    ("venue", |row, rec| rec.venue = venue(row)),
    ("surface", |row, rec| rec.surface = surface(row)),
    ("distance_meters", |row, rec| rec.distance_meters = distance_meters(row)),
    ("going", |row, rec| rec.going = going(row)),
    ("jockey_name", |row, rec| rec.jockey_name = jockey_name(row)),
    ("weight_carried_kg", |row, rec| rec.weight_carried_kg = weight_carried_kg(row)),
    ("finish_time", |row, rec| rec.finish_time = finish_time(row)),
    ("margin", |row, rec| rec.margin = margin(row)),
    ("odds", |row, rec| rec.odds = odds(row)),
    ("popularity_rank", |row, rec| rec.popularity_rank = popularity_rank(row)),
    ("prize_money", |row, rec| rec.prize_money = prize_money(row)),
];

/// Run every classifier over a row
pub fn classify_row(row: &RowCells<'_>) -> PerformanceRecord {
    let mut record = PerformanceRecord::from_raw(row.text.to_string(), row.columns.to_vec());
    for (_, classify) in CLASSIFIERS.iter() {
        classify(row, &mut record);
    }
    record
}

/// Text of the race-list (開催日) link
pub fn date(row: &RowCells<'_>) -> Option<String> {
    row.links
        .iter()
        .find(|link| link.is_race_list())
        .map(|link| link.text.clone())
        .filter(|text| !text.is_empty())
}

/// Race name column, falling back to the race link text.
///
/// The column position matches the history table layout; a page laid out
/// differently will put something else in that column.
pub fn race_name(row: &RowCells<'_>) -> Option<String> {
    if let Some(name) = row.columns.get(RACE_NAME_COLUMN).filter(|c| !c.is_empty()) {
        return Some(name.clone());
    }

    row.links
        .iter()
        .find(|link| link.is_race() && !link.text.is_empty())
        .map(|link| link.text.clone())
}

pub fn finish_position(row: &RowCells<'_>) -> Option<FinishPosition> {
    let window = || row.columns.iter().take(FINISH_POSITION_WINDOW);

    let placed = window()
        .filter(|cell| ONE_OR_TWO_DIGITS.is_match(cell))
        .filter_map(|cell| cell.parse::<u8>().ok())
        .find(|n| (1..=MAX_FIELD_SIZE).contains(n));
    if let Some(n) = placed {
        return Some(FinishPosition::Placed(n));
    }

    window()
        .find_map(|cell| special_status(cell))
        .map(FinishPosition::Status)
}

fn special_status(cell: &str) -> Option<SpecialStatus> {
    SPECIAL_STATUSES
        .iter()
        .find(|(keyword, _)| cell.eq_ignore_ascii_case(keyword))
        .map(|(_, status)| *status)
}

pub fn venue(row: &RowCells<'_>) -> Option<Venue> {
    row.columns.iter().find_map(|cell| Venue::from_name(cell))
}

/// First cell containing a surface marker anywhere in its text.
///
/// Markers are plain substrings and the race name column comes before the
/// course cell, so a name like 日本ダービー reads as dirt.
pub fn surface(row: &RowCells<'_>) -> Option<Surface> {
    row.columns.iter().find_map(|cell| {
        SURFACE_MARKERS
            .iter()
            .find(|(marker, _)| cell.contains(marker))
            .map(|(_, surface)| *surface)
    })
}

pub fn distance_meters(row: &RowCells<'_>) -> Option<u32> {
    row.columns.iter().find_map(|cell| {
        DISTANCE
            .captures(cell)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .filter(|meters| *meters > 0)
    })
}

pub fn going(row: &RowCells<'_>) -> Option<Going> {
    GOING_MARKERS
        .iter()
        .find(|(marker, _)| row.text.contains(marker))
        .map(|(_, going)| *going)
}

pub fn jockey_name(row: &RowCells<'_>) -> Option<String> {
    row.links
        .iter()
        .find(|link| link.is_jockey() && !link.text.is_empty())
        .map(|link| link.text.clone())
}

pub fn weight_carried_kg(row: &RowCells<'_>) -> Option<f64> {
    row.columns
        .iter()
        .filter(|cell| WEIGHT.is_match(cell))
        .find_map(|cell| cell.parse::<f64>().ok())
}

pub fn finish_time(row: &RowCells<'_>) -> Option<FinishTime> {
    FINISH_TIME.captures_iter(row.text).find_map(|caps| {
        let minutes = caps[1].parse::<u32>().ok()?;
        let seconds = caps[2].parse::<u32>().ok()?;
        let tenths = caps[3].parse::<u32>().ok()?;
        if seconds >= 60 {
            return None;
        }
        FinishTime::checked(minutes, seconds, tenths)
    })
}

pub fn margin(row: &RowCells<'_>) -> Option<Margin> {
    row.columns.iter().find_map(|cell| {
        if let Some((_, token)) = MARGIN_TOKENS.iter().find(|(word, _)| cell.as_str() == *word) {
            return Some(Margin::Token(*token));
        }
        if MARGIN_LENGTHS.is_match(cell) {
            return cell.parse::<f64>().ok().map(Margin::Lengths);
        }
        None
    })
}

pub fn odds(row: &RowCells<'_>) -> Option<f64> {
    row.columns
        .iter()
        .filter(|cell| BARE_DECIMAL.is_match(cell))
        .find_map(|cell| cell.parse::<f64>().ok())
}

pub fn popularity_rank(row: &RowCells<'_>) -> Option<u32> {
    row.columns.iter().find_map(|cell| {
        POPULARITY.captures(cell).and_then(|caps| {
            caps.iter()
                .skip(1)
                .flatten()
                .next()
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|rank| *rank > 0)
        })
    })
}

/// Prize money (本賞金) from the last column, 0 when absent
pub fn prize_money(row: &RowCells<'_>) -> f64 {
    row.columns
        .last()
        .map(|cell| cell.replace(',', ""))
        .filter(|cell| PRIZE.is_match(cell))
        .and_then(|cell| cell.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        columns: Vec<String>,
        text: String,
        links: Vec<RowLink>,
    }

    impl Row {
        fn new(cells: &[&str]) -> Self {
            let columns: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
            let text = columns.join(" ");
            Self {
                columns,
                text,
                links: Vec::new(),
            }
        }

        fn link(mut self, href: &str, text: &str) -> Self {
            self.links.push(RowLink {
                href: href.to_string(),
                text: text.to_string(),
            });
            self
        }

        fn cells(&self) -> RowCells<'_> {
            RowCells {
                columns: &self.columns,
                text: &self.text,
                links: &self.links,
            }
        }
    }

    #[test]
    fn test_finish_position_numeric() {
        let row = Row::new(&["2024/05/26", "東京", "良", "3", "日本ダービー"]);
        assert_eq!(finish_position(&row.cells()), Some(FinishPosition::Placed(3)));
    }

    #[test]
    fn test_finish_position_only_in_leading_cells() {
        let row = Row::new(&["a", "b", "c", "d", "5"]);
        assert_eq!(finish_position(&row.cells()), None);
    }

    #[test]
    fn test_finish_position_out_of_range() {
        let row = Row::new(&["0", "19", "x"]);
        assert_eq!(finish_position(&row.cells()), None);
    }

    #[test]
    fn test_finish_position_special_status() {
        let row = Row::new(&["2024/05/26", "取消", "x"]);
        assert_eq!(
            finish_position(&row.cells()),
            Some(FinishPosition::Status(SpecialStatus::Scratched))
        );

        let row = Row::new(&["dq"]);
        assert_eq!(
            finish_position(&row.cells()),
            Some(FinishPosition::Status(SpecialStatus::Disqualified))
        );
    }

    #[test]
    fn test_finish_position_prefers_numeral_over_status() {
        let row = Row::new(&["中止", "7"]);
        assert_eq!(finish_position(&row.cells()), Some(FinishPosition::Placed(7)));
    }

    #[test]
    fn test_venue_exact_match_only() {
        assert_eq!(venue(&Row::new(&["x", "阪神"]).cells()), Some(Venue::Hanshin));
        assert_eq!(venue(&Row::new(&["3阪神5"]).cells()), None);
    }

    #[test]
    fn test_surface() {
        assert_eq!(surface(&Row::new(&["芝2400"]).cells()), Some(Surface::Turf));
        assert_eq!(surface(&Row::new(&["ダ1200"]).cells()), Some(Surface::Dirt));
        assert_eq!(surface(&Row::new(&["障芝3000"]).cells()), Some(Surface::Jump));
        assert_eq!(surface(&Row::new(&["1200"]).cells()), None);
    }

    #[test]
    fn test_distance_requires_unit_suffix() {
        assert_eq!(distance_meters(&Row::new(&["芝2400m"]).cells()), Some(2400));
        assert_eq!(distance_meters(&Row::new(&["1600 ", "1800米"]).cells()), Some(1800));
        assert_eq!(distance_meters(&Row::new(&["2400"]).cells()), None);
        assert_eq!(distance_meters(&Row::new(&["0m"]).cells()), None);
        assert_eq!(distance_meters(&Row::new(&["5min"]).cells()), None);
    }

    #[test]
    fn test_going_longest_marker_first() {
        assert_eq!(going(&Row::new(&["不良"]).cells()), Some(Going::Heavy));
        assert_eq!(going(&Row::new(&["稍重"]).cells()), Some(Going::Good));
        assert_eq!(going(&Row::new(&["重"]).cells()), Some(Going::Soft));
        assert_eq!(going(&Row::new(&["良"]).cells()), Some(Going::Firm));
        assert_eq!(going(&Row::new(&["Heavy ground"]).cells()), Some(Going::Heavy));
        assert_eq!(going(&Row::new(&["晴"]).cells()), None);
    }

    #[test]
    fn test_jockey_name_from_link() {
        let row = Row::new(&["x"]).link("/jockey/result/recent/05339/", "ルメール");
        assert_eq!(jockey_name(&row.cells()).as_deref(), Some("ルメール"));
        assert_eq!(jockey_name(&Row::new(&["ルメール"]).cells()), None);
    }

    #[test]
    fn test_weight_carried() {
        assert_eq!(weight_carried_kg(&Row::new(&["5", "57.0"]).cells()), Some(57.0));
        assert_eq!(weight_carried_kg(&Row::new(&["55"]).cells()), Some(55.0));
        assert_eq!(weight_carried_kg(&Row::new(&["5", "57.25"]).cells()), None);
    }

    #[test]
    fn test_finish_time() {
        let row = Row::new(&["2:24.3", "0.2"]);
        assert_eq!(finish_time(&row.cells()), Some(FinishTime::new(2, 24, 3)));
        assert_eq!(finish_time(&Row::new(&["12:24.3"]).cells()), None);
        assert_eq!(finish_time(&Row::new(&["1:75.0"]).cells()), None);
    }

    #[test]
    fn test_margin_tokens_and_lengths() {
        assert_eq!(
            margin(&Row::new(&["x", "クビ"]).cells()),
            Some(Margin::Token(MarginToken::Neck))
        );
        assert_eq!(margin(&Row::new(&["-0.3"]).cells()), Some(Margin::Lengths(-0.3)));
        assert_eq!(margin(&Row::new(&["0.25"]).cells()), None);
    }

    #[test]
    fn test_surface_marker_in_race_name() {
        let row = Row::new(&["2024/05/26", "東京", "良", "1", "日本ダービー(G1)", "芝2400"]);
        assert_eq!(surface(&row.cells()), Some(Surface::Dirt));

        let row = Row::new(&["2024/05/26", "東京", "良", "1", "東京優駿(G1)", "芝2400"]);
        assert_eq!(surface(&row.cells()), Some(Surface::Turf));
    }

    #[test]
    fn test_odds_and_margin_overlap() {
        // A bare one-decimal numeral satisfies both classifiers.
        let row = Row::new(&["3.5"]);
        assert_eq!(odds(&row.cells()), Some(3.5));
        assert_eq!(margin(&row.cells()), Some(Margin::Lengths(3.5)));
    }

    #[test]
    fn test_popularity_rank() {
        assert_eq!(popularity_rank(&Row::new(&["x", "3人気"]).cells()), Some(3));
        assert_eq!(popularity_rank(&Row::new(&["1番人気"]).cells()), Some(1));
        assert_eq!(popularity_rank(&Row::new(&["人気 12"]).cells()), Some(12));
        assert_eq!(popularity_rank(&Row::new(&["Pop 4"]).cells()), Some(4));
        assert_eq!(popularity_rank(&Row::new(&["0人気"]).cells()), None);
        assert_eq!(popularity_rank(&Row::new(&["3"]).cells()), None);
    }

    #[test]
    fn test_prize_money_last_cell_only() {
        assert_eq!(prize_money(&Row::new(&["x", "1,234.5"]).cells()), 1234.5);
        assert_eq!(prize_money(&Row::new(&["5400.0", "x"]).cells()), 0.0);
        assert_eq!(prize_money(&Row::new(&[]).cells()), 0.0);
    }

    #[test]
    fn test_race_name_column_then_link() {
        let row = Row::new(&["a", "b", "c", "d", "日本ダービー(G1)"]);
        assert_eq!(race_name(&row.cells()).as_deref(), Some("日本ダービー(G1)"));

        let row = Row::new(&["a", "b", "c", "d", ""])
            .link("/race/list/20240526/", "2024/05/26")
            .link("/race/202405021011/", "東京優駿");
        assert_eq!(race_name(&row.cells()).as_deref(), Some("東京優駿"));
    }

    #[test]
    fn test_date_from_race_list_link() {
        let row = Row::new(&["x"])
            .link("/race/202405021011/", "東京優駿")
            .link("/race/list/20240526/", "2024/05/26");
        assert_eq!(date(&row.cells()).as_deref(), Some("2024/05/26"));
        assert_eq!(date(&Row::new(&["2024/05/26"]).cells()), None);
    }

    #[test]
    fn test_classify_row_unmatched() {
        let row = Row::new(&["foo", "bar"]);
        let record = classify_row(&row.cells());
        assert_eq!(record.raw_text, "foo bar");
        assert_eq!(record.raw_columns, vec!["foo", "bar"]);
        assert_eq!(record.finish_position, None);
        assert_eq!(record.odds, None);
        assert_eq!(record.going, None);
        assert_eq!(record.prize_money, 0.0);
    }

    #[test]
    fn test_classifier_order_is_stable() {
        let names: Vec<&str> = CLASSIFIERS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.first(), Some(&"date"));
        assert_eq!(names.last(), Some(&"prize_money"));
        assert_eq!(names.len(), 14);
    }
}
