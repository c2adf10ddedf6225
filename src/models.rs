use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Non-numeric finishing status (中止 / 取消 / 除外 / 失格)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialStatus {
    DidNotFinish,
    Scratched,
    Excluded,
    Disqualified,
}

/// Finishing position: an ordinal 1-18 or a special status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinishPosition {
    Placed(u8),
    Status(SpecialStatus),
}

impl FinishPosition {
    /// Ordinal place, if the horse finished
    pub fn place(&self) -> Option<u8> {
        match self {
            FinishPosition::Placed(n) => Some(*n),
            FinishPosition::Status(_) => None,
        }
    }
}

/// JRA racecourses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    Sapporo,
    Hakodate,
    Fukushima,
    Niigata,
    Tokyo,
    Nakayama,
    Chukyo,
    Kyoto,
    Hanshin,
    Kokura,
}

impl Venue {
    pub const ALL: [Venue; 10] = [
        Venue::Sapporo,
        Venue::Hakodate,
        Venue::Fukushima,
        Venue::Niigata,
        Venue::Tokyo,
        Venue::Nakayama,
        Venue::Chukyo,
        Venue::Kyoto,
        Venue::Hanshin,
        Venue::Kokura,
    ];

    /// Course name as printed on race cards
    pub fn name(&self) -> &'static str {
        match self {
            Venue::Sapporo => "札幌",
            Venue::Hakodate => "函館",
            Venue::Fukushima => "福島",
            Venue::Niigata => "新潟",
            Venue::Tokyo => "東京",
            Venue::Nakayama => "中山",
            Venue::Chukyo => "中京",
            Venue::Kyoto => "京都",
            Venue::Hanshin => "阪神",
            Venue::Kokura => "小倉",
        }
    }

    /// Romanized course name
    pub fn romaji(&self) -> &'static str {
        match self {
            Venue::Sapporo => "Sapporo",
            Venue::Hakodate => "Hakodate",
            Venue::Fukushima => "Fukushima",
            Venue::Niigata => "Niigata",
            Venue::Tokyo => "Tokyo",
            Venue::Nakayama => "Nakayama",
            Venue::Chukyo => "Chukyo",
            Venue::Kyoto => "Kyoto",
            Venue::Hanshin => "Hanshin",
            Venue::Kokura => "Kokura",
        }
    }

    /// Exact lookup by Japanese or romanized name
    pub fn from_name(text: &str) -> Option<Venue> {
        Venue::ALL
            .iter()
            .copied()
            .find(|v| v.name() == text || v.romaji().eq_ignore_ascii_case(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surface {
    Turf,
    Dirt,
    Jump,
}

/// Track condition (馬場)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Going {
    Firm,
    Good,
    Soft,
    Heavy,
}

/// Categorical finishing gaps (着差)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginToken {
    Nose,
    Head,
    Neck,
    Distance,
    DeadHeat,
}

/// Gap to the preceding horse: a token or a length/seconds value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Margin {
    Token(MarginToken),
    Lengths(f64),
}

/// Race time with tenth-of-a-second resolution (e.g. `2:24.3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FinishTime {
    tenths: u32,
}

impl FinishTime {
    /// Saturates at `u32::MAX` tenths; use `checked` for untrusted input
    pub fn new(minutes: u32, seconds: u32, tenths: u32) -> Self {
        Self::checked(minutes, seconds, tenths).unwrap_or(Self { tenths: u32::MAX })
    }

    pub fn checked(minutes: u32, seconds: u32, tenths: u32) -> Option<Self> {
        let tenths = minutes
            .checked_mul(60)?
            .checked_add(seconds)?
            .checked_mul(10)?
            .checked_add(tenths)?;
        Some(Self { tenths })
    }

    pub fn total_seconds(&self) -> f64 {
        self.tenths as f64 / 10.0
    }
}

impl fmt::Display for FinishTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.tenths / 10;
        write!(f, "{}:{:02}.{}", seconds / 60, seconds % 60, self.tenths % 10)
    }
}

impl FromStr for FinishTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (minutes, rest) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("missing ':' in finish time {:?}", s))?;
        let (seconds, tenths) = rest
            .split_once('.')
            .ok_or_else(|| format!("missing '.' in finish time {:?}", s))?;

        let minutes = minutes.parse::<u32>().map_err(|e| e.to_string())?;
        let seconds = seconds.parse::<u32>().map_err(|e| e.to_string())?;
        let tenths = tenths.parse::<u32>().map_err(|e| e.to_string())?;
        if seconds >= 60 || tenths >= 10 {
            return Err(format!("finish time out of range: {:?}", s));
        }

        FinishTime::checked(minutes, seconds, tenths)
            .ok_or_else(|| format!("finish time too large: {:?}", s))
    }
}

impl From<FinishTime> for String {
    fn from(time: FinishTime) -> Self {
        time.to_string()
    }
}

impl TryFrom<String> for FinishTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One past race appearance parsed from a history table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: Option<String>,
    pub race_name: Option<String>,
    pub finish_position: Option<FinishPosition>,
    pub venue: Option<Venue>,
    pub surface: Option<Surface>,
    pub distance_meters: Option<u32>,
    pub going: Option<Going>,
    pub jockey_name: Option<String>,
    pub weight_carried_kg: Option<f64>,
    pub finish_time: Option<FinishTime>,
    pub margin: Option<Margin>,
    pub odds: Option<f64>,
    pub popularity_rank: Option<u32>,
    #[serde(default)]
    pub prize_money: f64,
    pub raw_text: String,
    pub raw_columns: Vec<String>,
}

impl PerformanceRecord {
    /// Empty record carrying only the normalized row text
    pub fn from_raw(raw_text: String, raw_columns: Vec<String>) -> Self {
        Self {
            date: None,
            race_name: None,
            finish_position: None,
            venue: None,
            surface: None,
            distance_meters: None,
            going: None,
            jockey_name: None,
            weight_carried_kg: None,
            finish_time: None,
            margin: None,
            odds: None,
            popularity_rank: None,
            prize_money: 0.0,
            raw_text,
            raw_columns,
        }
    }

    /// Race date parsed from the `YYYY/MM/DD` link text
    pub fn race_date(&self) -> Option<NaiveDate> {
        let date = self.date.as_deref()?.trim();
        NaiveDate::parse_from_str(date, "%Y/%m/%d")
            .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
            .ok()
    }
}

/// Summary of a horse's most recent run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorseBrief {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_finish: Option<u8>,
}

impl HorseBrief {
    /// Build from history records ordered most-recent-first
    pub fn from_records(records: &[PerformanceRecord]) -> Self {
        let Some(last) = records.first() else {
            return Self::default();
        };

        Self {
            last_result_date: last.date.clone(),
            last_result_name: last.race_name.clone(),
            last_finish: last.finish_position.and_then(|p| p.place()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_result_date.is_none()
            && self.last_result_name.is_none()
            && self.last_finish.is_none()
    }
}

/// A runner and its parsed race history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorseEntry {
    pub horse_id: String,
    pub history: Vec<PerformanceRecord>,
}

impl HorseEntry {
    pub fn new(horse_id: impl Into<String>, history: Vec<PerformanceRecord>) -> Self {
        Self {
            horse_id: horse_id.into(),
            history,
        }
    }

    pub fn brief(&self) -> HorseBrief {
        HorseBrief::from_records(&self.history)
    }
}

/// Win probabilities keyed by runner id, summing to 1.0
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreDistribution(BTreeMap<String, f64>);

impl ScoreDistribution {
    pub(crate) fn from_map(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.0.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, f64> {
        self.0
    }
}

/// Finishing order keyed by runner id: a permutation of 1..=N
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankAssignment(BTreeMap<String, u32>);

impl RankAssignment {
    pub(crate) fn from_map(map: BTreeMap<String, u32>) -> Self {
        Self(map)
    }

    pub fn get(&self, id: &str) -> Option<u32> {
        self.0.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Ids sorted by assigned rank (winner first)
    pub fn finishing_order(&self) -> Vec<&str> {
        let mut order: Vec<(&str, u32)> = self.iter().collect();
        order.sort_by_key(|(_, rank)| *rank);
        order.into_iter().map(|(id, _)| id).collect()
    }

    pub fn into_inner(self) -> BTreeMap<String, u32> {
        self.0
    }
}
