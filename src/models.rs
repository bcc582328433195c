use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Boolean column as exported by spreadsheets and dataframe tools.
///
/// Accepts `true`/`false` in any case, `t`/`f`, `yes`/`no` and the numeric
/// spellings `1`/`0`/`1.0`/`0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag(pub bool);

impl Flag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(Flag(true)),
            "false" | "f" | "no" | "n" | "0" | "0.0" => Some(Flag(false)),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlagVisitor;

        impl Visitor<'_> for FlagVisitor {
            type Value = Flag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a boolean such as true/false or 1/0")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<Flag, E> {
                Ok(Flag(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Flag, E> {
                match value {
                    0 => Ok(Flag(false)),
                    1 => Ok(Flag(true)),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Flag, E> {
                match value {
                    0 => Ok(Flag(false)),
                    1 => Ok(Flag(true)),
                    _ => Err(E::invalid_value(de::Unexpected::Signed(value), &self)),
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Flag, E> {
                Flag::parse(value).ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_str(FlagVisitor)
    }
}

/// Spellings dataframe tools read as a missing cell.
const NA_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na(raw: &str) -> bool {
    raw.is_empty() || NA_TOKENS.contains(&raw)
}

/// Optional text where the NA spellings count as missing.
fn na_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !is_na(value.trim())))
}

/// Optional number that also treats the usual NA spellings as missing.
fn na_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if is_na(raw) {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(raw), &"a number"))
}

fn na_flag<'de, D>(deserializer: D) -> Result<Option<Flag>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if is_na(raw) {
        return Ok(None);
    }
    Flag::parse(raw)
        .map(Some)
        .ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(raw), &"a boolean"))
}

/// One row of the user table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub uuid: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "na_number")]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "na_number")]
    pub badges_cnt: Option<f64>,
    #[serde(default, deserialize_with = "na_number")]
    pub user_grade: Option<f64>,
    #[serde(default, deserialize_with = "na_text")]
    pub user_city: Option<String>,
    #[serde(default, deserialize_with = "na_number")]
    pub has_teacher_cnt: Option<f64>,
    #[serde(default, deserialize_with = "na_flag")]
    pub is_self_coach: Option<Flag>,
    #[serde(default, deserialize_with = "na_text")]
    pub learning_stage: Option<String>,
}

/// One row of the content table. Only enriches log rows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentRecord {
    pub ucid: String,
    #[serde(default)]
    pub content_pretty_name: Option<String>,
    #[serde(default)]
    pub content_kind: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "na_text")]
    pub learning_stage: Option<String>,
}

/// One interaction event from the problem log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRecord {
    pub uuid: String,
    pub ucid: String,
    pub is_correct: Flag,
    #[serde(default, deserialize_with = "na_number")]
    pub total_sec_taken: Option<f64>,
    #[serde(rename = "timestamp_TW", default)]
    pub timestamp: Option<String>,
}

/// A log row left-joined with its user and content attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub log: LogRecord,
    pub user: Option<UserRecord>,
    pub content: Option<ContentRecord>,
}

impl JoinedRow {
    pub fn user_grade(&self) -> Option<f64> {
        self.user.as_ref().and_then(|u| u.user_grade)
    }

    pub fn badges_cnt(&self) -> Option<f64> {
        self.user.as_ref().and_then(|u| u.badges_cnt)
    }

    pub fn points(&self) -> Option<f64> {
        self.user.as_ref().and_then(|u| u.points)
    }

    pub fn is_self_coach(&self) -> Option<bool> {
        self.user.as_ref().and_then(|u| u.is_self_coach).map(|f| f.0)
    }

    pub fn gender(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.gender.as_deref())
    }

    pub fn user_city(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.user_city.as_deref())
    }

    pub fn has_teacher_cnt(&self) -> Option<f64> {
        self.user.as_ref().and_then(|u| u.has_teacher_cnt)
    }

    /// Stage of the row: the content's stage, falling back to the user's.
    pub fn learning_stage(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.learning_stage.as_deref())
            .or_else(|| self.user.as_ref().and_then(|u| u.learning_stage.as_deref()))
    }
}

/// Per-student aggregates shared by both analysis sections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub uuid: String,
    pub points: Option<f64>,
    pub badges_cnt: Option<f64>,
    pub user_city: Option<String>,
    pub learning_stage: Option<String>,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentActivity {
    pub active_days: usize,
    pub total_hours: f64,
    pub teacher_support: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZScores {
    pub days: f64,
    pub hours: f64,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BehaviorFlags {
    pub burst: bool,
    pub stable: bool,
    pub selflearn: bool,
    pub passive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Stable,
    Burst,
    Selflearn,
    Passive,
}

impl Behavior {
    /// Order used when reporting population counts.
    pub const COUNT_ORDER: [Behavior; 4] = [
        Behavior::Stable,
        Behavior::Burst,
        Behavior::Selflearn,
        Behavior::Passive,
    ];

    /// Order used for the city independence tests.
    pub const TEST_ORDER: [Behavior; 4] = [
        Behavior::Burst,
        Behavior::Stable,
        Behavior::Selflearn,
        Behavior::Passive,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Behavior::Stable => "stable_type",
            Behavior::Burst => "burst_type",
            Behavior::Selflearn => "selflearn_type",
            Behavior::Passive => "passive_type",
        }
    }
}

impl BehaviorFlags {
    pub fn get(&self, behavior: Behavior) -> bool {
        match behavior {
            Behavior::Stable => self.stable,
            Behavior::Burst => self.burst,
            Behavior::Selflearn => self.selflearn,
            Behavior::Passive => self.passive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub profile: StudentProfile,
    pub activity: StudentActivity,
    pub z: ZScores,
    pub flags: BehaviorFlags,
}

/// Numeric profile columns compared across cities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Points,
    BadgesCnt,
    Accuracy,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Points, Metric::BadgesCnt, Metric::Accuracy];

    pub fn column(self) -> &'static str {
        match self {
            Metric::Points => "points",
            Metric::BadgesCnt => "badges_cnt",
            Metric::Accuracy => "accuracy",
        }
    }

    pub fn value(self, profile: &StudentProfile) -> Option<f64> {
        let value = match self {
            Metric::Points => profile.points,
            Metric::BadgesCnt => profile.badges_cnt,
            Metric::Accuracy => Some(profile.accuracy),
        };
        value.filter(|v| !v.is_nan())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KruskalResult {
    pub metric: Metric,
    pub groups: usize,
    pub statistic: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChiSquareResult {
    pub behavior: Behavior,
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorCount {
    pub behavior: Behavior,
    pub students: usize,
}
