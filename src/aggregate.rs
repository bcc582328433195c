use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{JoinedRow, StudentActivity, StudentProfile};
use crate::timestamp;

#[derive(Default)]
struct ProfileAccumulator {
    points: Option<f64>,
    badges_cnt: Option<f64>,
    user_city: Option<String>,
    learning_stage: Option<String>,
    correct: usize,
    answered: usize,
}

#[derive(Default)]
struct ActivityAccumulator {
    dates: BTreeSet<NaiveDate>,
    parsed_timestamps: usize,
    seconds: Option<f64>,
    teacher_max: Option<f64>,
}

/// Groups filtered rows by student id, ordered by id.
///
/// City and stage take the greatest value under string ordering. That is
/// neither the most frequent nor the first-seen value; it only matters when
/// a student's rows disagree.
pub fn profiles(rows: &[JoinedRow]) -> Vec<StudentProfile> {
    let mut groups: BTreeMap<&str, ProfileAccumulator> = BTreeMap::new();

    for row in rows {
        let acc = groups.entry(row.log.uuid.as_str()).or_default();
        acc.points = max_number(acc.points, row.points());
        acc.badges_cnt = max_number(acc.badges_cnt, row.badges_cnt());
        acc.user_city = max_text(acc.user_city.take(), row.user_city());
        acc.learning_stage = max_text(acc.learning_stage.take(), row.learning_stage());
        acc.answered += 1;
        if row.log.is_correct.0 {
            acc.correct += 1;
        }
    }

    groups
        .into_iter()
        .map(|(uuid, acc)| StudentProfile {
            uuid: uuid.to_string(),
            points: acc.points,
            badges_cnt: acc.badges_cnt,
            user_city: acc.user_city,
            learning_stage: acc.learning_stage,
            accuracy: acc.correct as f64 / acc.answered as f64,
        })
        .collect()
}

/// Derives active days, total hours and teacher support per student.
///
/// A student whose rows carry no parseable timestamp or no time-taken value
/// has no activity record.
pub fn activities(rows: &[JoinedRow]) -> BTreeMap<String, StudentActivity> {
    let mut groups: BTreeMap<&str, ActivityAccumulator> = BTreeMap::new();

    for row in rows {
        let acc = groups.entry(row.log.uuid.as_str()).or_default();
        if let Some(date) = row.log.timestamp.as_deref().and_then(timestamp::date_of) {
            acc.dates.insert(date);
            acc.parsed_timestamps += 1;
        }
        if let Some(secs) = row.log.total_sec_taken.filter(|s| !s.is_nan()) {
            acc.seconds = Some(acc.seconds.unwrap_or(0.0) + secs);
        }
        acc.teacher_max = max_number(acc.teacher_max, row.has_teacher_cnt());
    }

    let mut out = BTreeMap::new();
    for (uuid, acc) in groups {
        let Some(seconds) = acc.seconds else {
            debug!(uuid, "no time-taken values, dropping student");
            continue;
        };
        if acc.parsed_timestamps == 0 {
            debug!(uuid, "no parseable timestamps, dropping student");
            continue;
        }
        out.insert(
            uuid.to_string(),
            StudentActivity {
                active_days: acc.dates.len(),
                total_hours: seconds / 3600.0,
                teacher_support: u8::from(acc.teacher_max.is_some_and(|max| max > 0.0)),
            },
        );
    }

    out
}

pub(crate) fn max_number(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate.filter(|v| !v.is_nan())) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

pub(crate) fn max_text(current: Option<String>, candidate: Option<&str>) -> Option<String> {
    match (current, candidate) {
        (Some(a), Some(b)) if b > a.as_str() => Some(b.to_string()),
        (Some(a), _) => Some(a),
        (None, b) => b.map(str::to_string),
    }
}
