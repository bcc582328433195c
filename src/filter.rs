use tracing::debug;

use crate::models::{JoinedRow, StageCount};

const LEARNING_STAGES: [&str; 2] = ["elementary", "junior"];

/// `NULL` is a sentinel the user export writes for unknown gender.
const GENDERS: [&str; 3] = ["NULL", "male", "female"];

/// Inclusion rules for joined rows, applied as a conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    GradeRange,
    MinBadges,
    NotSelfCoach,
    LearningStage,
    Gender,
}

impl Predicate {
    pub const ALL: [Predicate; 5] = [
        Predicate::GradeRange,
        Predicate::MinBadges,
        Predicate::NotSelfCoach,
        Predicate::LearningStage,
        Predicate::Gender,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Predicate::GradeRange => "user_grade in 1..=9",
            Predicate::MinBadges => "badges_cnt >= 1",
            Predicate::NotSelfCoach => "is_self_coach == false",
            Predicate::LearningStage => "learning_stage in {elementary, junior}",
            Predicate::Gender => "gender in {missing, NULL, male, female}",
        }
    }

    pub fn accepts(self, row: &JoinedRow) -> bool {
        match self {
            Predicate::GradeRange => row
                .user_grade()
                .is_some_and(|grade| (1.0..=9.0).contains(&grade)),
            Predicate::MinBadges => row.badges_cnt().is_some_and(|badges| badges >= 1.0),
            Predicate::NotSelfCoach => row.is_self_coach() == Some(false),
            Predicate::LearningStage => row
                .learning_stage()
                .is_some_and(|stage| LEARNING_STAGES.contains(&stage)),
            Predicate::Gender => row.gender().map_or(true, |gender| GENDERS.contains(&gender)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filtered {
    pub rows: Vec<JoinedRow>,
    pub stages: Vec<StageCount>,
}

/// Applies every predicate in turn, recording the surviving row count after
/// each one. The first stage entry is the unfiltered join size.
pub fn apply(rows: Vec<JoinedRow>) -> Filtered {
    let mut stages = vec![StageCount {
        stage: "joined".to_string(),
        rows: rows.len(),
    }];
    let mut rows = rows;

    for predicate in Predicate::ALL {
        rows.retain(|row| predicate.accepts(row));
        debug!(predicate = predicate.label(), remaining = rows.len(), "applied filter");
        stages.push(StageCount {
            stage: predicate.label().to_string(),
            rows: rows.len(),
        });
    }

    Filtered { rows, stages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentRecord, Flag, LogRecord, UserRecord};
    use proptest::prelude::*;

    fn row(
        grade: Option<f64>,
        badges: Option<f64>,
        self_coach: Option<bool>,
        stage: Option<&str>,
        gender: Option<&str>,
    ) -> JoinedRow {
        JoinedRow {
            log: LogRecord {
                uuid: "u1".to_string(),
                ucid: "c1".to_string(),
                is_correct: Flag(true),
                total_sec_taken: Some(60.0),
                timestamp: Some("1700000000".to_string()),
            },
            user: Some(UserRecord {
                uuid: "u1".to_string(),
                gender: gender.map(str::to_string),
                points: Some(10.0),
                badges_cnt: badges,
                user_grade: grade,
                user_city: Some("Taipei".to_string()),
                has_teacher_cnt: Some(0.0),
                is_self_coach: self_coach.map(Flag),
                learning_stage: None,
            }),
            content: Some(ContentRecord {
                ucid: "c1".to_string(),
                content_pretty_name: None,
                content_kind: None,
                difficulty: None,
                subject: None,
                learning_stage: stage.map(str::to_string),
            }),
        }
    }

    fn passing() -> JoinedRow {
        row(Some(5.0), Some(2.0), Some(false), Some("junior"), Some("female"))
    }

    #[test]
    fn accepts_a_row_meeting_every_rule() {
        let filtered = apply(vec![passing()]);
        assert_eq!(filtered.rows.len(), 1);
        assert_eq!(filtered.stages.len(), Predicate::ALL.len() + 1);
        assert!(filtered.stages.iter().all(|s| s.rows == 1));
    }

    #[test]
    fn grade_bounds_are_inclusive() {
        assert!(Predicate::GradeRange.accepts(&row(Some(1.0), None, None, None, None)));
        assert!(Predicate::GradeRange.accepts(&row(Some(9.0), None, None, None, None)));
        assert!(!Predicate::GradeRange.accepts(&row(Some(0.0), None, None, None, None)));
        assert!(!Predicate::GradeRange.accepts(&row(Some(10.0), None, None, None, None)));
        assert!(!Predicate::GradeRange.accepts(&row(None, None, None, None, None)));
    }

    #[test]
    fn gender_allows_missing_and_null_sentinel() {
        for gender in [None, Some("NULL"), Some("male"), Some("female")] {
            let candidate = row(Some(5.0), Some(2.0), Some(false), Some("junior"), gender);
            assert!(Predicate::Gender.accepts(&candidate), "{gender:?}");
        }
        let other = row(Some(5.0), Some(2.0), Some(false), Some("junior"), Some("unknown"));
        assert!(!Predicate::Gender.accepts(&other));
    }

    #[test]
    fn missing_self_coach_is_rejected() {
        let candidate = row(Some(5.0), Some(2.0), None, Some("junior"), None);
        assert!(!Predicate::NotSelfCoach.accepts(&candidate));
    }

    #[test]
    fn rows_without_a_user_match_are_dropped() {
        let mut orphan = passing();
        orphan.user = None;
        let filtered = apply(vec![orphan, passing()]);
        assert_eq!(filtered.rows.len(), 1);
        assert_eq!(filtered.stages[0].rows, 2);
        assert_eq!(filtered.stages[1].rows, 1);
    }

    fn arb_row() -> impl Strategy<Value = JoinedRow> {
        (
            proptest::option::of(-2.0..12.0f64),
            proptest::option::of(-1.0..4.0f64),
            proptest::option::of(any::<bool>()),
            proptest::option::of(prop_oneof!["elementary", "junior", "senior", "freshman"]),
            proptest::option::of(prop_oneof!["NULL", "male", "female", "other"]),
        )
            .prop_map(|(grade, badges, coach, stage, gender)| {
                row(grade, badges, coach, stage.as_deref(), gender.as_deref())
            })
    }

    proptest! {
        #[test]
        fn surviving_rows_satisfy_every_predicate(rows in proptest::collection::vec(arb_row(), 0..40)) {
            let filtered = apply(rows);
            for row in &filtered.rows {
                let grade = row.user_grade().unwrap();
                prop_assert!((1.0..=9.0).contains(&grade));
                prop_assert!(row.badges_cnt().unwrap() >= 1.0);
                prop_assert_eq!(row.is_self_coach(), Some(false));
                prop_assert!(matches!(row.learning_stage(), Some("elementary" | "junior")));
                prop_assert!(matches!(row.gender(), None | Some("NULL" | "male" | "female")));
            }
        }

        #[test]
        fn predicate_order_does_not_change_the_result(rows in proptest::collection::vec(arb_row(), 0..40)) {
            let forward = apply(rows.clone()).rows;
            let mut reversed = rows;
            for predicate in Predicate::ALL.iter().rev() {
                reversed.retain(|row| predicate.accepts(row));
            }
            prop_assert_eq!(forward, reversed);
        }
    }
}
