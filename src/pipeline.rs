//! Stage wiring: each step takes the previous step's output by reference
//! and returns a fresh value.

use tracing::info;

use crate::aggregate;
use crate::analysis;
use crate::classify::classify;
use crate::filter;
use crate::join::join;
use crate::loader::Tables;
use crate::models::{
    Behavior, BehaviorCount, ChiSquareResult, JoinedRow, KruskalResult, Metric, StageCount,
    StudentProfile, StudentSummary,
};
use crate::standardize::{standardize, ZeroVariance};

#[derive(Debug, Clone)]
pub struct Prepared {
    pub stages: Vec<StageCount>,
    pub rows: Vec<JoinedRow>,
}

#[derive(Debug, Clone)]
pub struct RegionalAnalysis {
    pub profiles: Vec<StudentProfile>,
    pub kruskal: Vec<KruskalResult>,
}

#[derive(Debug, Clone)]
pub struct BehaviorAnalysis {
    pub summaries: Vec<StudentSummary>,
    pub counts: Vec<BehaviorCount>,
    pub chi_square: Vec<ChiSquareResult>,
}

/// Join and filter.
pub fn prepare(tables: &Tables) -> Prepared {
    let joined = join(&tables.logs, &tables.users, &tables.content);
    info!(rows = joined.len(), "joined log rows");
    let filtered = filter::apply(joined);
    info!(rows = filtered.rows.len(), "rows after filtering");

    Prepared {
        stages: filtered.stages,
        rows: filtered.rows,
    }
}

/// City differences in points, badges and accuracy.
pub fn regional(rows: &[JoinedRow]) -> anyhow::Result<RegionalAnalysis> {
    let profiles = aggregate::profiles(rows);
    info!(students = profiles.len(), "aggregated student profiles");

    let kruskal = Metric::ALL
        .into_iter()
        .map(|metric| analysis::kruskal_by_city(&profiles, metric))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(RegionalAnalysis { profiles, kruskal })
}

/// Profiles joined with their activity, standardized and classified.
/// Students without an activity record are left out.
pub fn summaries(rows: &[JoinedRow], policy: ZeroVariance) -> Vec<StudentSummary> {
    let profiles = aggregate::profiles(rows);
    let activities = aggregate::activities(rows);
    info!(
        students = profiles.len(),
        with_activity = activities.len(),
        "derived activity metrics"
    );

    let paired: Vec<_> = profiles
        .iter()
        .filter_map(|profile| activities.get(&profile.uuid).map(|activity| (profile, activity)))
        .collect();
    let scores = standardize(&paired, policy);

    paired
        .into_iter()
        .zip(scores)
        .map(|((profile, activity), z)| StudentSummary {
            profile: profile.clone(),
            activity: activity.clone(),
            flags: classify(&z, activity.teacher_support),
            z,
        })
        .collect()
}

/// Behavior archetype counts and their independence from city.
pub fn behavior(rows: &[JoinedRow], policy: ZeroVariance) -> anyhow::Result<BehaviorAnalysis> {
    let summaries = summaries(rows, policy);
    let counts = analysis::behavior_counts(&summaries);
    let chi_square = Behavior::TEST_ORDER
        .into_iter()
        .map(|behavior| analysis::chi_square_by_flag(&summaries, behavior))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(BehaviorAnalysis {
        summaries,
        counts,
        chi_square,
    })
}
