use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;

use crate::models::{
    Behavior, BehaviorCount, ChiSquareResult, KruskalResult, Metric, StudentProfile,
    StudentSummary,
};
use crate::stats;

/// Kruskal-Wallis H-test of `metric` across cities.
///
/// Students without a city are left out, and so are cities with fewer than
/// two observations of the metric.
pub fn kruskal_by_city(profiles: &[StudentProfile], metric: Metric) -> anyhow::Result<KruskalResult> {
    let mut by_city: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for profile in profiles {
        let Some(city) = profile.user_city.as_deref() else {
            continue;
        };
        let values = by_city.entry(city).or_default();
        if let Some(value) = metric.value(profile) {
            values.push(value);
        }
    }

    let groups: Vec<Vec<f64>> = by_city
        .into_values()
        .filter(|values| values.len() > 1)
        .collect();
    let test = stats::kruskal_wallis(&groups)
        .with_context(|| format!("Kruskal-Wallis by city failed for {}", metric.column()))?;

    Ok(KruskalResult {
        metric,
        groups: groups.len(),
        statistic: test.statistic,
        p_value: test.p_value,
    })
}

/// Cross-tabulates city against one behavior flag. Rows are cities in
/// sorted order; columns are the flag values that occur, false before true.
pub fn crosstab(summaries: &[StudentSummary], behavior: Behavior) -> Vec<Vec<f64>> {
    let mut counts: BTreeMap<&str, [usize; 2]> = BTreeMap::new();
    let mut seen: BTreeSet<usize> = BTreeSet::new();

    for summary in summaries {
        let Some(city) = summary.profile.user_city.as_deref() else {
            continue;
        };
        let column = usize::from(summary.flags.get(behavior));
        counts.entry(city).or_default()[column] += 1;
        seen.insert(column);
    }

    counts
        .into_values()
        .map(|row| seen.iter().map(|&column| row[column] as f64).collect())
        .collect()
}

pub fn chi_square_by_flag(
    summaries: &[StudentSummary],
    behavior: Behavior,
) -> anyhow::Result<ChiSquareResult> {
    let table = crosstab(summaries, behavior);
    let test = stats::chi2_contingency(&table)
        .with_context(|| format!("chi-square by city failed for {}", behavior.column()))?;

    Ok(ChiSquareResult {
        behavior,
        statistic: test.statistic,
        dof: test.dof,
        p_value: test.p_value,
    })
}

pub fn behavior_counts(summaries: &[StudentSummary]) -> Vec<BehaviorCount> {
    Behavior::COUNT_ORDER
        .into_iter()
        .map(|behavior| BehaviorCount {
            behavior,
            students: summaries.iter().filter(|s| s.flags.get(behavior)).count(),
        })
        .collect()
}
