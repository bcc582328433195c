use clap::ValueEnum;
use serde::Serialize;

use crate::models::{StudentActivity, StudentProfile, ZScores};

/// What a z-score becomes when the column has no spread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariance {
    /// Every z-score is 0.
    #[default]
    Zero,
    /// Keep the raw 0/0 division, which yields NaN.
    Undefined,
}

/// Population mean and standard deviation (divisor N) of the present values.
pub fn population_moments(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// True when every present value equals the first one. Checked on the raw
/// values since rounding in the mean can leave a constant column with a
/// tiny non-zero σ.
fn is_constant(values: &[Option<f64>]) -> bool {
    let mut present = values.iter().flatten().filter(|v| !v.is_nan());
    match present.next() {
        Some(first) => present.all(|v| v == first),
        None => true,
    }
}

/// `(value - mean) / std_pop` for every entry; missing entries stay NaN.
pub fn zscores(values: &[Option<f64>], policy: ZeroVariance) -> Vec<f64> {
    let Some((mean, std)) = population_moments(values) else {
        return vec![f64::NAN; values.len()];
    };
    let constant = is_constant(values);

    values
        .iter()
        .map(|value| match value {
            Some(v) if !v.is_nan() => match (constant, policy) {
                (true, ZeroVariance::Zero) => 0.0,
                (true, ZeroVariance::Undefined) => f64::NAN,
                (false, _) => (v - mean) / std,
            },
            _ => f64::NAN,
        })
        .collect()
}

/// Z-scores of active days, total hours and points, one per student, in
/// input order.
pub fn standardize(
    students: &[(&StudentProfile, &StudentActivity)],
    policy: ZeroVariance,
) -> Vec<ZScores> {
    let days: Vec<Option<f64>> = students
        .iter()
        .map(|(_, activity)| Some(activity.active_days as f64))
        .collect();
    let hours: Vec<Option<f64>> = students
        .iter()
        .map(|(_, activity)| Some(activity.total_hours))
        .collect();
    let points: Vec<Option<f64>> = students.iter().map(|(profile, _)| profile.points).collect();

    let days = zscores(&days, policy);
    let hours = zscores(&hours, policy);
    let points = zscores(&points, policy);

    days.into_iter()
        .zip(hours)
        .zip(points)
        .map(|((days, hours), points)| ZScores { days, hours, points })
        .collect()
}
