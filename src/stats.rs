//! Rank and contingency-table hypothesis tests.

use anyhow::{bail, Context};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Upper-tail probability of a chi-square statistic.
fn chi2_sf(statistic: f64, dof: f64) -> anyhow::Result<f64> {
    if statistic.is_nan() {
        return Ok(f64::NAN);
    }
    let dist = ChiSquared::new(dof).context("invalid chi-square degrees of freedom")?;
    Ok(dist.sf(statistic))
}

/// 1-based ranks with ties sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = rank;
        }
        start = end;
    }

    ranks
}

/// Sum of `t^3 - t` over every run of tied values.
fn tie_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut sum = 0.0;
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        let t = (end - start) as f64;
        sum += t * t * t - t;
        start = end;
    }
    sum
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HTest {
    pub statistic: f64,
    pub p_value: f64,
}

/// Kruskal-Wallis H-test with tie correction.
///
/// Requires at least two non-empty groups and at least two distinct values
/// across them.
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> anyhow::Result<HTest> {
    if groups.len() < 2 {
        bail!("Kruskal-Wallis needs at least two groups, got {}", groups.len());
    }
    if groups.iter().any(Vec::is_empty) {
        bail!("Kruskal-Wallis groups must not be empty");
    }

    let pooled: Vec<f64> = groups.iter().flatten().copied().collect();
    let ranks = average_ranks(&pooled);
    let n = pooled.len() as f64;

    let mut offset = 0;
    let mut weighted = 0.0;
    for group in groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        weighted += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }

    let correction = 1.0 - tie_sum(&pooled) / (n * n * n - n);
    if correction == 0.0 {
        bail!("all numbers are identical in Kruskal-Wallis input");
    }
    let h = 12.0 / (n * (n + 1.0)) * weighted - 3.0 * (n + 1.0);
    let statistic = h / correction;
    let p_value = chi2_sf(statistic, (groups.len() - 1) as f64)?;

    Ok(HTest { statistic, p_value })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquareTest {
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
}

/// Pearson chi-square test of independence on an r×c table of counts.
///
/// With one degree of freedom the Yates continuity correction is applied.
/// With none (a single row or column) the statistic is 0 and p is 1.
pub fn chi2_contingency(observed: &[Vec<f64>]) -> anyhow::Result<ChiSquareTest> {
    let rows = observed.len();
    let cols = observed.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        bail!("contingency table is empty");
    }
    if observed.iter().any(|row| row.len() != cols) {
        bail!("contingency table rows have different lengths");
    }
    if observed.iter().flatten().any(|&count| count < 0.0) {
        bail!("contingency table has negative counts");
    }

    let row_sums: Vec<f64> = observed.iter().map(|row| row.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..cols)
        .map(|c| observed.iter().map(|row| row[c]).sum())
        .collect();
    let total: f64 = row_sums.iter().sum();
    if total == 0.0 {
        bail!("contingency table has no observations");
    }

    let expected: Vec<Vec<f64>> = row_sums
        .iter()
        .map(|r| col_sums.iter().map(|c| r * c / total).collect())
        .collect();
    if expected.iter().flatten().any(|&e| e == 0.0) {
        bail!("contingency table has a zero expected frequency");
    }

    let dof = (rows - 1) * (cols - 1);
    if dof == 0 {
        return Ok(ChiSquareTest {
            statistic: 0.0,
            dof,
            p_value: 1.0,
        });
    }

    let mut statistic = 0.0;
    for (obs_row, exp_row) in observed.iter().zip(&expected) {
        for (&obs, &exp) in obs_row.iter().zip(exp_row) {
            let obs = if dof == 1 {
                let diff = exp - obs;
                obs + diff.signum() * diff.abs().min(0.5)
            } else {
                obs
            };
            statistic += (obs - exp).powi(2) / exp;
        }
    }

    let p_value = chi2_sf(statistic, dof as f64)?;
    Ok(ChiSquareTest {
        statistic,
        dof,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn kruskal_without_ties() {
        let groups = vec![vec![1.0, 3.0, 5.0, 7.0, 9.0], vec![2.0, 4.0, 6.0, 8.0, 10.0]];
        let result = kruskal_wallis(&groups).unwrap();
        assert!(close(result.statistic, 0.272_727_272_727_27, 1e-10));
        assert!(close(result.p_value, 0.601_508_134_440_589_5, 1e-9));
    }

    #[test]
    fn kruskal_with_tie_correction() {
        let groups = vec![vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0], vec![2.0, 2.0]];
        let result = kruskal_wallis(&groups).unwrap();
        assert!(close(result.statistic, 7.0, 1e-10));
        assert!(close(result.p_value, (-3.5f64).exp(), 1e-9));
    }

    #[test]
    fn kruskal_all_tied_is_an_error() {
        let err = kruskal_wallis(&[vec![4.0, 4.0], vec![4.0, 4.0]]).unwrap_err();
        assert!(err.to_string().contains("identical"));
    }

    #[test]
    fn kruskal_rejects_single_group() {
        assert!(kruskal_wallis(&[vec![1.0, 2.0]]).is_err());
        assert!(kruskal_wallis(&[]).is_err());
    }

    #[test]
    fn chi_square_two_by_two_uses_yates() {
        let result = chi2_contingency(&[vec![10.0, 20.0], vec![20.0, 10.0]]).unwrap();
        assert_eq!(result.dof, 1);
        assert!(close(result.statistic, 5.4, 1e-12));
        assert!(result.p_value > 0.0201 && result.p_value < 0.0202);
    }

    #[test]
    fn chi_square_larger_table_is_uncorrected() {
        let table = [vec![10.0, 10.0], vec![20.0, 5.0], vec![5.0, 20.0]];
        let result = chi2_contingency(&table).unwrap();
        assert_eq!(result.dof, 2);
        assert!(close(result.statistic, 18.0, 1e-10));
        assert!(close(result.p_value, (-9.0f64).exp(), 1e-12));
    }

    #[test]
    fn chi_square_constant_flag_is_finite() {
        let result = chi2_contingency(&[vec![4.0], vec![7.0], vec![1.0]]).unwrap();
        assert_eq!(result.dof, 0);
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn chi_square_rejects_empty_table() {
        assert!(chi2_contingency(&[]).is_err());
        assert!(chi2_contingency(&[vec![0.0, 0.0], vec![0.0, 0.0]]).is_err());
    }
}
