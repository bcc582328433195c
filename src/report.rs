use std::fmt::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::models::{BehaviorCount, ChiSquareResult, KruskalResult, StageCount, StudentProfile};
use crate::standardize::ZeroVariance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Everything a run produced. Sections a subcommand did not compute stay
/// empty and are skipped when rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub zero_variance: ZeroVariance,
    pub stages: Vec<StageCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub head: Vec<StudentProfile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kruskal: Vec<KruskalResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classified_students: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub behavior_counts: Vec<BehaviorCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chi_square: Vec<ChiSquareResult>,
}

pub fn render(report: &AnalysisReport, format: Format) -> anyhow::Result<String> {
    match format {
        Format::Text => Ok(build_text(report)),
        Format::Json => {
            let mut json = serde_json::to_string_pretty(report)?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn number(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => "NaN".to_string(),
    }
}

fn text(value: Option<&str>) -> &str {
    value.unwrap_or("NaN")
}

pub fn build_text(report: &AnalysisReport) -> String {
    let mut output = String::new();

    if !report.stages.is_empty() {
        let _ = writeln!(output, "## Row Counts");
        for stage in &report.stages {
            let _ = writeln!(output, "- {}: {}", stage.stage, stage.rows);
        }
        let _ = writeln!(output);
    }

    if !report.head.is_empty() {
        let _ = writeln!(output, "## Student Profiles (head)");
        let _ = writeln!(
            output,
            "{:<40} {:>10} {:>10} {:<16} {:<12} {:>9}",
            "uuid", "points", "badges_cnt", "user_city", "stage", "accuracy"
        );
        for profile in &report.head {
            let _ = writeln!(
                output,
                "{:<40} {:>10} {:>10} {:<16} {:<12} {:>9.6}",
                profile.uuid,
                number(profile.points),
                number(profile.badges_cnt),
                text(profile.user_city.as_deref()),
                text(profile.learning_stage.as_deref()),
                profile.accuracy
            );
        }
        let _ = writeln!(output);
    }

    if let Some(students) = report.students {
        let _ = writeln!(output, "Aggregated students: {students}");
        let _ = writeln!(output);
    }

    if !report.kruskal.is_empty() {
        let _ = writeln!(output, "## Kruskal-Wallis by City");
        for result in &report.kruskal {
            let _ = writeln!(
                output,
                "{}: H = {:.3}, p = {:.25}",
                result.metric.column(),
                result.statistic,
                result.p_value
            );
        }
        let _ = writeln!(output);
    }

    if let Some(students) = report.classified_students {
        let _ = writeln!(
            output,
            "Students with activity metrics: {students} (zero variance: {:?})",
            report.zero_variance
        );
        let _ = writeln!(output);
    }

    if !report.behavior_counts.is_empty() {
        let _ = writeln!(output, "## Behavior Types");
        for count in &report.behavior_counts {
            let _ = writeln!(output, "{} : {}", count.behavior.column(), count.students);
        }
        let _ = writeln!(output);
    }

    if !report.chi_square.is_empty() {
        let _ = writeln!(output, "## City x Behavior (chi-square)");
        for result in &report.chi_square {
            let _ = writeln!(output);
            let _ = writeln!(output, "=== {} ===", result.behavior.column());
            let _ = writeln!(output, "Chi-square = {:?}", result.statistic);
            let _ = writeln!(output, "df = {}", result.dof);
            let _ = writeln!(output, "p-value = {:?}", result.p_value);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Behavior, Metric};

    fn sample() -> AnalysisReport {
        AnalysisReport {
            stages: vec![
                StageCount {
                    stage: "joined".to_string(),
                    rows: 12,
                },
                StageCount {
                    stage: "badges_cnt >= 1".to_string(),
                    rows: 9,
                },
            ],
            students: Some(3),
            head: vec![StudentProfile {
                uuid: "u1".to_string(),
                points: Some(120.0),
                badges_cnt: None,
                user_city: Some("Taipei".to_string()),
                learning_stage: None,
                accuracy: 0.5,
            }],
            kruskal: vec![KruskalResult {
                metric: Metric::Points,
                groups: 2,
                statistic: 0.272_727,
                p_value: 0.6015,
            }],
            classified_students: Some(3),
            behavior_counts: vec![BehaviorCount {
                behavior: Behavior::Stable,
                students: 2,
            }],
            chi_square: vec![ChiSquareResult {
                behavior: Behavior::Burst,
                statistic: 0.0,
                dof: 0,
                p_value: 1.0,
            }],
            ..AnalysisReport::default()
        }
    }

    #[test]
    fn text_report_has_every_section() {
        let text = build_text(&sample());
        assert!(text.contains("- joined: 12"));
        assert!(text.contains("- badges_cnt >= 1: 9"));
        assert!(text.contains("Taipei"));
        assert!(text.contains("points: H = 0.273, p = 0.6015000000000000346389584"));
        assert!(text.contains("stable_type : 2"));
        assert!(text.contains("=== burst_type ==="));
        assert!(text.contains("df = 0"));
        assert!(text.contains("Chi-square = 0.0\n"));
        assert!(text.contains("p-value = 1.0\n"));
    }

    #[test]
    fn empty_sections_are_skipped() {
        let report = AnalysisReport {
            stages: sample().stages,
            ..AnalysisReport::default()
        };
        let text = build_text(&report);
        assert!(!text.contains("Kruskal"));
        assert!(!text.contains("Behavior Types"));
    }

    #[test]
    fn json_report_round_trips_through_serde() {
        let json = render(&sample(), Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["zero_variance"], "zero");
        assert_eq!(value["kruskal"][0]["metric"], "points");
        assert_eq!(value["chi_square"][0]["behavior"], "burst");
        assert_eq!(value["head"][0]["badges_cnt"], serde_json::Value::Null);
    }
}
