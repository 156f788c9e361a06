//! Analysis report model

use crate::extract::StructuredMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

pub const NO_RECOMMENDATION: &str = "No recommendation available.";
const DEFAULT_ESTIMATED_MINUTES: u32 = 60;
const DISPLAYED_ISSUES: usize = 10;
const QUICK_WINS: usize = 3;
const MAJOR_REFACTORS: usize = 5;

/// Keys an analysis mapping must carry once aliases are resolved
pub const ANALYSIS_REQUIRED_KEYS: &[&str] = &[
    "target_filename",
    "detected_issues",
    "detected_patterns",
    "recommendation",
];

pub(crate) const ANALYSIS_KEY_ALIASES: &[(&str, &str)] = &[
    ("filename", "target_filename"),
    ("issues", "detected_issues"),
    ("patterns", "detected_patterns"),
    ("estimated_refactor_time_minutes", "estimated_minutes"),
];

/// Renames alias keys to their canonical names.
///
/// A canonical key already present wins over its alias.
pub(crate) fn canonicalize_keys(map: &mut StructuredMap, aliases: &[(&str, &str)]) {
    for (alias, canonical) in aliases {
        if let Some(value) = map.remove(*alias) {
            if !map.contains_key(*canonical) {
                map.insert(canonical.to_string(), value);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// Unknown severities are treated as MEDIUM
impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "LOW" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(alias = "type", default = "default_issue_kind")]
    pub kind: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(alias = "line_number", default, deserialize_with = "lenient_number")]
    pub line: Option<u32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

fn default_issue_kind() -> String {
    "UNKNOWN".to_string()
}

/// Structured result of analysing one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub target_filename: String,
    #[serde(default, deserialize_with = "lenient_issues")]
    pub detected_issues: Vec<Issue>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub detected_patterns: BTreeSet<String>,
    #[serde(default = "default_recommendation")]
    pub recommendation: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub difficulty_score: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub frameworks: BTreeSet<String>,
}

fn default_recommendation() -> String {
    NO_RECOMMENDATION.to_string()
}

impl AnalysisReport {
    /// Report used when analysis output is unusable or generation failed
    pub fn fallback(filename: &str) -> Self {
        Self {
            target_filename: filename.to_string(),
            detected_issues: vec![Issue {
                kind: "LEGACY_PATTERN".to_string(),
                severity: Severity::Medium,
                line: Some(1),
                description: "Legacy code pattern detected".to_string(),
                suggestion: "Modernize with Python 3.11+ features".to_string(),
            }],
            detected_patterns: ["outdated_imports", "synchronous_io"]
                .into_iter()
                .map(String::from)
                .collect(),
            recommendation:
                "Code is modernizable. Focus on async/await patterns and type hints.".to_string(),
            difficulty_score: Some(5),
            estimated_minutes: Some(30),
            frameworks: BTreeSet::new(),
        }
    }

    /// The fallback report as a mapping, for [`crate::extract::StructuredExtractor::extract`]
    pub fn fallback_map(filename: &str) -> StructuredMap {
        match serde_json::to_value(Self::fallback(filename)) {
            Ok(Value::Object(map)) => map,
            _ => StructuredMap::new(),
        }
    }

    /// Builds a report from a model mapping, resolving key aliases.
    ///
    /// An empty or missing filename is replaced by `filename`.
    pub fn from_map(mut map: StructuredMap, filename: &str) -> Result<Self, serde_json::Error> {
        canonicalize_keys(&mut map, ANALYSIS_KEY_ALIASES);
        let mut report: AnalysisReport = serde_json::from_value(Value::Object(map))?;
        if report.target_filename.trim().is_empty() {
            report.target_filename = filename.to_string();
        }
        if report.recommendation.trim().is_empty() {
            report.recommendation = default_recommendation();
        }
        Ok(report)
    }

    pub fn issue_count(&self) -> usize {
        self.detected_issues.len()
    }

    pub fn issues_by_severity(&self) -> Vec<(Severity, Vec<&Issue>)> {
        Severity::ALL
            .into_iter()
            .map(|severity| {
                let issues = self
                    .detected_issues
                    .iter()
                    .filter(|issue| issue.severity == severity)
                    .collect();
                (severity, issues)
            })
            .collect()
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.detected_issues
            .iter()
            .filter(move |issue| issue.severity == severity)
    }

    pub fn action_plan(&self) -> ActionPlan {
        let priority_steps = self
            .with_severity(Severity::Critical)
            .enumerate()
            .map(|(i, issue)| PlanStep {
                step: i + 1,
                kind: issue.kind.clone(),
                description: issue.description.clone(),
                action: issue.suggestion.clone(),
                effort: Severity::High,
            })
            .collect();

        let quick_wins = self
            .with_severity(Severity::Low)
            .take(QUICK_WINS)
            .cloned()
            .collect();

        let major_refactors = self
            .with_severity(Severity::High)
            .chain(self.with_severity(Severity::Medium))
            .take(MAJOR_REFACTORS)
            .cloned()
            .collect();

        ActionPlan {
            total_issues: self.issue_count(),
            estimated_minutes: self.estimated_minutes.unwrap_or(DEFAULT_ESTIMATED_MINUTES),
            priority_steps,
            quick_wins,
            major_refactors,
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "CODE MODERNIZATION AUDIT REPORT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "File: {}", self.target_filename)?;
        writeln!(f, "Total Issues: {}", self.issue_count())?;
        writeln!(
            f,
            "Est. Time: {} min",
            self.estimated_minutes.unwrap_or(DEFAULT_ESTIMATED_MINUTES)
        )?;
        writeln!(f)?;
        writeln!(f, "RECOMMENDATION:")?;
        writeln!(f, "{}", self.recommendation)?;
        writeln!(f)?;
        writeln!(f, "ISSUES FOUND:")?;
        for issue in self.detected_issues.iter().take(DISPLAYED_ISSUES) {
            writeln!(
                f,
                "  [{}] {}: {}",
                issue.severity, issue.kind, issue.description
            )?;
        }
        if self.issue_count() > DISPLAYED_ISSUES {
            writeln!(
                f,
                "  ... and {} more issues",
                self.issue_count() - DISPLAYED_ISSUES
            )?;
        }
        write!(f, "{}", rule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub step: usize,
    pub kind: String,
    pub description: String,
    pub action: String,
    pub effort: Severity,
}

/// Ordered remediation plan derived from an [`AnalysisReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    pub total_issues: usize,
    pub estimated_minutes: u32,
    pub priority_steps: Vec<PlanStep>,
    pub quick_wins: Vec<Issue>,
    pub major_refactors: Vec<Issue>,
}

/// Accepts integers, floats and numeric strings; anything else becomes `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Keeps the well-formed entries of an issue list and drops the rest.
fn lenient_issues<'de, D>(deserializer: D) -> Result<Vec<Issue>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Collects the non-blank strings of a list; a lone string counts as one entry.
pub(crate) fn lenient_strings<'de, D, C>(deserializer: D) -> Result<C, D::Error>
where
    D: Deserializer<'de>,
    C: FromIterator<String>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => std::iter::once(s).collect(),
        _ => std::iter::empty().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> StructuredMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn issue(kind: &str, severity: Severity) -> Issue {
        Issue {
            kind: kind.to_string(),
            severity,
            line: None,
            description: format!("{} found", kind),
            suggestion: format!("fix {}", kind),
        }
    }

    fn report_with(issues: Vec<Issue>) -> AnalysisReport {
        AnalysisReport {
            detected_issues: issues,
            ..AnalysisReport::fallback("app.py")
        }
    }

    #[test]
    fn test_from_map_accepts_aliases() {
        let report = AnalysisReport::from_map(
            map(json!({
                "filename": "legacy.py",
                "issues": [
                    {"type": "PRINT_STATEMENT", "severity": "high", "line_number": "3",
                     "description": "py2 print", "suggestion": "use print()"}
                ],
                "patterns": ["py2"],
                "recommendation": "Port it",
                "estimated_refactor_time_minutes": 45.0
            })),
            "ignored.py",
        )
        .unwrap();

        assert_eq!(report.target_filename, "legacy.py");
        assert_eq!(report.detected_issues[0].kind, "PRINT_STATEMENT");
        assert_eq!(report.detected_issues[0].severity, Severity::High);
        assert_eq!(report.detected_issues[0].line, Some(3));
        assert!(report.detected_patterns.contains("py2"));
        assert_eq!(report.estimated_minutes, Some(45));
    }

    #[test]
    fn test_from_map_fills_defaults() {
        let report = AnalysisReport::from_map(StructuredMap::new(), "main.py").unwrap();
        assert_eq!(report.target_filename, "main.py");
        assert!(report.detected_issues.is_empty());
        assert!(report.detected_patterns.is_empty());
        assert_eq!(report.recommendation, NO_RECOMMENDATION);
        assert_eq!(report.estimated_minutes, None);
    }

    #[test]
    fn test_malformed_issue_entries_dropped() {
        let report = AnalysisReport::from_map(
            map(json!({"detected_issues": ["not an issue", {"kind": "X", "severity": "bogus"}]})),
            "a.py",
        )
        .unwrap();
        assert_eq!(report.detected_issues.len(), 1);
        assert_eq!(report.detected_issues[0].severity, Severity::Medium);
    }

    #[test]
    fn test_canonical_key_wins_over_alias() {
        let mut m = map(json!({"filename": "alias.py", "target_filename": "canon.py"}));
        canonicalize_keys(&mut m, ANALYSIS_KEY_ALIASES);
        assert_eq!(m["target_filename"], "canon.py");
        assert!(!m.contains_key("filename"));
    }

    #[test]
    fn test_fallback_map_round_trips() {
        let report = AnalysisReport::from_map(AnalysisReport::fallback_map("x.py"), "x.py").unwrap();
        assert_eq!(report, AnalysisReport::fallback("x.py"));
    }

    #[test]
    fn test_issues_by_severity() {
        let report = report_with(vec![
            issue("A", Severity::Low),
            issue("B", Severity::Critical),
            issue("C", Severity::Low),
        ]);
        let buckets = report.issues_by_severity();
        assert_eq!(buckets[0].0, Severity::Critical);
        assert_eq!(buckets[0].1.len(), 1);
        assert_eq!(buckets[1].1.len(), 0);
        assert_eq!(buckets[3].1.len(), 2);
    }

    #[test]
    fn test_action_plan() {
        let mut issues = vec![
            issue("CRIT1", Severity::Critical),
            issue("CRIT2", Severity::Critical),
            issue("MED1", Severity::Medium),
        ];
        issues.extend((0..5).map(|i| issue(&format!("LOW{}", i), Severity::Low)));
        issues.extend((0..5).map(|i| issue(&format!("HIGH{}", i), Severity::High)));
        let mut report = report_with(issues);
        report.estimated_minutes = None;

        let plan = report.action_plan();
        assert_eq!(plan.total_issues, 13);
        assert_eq!(plan.estimated_minutes, 60);
        assert_eq!(plan.priority_steps.len(), 2);
        assert_eq!(plan.priority_steps[1].step, 2);
        assert_eq!(plan.priority_steps[1].action, "fix CRIT2");
        assert_eq!(plan.priority_steps[0].effort, Severity::High);
        assert_eq!(plan.quick_wins.len(), 3);
        assert_eq!(plan.major_refactors.len(), 5);
        assert!(plan.major_refactors.iter().all(|i| i.severity == Severity::High));
    }

    #[test]
    fn test_action_plan_mixes_medium_after_high() {
        let report = report_with(vec![
            issue("MED1", Severity::Medium),
            issue("HIGH1", Severity::High),
        ]);
        let kinds: Vec<_> = report
            .action_plan()
            .major_refactors
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(kinds, vec!["HIGH1", "MED1"]);
    }

    #[test]
    fn test_display_truncates_issue_list() {
        let report = report_with((0..12).map(|i| issue(&format!("K{}", i), Severity::Low)).collect());
        let text = report.to_string();
        assert!(text.contains("CODE MODERNIZATION AUDIT REPORT"));
        assert!(text.contains("Total Issues: 12"));
        assert!(text.contains("Est. Time: 30 min"));
        assert!(text.contains("  [LOW] K9: K9 found"));
        assert!(!text.contains("K10 found"));
        assert!(text.contains("  ... and 2 more issues"));
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Severity::Critical).unwrap(), "CRITICAL");
        let parsed: Severity = serde_json::from_value(json!("low")).unwrap();
        assert_eq!(parsed, Severity::Low);
    }
}
