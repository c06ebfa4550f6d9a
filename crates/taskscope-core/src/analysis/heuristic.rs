//! Keyword heuristics used when no provider credential is configured.
//!
//! Item lines are numbered (`1.`, `2)`) or glyph-bulleted; dash lines under an
//! item are details. Duration and frequency are read from the item and the
//! few lines that follow it; automation potential from the title only.

use std::sync::LazyLock;

use regex::Regex;

use super::parse::fallback_category;
use crate::types::{AutomationLevel, TaskDraft, TaskFrequency};

static ITEM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d{1,3}[.)]|[•●▪■□○◦*])\s*([^\d\s].*)$")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(시간|분|hours?|hrs?|minutes?|mins?|h\b)")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

const FREQUENCY_KEYWORDS: &[(TaskFrequency, &[&str])] = &[
    (
        TaskFrequency::Daily,
        &["매일", "일일", "날마다", "daily", "every day", "each day"],
    ),
    (
        TaskFrequency::Weekly,
        &["매주", "주간", "주 1회", "weekly", "every week", "each week"],
    ),
    (
        TaskFrequency::Monthly,
        &["매월", "월간", "매달", "monthly", "every month", "each month"],
    ),
];

const AUTOMATION_RULES: &[(AutomationLevel, &[&str], &str)] = &[
    (
        AutomationLevel::High,
        &[
            "보고서", "데이터", "정리", "집계", "report", "data", "spreadsheet", "summar",
            "invoice", "reconcil",
        ],
        "Scripted report generation from spreadsheet data",
    ),
    (
        AutomationLevel::Medium,
        &[
            "문의", "응답", "상담", "inquir", "question", "respond", "response", "support",
            "email",
        ],
        "Chatbot with templated responses",
    ),
    (
        AutomationLevel::Low,
        &["회의", "미팅", "meeting"],
        "Meeting transcription with automatic minutes",
    ),
];

const DEFAULT_AUTOMATION_METHOD: &str = "Workflow automation (RPA)";

/// Tuning knobs for the heuristic extractor
#[derive(Debug, Clone)]
pub struct HeuristicConfig {
    /// Lines after an item scanned for details (default: 4)
    pub lookahead_lines: usize,
    /// Lower bound on hours per occurrence (default: 0.5)
    pub min_hours: f64,
    /// Hours assumed when none are stated (default: 1.0)
    pub default_hours: f64,
    /// Frequency assumed when none is stated (default: weekly)
    pub default_frequency: TaskFrequency,
    /// Description length cap in characters (default: 200)
    pub max_description_chars: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            lookahead_lines: 4,
            min_hours: 0.5,
            default_hours: 1.0,
            default_frequency: TaskFrequency::Weekly,
            max_description_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor {
    config: HeuristicConfig,
}

impl HeuristicExtractor {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    /// Extract tasks from document text. Never returns an empty list: a
    /// document with no recognizable items yields two sample tasks.
    pub fn extract(&self, text: &str, domains: &[String]) -> Vec<TaskDraft> {
        let lines: Vec<&str> = text.lines().collect();
        let mut drafts = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = ITEM_LINE.captures(line) else {
                continue;
            };
            let title = caps[1].trim();
            if title.is_empty() {
                continue;
            }

            let mut block = vec![title];
            let mut details = Vec::new();
            for next in lines.iter().skip(i + 1).take(self.config.lookahead_lines) {
                if ITEM_LINE.is_match(next) {
                    break;
                }
                let next = next.trim();
                if let Some(detail) = next.strip_prefix('-') {
                    let detail = detail.trim();
                    if !detail.is_empty() {
                        details.push(detail);
                    }
                }
                block.push(next);
            }

            drafts.push(self.build(title, &block, &details, domains));
        }

        if drafts.is_empty() {
            return sample_tasks(domains);
        }
        drafts
    }

    fn build(&self, title: &str, block: &[&str], details: &[&str], domains: &[String]) -> TaskDraft {
        let haystack = block.join("\n").to_lowercase();

        let hours = block
            .iter()
            .find_map(|l| parse_hours(l))
            .unwrap_or(self.config.default_hours)
            .max(self.config.min_hours);

        let frequency = detect_frequency(&haystack).unwrap_or(self.config.default_frequency);

        // Automation potential follows the title alone
        let title_lower = title.to_lowercase();
        let (automation, method) = AUTOMATION_RULES
            .iter()
            .find(|(_, keywords, _)| keywords.iter().any(|k| title_lower.contains(k)))
            .map(|(level, _, method)| (*level, *method))
            .unwrap_or((AutomationLevel::Medium, DEFAULT_AUTOMATION_METHOD));

        let description = if details.is_empty() {
            title.to_string()
        } else {
            details.join(" ")
        };

        let category = domains
            .iter()
            .find(|d| !d.trim().is_empty() && haystack.contains(&d.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| fallback_category(domains));

        TaskDraft {
            title: title.to_string(),
            description: description
                .chars()
                .take(self.config.max_description_chars)
                .collect(),
            time_spent: hours,
            frequency,
            automation,
            automation_method: method.to_string(),
            category,
        }
    }
}

/// First duration in a line, in hours
fn parse_hours(line: &str) -> Option<f64> {
    let caps = DURATION.captures(line)?;
    let amount: f64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();
    let hours = if unit == "분" || unit.starts_with("min") {
        amount / 60.0
    } else {
        amount
    };
    (hours.is_finite() && hours > 0.0).then_some(hours)
}

/// The frequency whose keyword appears earliest
fn detect_frequency(haystack: &str) -> Option<TaskFrequency> {
    FREQUENCY_KEYWORDS
        .iter()
        .filter_map(|(freq, keywords)| {
            keywords
                .iter()
                .filter_map(|k| haystack.find(k))
                .min()
                .map(|pos| (pos, *freq))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, freq)| freq)
}

/// Placeholder tasks for documents without recognizable items
fn sample_tasks(domains: &[String]) -> Vec<TaskDraft> {
    let category = fallback_category(domains);
    vec![
        TaskDraft {
            title: "Daily report writing".into(),
            description: "Compile the day's work results into a status report".into(),
            time_spent: 0.5,
            frequency: TaskFrequency::Daily,
            automation: AutomationLevel::High,
            automation_method: "Scripted report generation from spreadsheet data".into(),
            category: category.clone(),
        },
        TaskDraft {
            title: "Customer inquiry response".into(),
            description: "Answer recurring customer questions by email and phone".into(),
            time_spent: 1.5,
            frequency: TaskFrequency::Daily,
            automation: AutomationLevel::Medium,
            automation_method: "Chatbot with templated responses".into(),
            category,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        vec!["Sales".into(), "Finance".into()]
    }

    #[test]
    fn test_weekly_report_scenario() {
        let tasks = HeuristicExtractor::default()
            .extract("1. Weekly report\n- takes 30 minutes\n매주 작성", &domains());

        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.title, "Weekly report");
        assert_eq!(task.frequency, TaskFrequency::Weekly);
        assert_eq!(task.time_spent, 0.5);
        assert!(domains().contains(&task.category));
        assert_eq!(task.description, "takes 30 minutes");
        assert_eq!(task.automation, AutomationLevel::High);
    }

    #[test]
    fn test_no_items_yields_two_samples() {
        let tasks = HeuristicExtractor::default()
            .extract("Just a paragraph of prose.\nNothing enumerated here.", &domains());
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Daily report writing");
        assert!(tasks.iter().all(|t| t.category == "Sales"));

        assert_eq!(HeuristicExtractor::default().extract("", &[]).len(), 2);
    }

    #[test]
    fn test_korean_items_and_bullets() {
        let text = "• 고객 문의 응답\n- 하루 2시간\n매일\n● 월간 회의 준비\n- 90분";
        let tasks = HeuristicExtractor::default().extract(text, &domains());

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].frequency, TaskFrequency::Daily);
        assert_eq!(tasks[0].time_spent, 2.0);
        assert_eq!(tasks[0].automation, AutomationLevel::Medium);
        assert_eq!(tasks[1].frequency, TaskFrequency::Monthly);
        assert_eq!(tasks[1].time_spent, 1.5);
        assert_eq!(tasks[1].automation, AutomationLevel::Low);
    }

    #[test]
    fn test_lookahead_stops_at_next_item() {
        let text = "1. Invoice matching\n2. Daily standup meeting\n- 15 min";
        let tasks = HeuristicExtractor::default().extract(text, &domains());

        assert_eq!(tasks.len(), 2);
        // The "15 min" line belongs to the second item only
        assert_eq!(tasks[0].time_spent, 1.0);
        assert_eq!(tasks[0].frequency, TaskFrequency::Weekly);
        assert_eq!(tasks[1].time_spent, 0.5);
        assert_eq!(tasks[1].frequency, TaskFrequency::Daily);
    }

    #[test]
    fn test_automation_follows_title_not_details() {
        let tasks = HeuristicExtractor::default()
            .extract("1. Weekly team meeting\n- review sales data", &["Sales".to_string()]);

        assert_eq!(tasks[0].automation, AutomationLevel::Low);
        assert_eq!(
            tasks[0].automation_method,
            "Meeting transcription with automatic minutes"
        );
        assert_eq!(tasks[0].category, "Sales");

        let tasks = HeuristicExtractor::default()
            .extract("1. Vendor onboarding\n- answer supplier email", &domains());
        assert_eq!(tasks[0].automation, AutomationLevel::Medium);
        assert_eq!(tasks[0].automation_method, DEFAULT_AUTOMATION_METHOD);
    }

    #[test]
    fn test_category_from_mentioned_domain() {
        let text = "1) Month-end close for Finance\n- 3 hours monthly";
        let tasks = HeuristicExtractor::default().extract(text, &domains());
        assert_eq!(tasks[0].category, "Finance");
        assert_eq!(tasks[0].time_spent, 3.0);
        assert_eq!(tasks[0].frequency, TaskFrequency::Monthly);
    }

    #[test]
    fn test_numbers_are_not_items() {
        let tasks = HeuristicExtractor::default().extract("10.5 hours total\n2024. year", &domains());
        // Falls through to the samples
        assert_eq!(tasks[0].title, "Daily report writing");
    }

    #[test]
    fn test_description_is_capped() {
        let long = format!("1. Data entry\n- {}", "x".repeat(500));
        let tasks = HeuristicExtractor::default().extract(&long, &domains());
        assert_eq!(tasks[0].description.chars().count(), 200);
    }

    #[test]
    fn test_parse_hours_units() {
        assert_eq!(parse_hours("takes 45 mins"), Some(0.75));
        assert_eq!(parse_hours("about 2 hrs"), Some(2.0));
        assert_eq!(parse_hours("1.5시간 소요"), Some(1.5));
        assert_eq!(parse_hours("3 h"), Some(3.0));
        assert_eq!(parse_hours("5 higher"), None);
        assert_eq!(parse_hours("no time"), None);
    }
}
