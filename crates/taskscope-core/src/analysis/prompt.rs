//! Prompt construction.

/// Instruction sent as the system prompt. Embeds the workshop's domain labels
/// and the exact task schema the parser expects back.
pub fn system_prompt(domains: &[String]) -> String {
    let domain_list = if domains.is_empty() {
        "(none declared; use \"other\")".to_string()
    } else {
        domains
            .iter()
            .map(|d| format!("- {}", d))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You analyze workplace documents and identify discrete, repeatable work tasks.

Categories (every task's "category" must be exactly one of these):
{domain_list}

Respond with a JSON array only, no prose. Each element:
{{
  "title": string,
  "description": string,
  "timeSpent": number (hours per occurrence, greater than 0),
  "frequency": "daily" | "weekly" | "monthly",
  "automation": "high" | "medium" | "low",
  "automationMethod": string (how the task could be automated),
  "category": string
}}

Only include tasks that recur. Return [] if the document describes none."#
    )
}

/// Wrap the document excerpt as the user message
pub fn user_prompt(excerpt: &str) -> String {
    format!("Identify the repeatable tasks in this document:\n\n{}", excerpt)
}

/// The first `max_chars` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
