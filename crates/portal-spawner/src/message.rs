/// Turns `skill` + `task` into the single message text the graph executor
/// sees. If `task` already opens with a skill invocation, it is passed
/// through unchanged instead of being double-prefixed.
pub fn build_task_message(skill: &str, task: &str, context: Option<&serde_json::Value>) -> String {
    let mut message = if task.trim_start().starts_with('/') {
        task.to_string()
    } else {
        format!("/{skill} {task}")
    };

    if let Some(ctx) = context {
        message.push_str(&format!("\n\nContext:\n{}", serde_json::to_string_pretty(ctx).unwrap_or_default()));
    }

    message
}

/// `email-triage` -> `Email Triage`.
pub fn title_case(skill: &str) -> String {
    skill
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const PREVIEW_CHARS: usize = 120;

/// Truncates to at most 120 characters, char-safe, suffixing `...` only
/// when the content was actually cut.
pub fn truncate_preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_task_message_prefixes_skill() {
        assert_eq!(build_task_message("email-triage", "clear my inbox", None), "/email-triage clear my inbox");
    }

    #[test]
    fn build_task_message_passes_through_existing_slash_command() {
        assert_eq!(build_task_message("email-triage", "/other-skill do it", None), "/other-skill do it");
    }

    #[test]
    fn build_task_message_appends_context_block() {
        let msg = build_task_message("x", "task", Some(&json!({"k": "v"})));
        assert!(msg.contains("Context:"));
        assert!(msg.contains("\"k\""));
    }

    #[test]
    fn title_case_splits_on_hyphen_and_underscore() {
        assert_eq!(title_case("email-triage"), "Email Triage");
        assert_eq!(title_case("daily_planner"), "Daily Planner");
    }

    #[test]
    fn truncate_preview_leaves_short_text_whole() {
        assert_eq!(truncate_preview("short"), "short");
    }

    #[test]
    fn truncate_preview_cuts_and_suffixes_long_text() {
        let long = "x".repeat(200);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn truncate_preview_is_char_safe() {
        let multibyte = "🎉".repeat(130);
        let preview = truncate_preview(&multibyte);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
    }
}
