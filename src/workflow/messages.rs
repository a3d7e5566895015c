//! Suggested-message templates and the cleaner every generated text passes through.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::WorkflowCase;

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid link regex"));

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(.+?)\*\*|__(.+?)__|\*([^*\n]+)\*|\b_([^_\n]+)_\b|`([^`\n]+)`")
        .expect("valid emphasis regex")
});

static LINE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]+|>[ \t]?)").expect("valid line regex"));

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:nachricht|vorschlag|antwort|betreff|text|message|suggested message|suggestion|reply|draft|whatsapp|email|e-mail)\s*:\s*",
    )
    .expect("valid prefix regex")
});

const QUOTES: &[char] = &['"', '\'', '„', '“', '”', '«', '»'];

/// Strip markdown, label prefixes like `Nachricht:` and wrapping quotes.
///
/// Untrusted model output and CRM drafts both go through here before they
/// reach the queue or a channel.
pub fn clean_message(raw: &str) -> String {
    let text = LINK.replace_all(raw, "$1");
    let text = EMPHASIS.replace_all(&text, |caps: &regex::Captures| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    let text = LINE_MARKUP.replace_all(&text, "");

    let mut text = text.trim().to_string();
    // Labels can be stacked ("Vorschlag: Nachricht: ...")
    while let Some(m) = LABEL_PREFIX.find(&text) {
        text = text[m.end()..].trim_start().to_string();
    }

    let trimmed = text.trim();
    let unquoted = match (trimmed.chars().next(), trimmed.chars().last()) {
        (Some(first), Some(last)) if trimmed.chars().count() > 1
            && QUOTES.contains(&first)
            && QUOTES.contains(&last) =>
        {
            trimmed
                .trim_start_matches(QUOTES)
                .trim_end_matches(QUOTES)
        }
        _ => trimmed,
    };
    unquoted.trim().to_string()
}

/// Clean an optional draft; blank results become `None`
pub fn clean_optional(raw: Option<&str>) -> Option<String> {
    raw.map(clean_message).filter(|m| !m.is_empty())
}

/// Default message per case, with `{name}` substituted
pub fn template_for(case: WorkflowCase, first_name: &str) -> Option<String> {
    let template = match case {
        WorkflowCase::Closed | WorkflowCase::Waiting => return None,
        WorkflowCase::HotLead => {
            "Hi {name}, do you have a few minutes today? I'd love to go through the next steps with you."
        }
        WorkflowCase::ResponseReceived => "Hi {name}, thanks for getting back to me!",
        WorkflowCase::FollowupDue => {
            "Hi {name}, just following up on our last conversation. Any thoughts so far?"
        }
        WorkflowCase::GoneCold => {
            "Hi {name}, it's been a while! How are things going on your side?"
        }
        WorkflowCase::Qualified => {
            "Hi {name}, shall we book a short call this week to talk details?"
        }
        WorkflowCase::NewLead => "Hi {name}, nice to connect! What caught your interest?",
    };

    let name = first_name.trim();
    let message = if name.is_empty() {
        template.replace(" {name}", "")
    } else {
        template.replace("{name}", name)
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markdown() {
        assert_eq!(clean_message("**Hi Anna**, how are you?"), "Hi Anna, how are you?");
        assert_eq!(clean_message("## Hello\n> quoted"), "Hello\nquoted");
        assert_eq!(clean_message("See [our offer](https://x.y)"), "See our offer");
        assert_eq!(clean_message("Use `code` and *stress*"), "Use code and stress");
    }

    #[test]
    fn test_emphasis_delimiters_must_pair() {
        assert_eq!(clean_message("__Hi__ Anna"), "Hi Anna");
        assert_eq!(clean_message("see you _soon_!"), "see you soon!");
        assert_eq!(clean_message("**x__ stays"), "**x__ stays");
        assert_eq!(clean_message("template first_name_here"), "template first_name_here");
    }

    #[test]
    fn test_strips_prefixes_and_quotes() {
        assert_eq!(clean_message("Nachricht: Hallo Anna!"), "Hallo Anna!");
        assert_eq!(clean_message("  Vorschlag: Nachricht: \"Hallo\"  "), "Hallo");
        assert_eq!(clean_message("Suggested message: Hi there"), "Hi there");
        assert_eq!(clean_message("„Guten Tag“"), "Guten Tag");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(clean_message("Hi Anna, 2*3 = 6"), "Hi Anna, 2*3 = 6");
        assert_eq!(clean_optional(Some("  ")), None);
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_templates_substitute_name() {
        let msg = template_for(WorkflowCase::NewLead, "Anna").unwrap();
        assert!(msg.starts_with("Hi Anna,"));
        let anonymous = template_for(WorkflowCase::NewLead, "").unwrap();
        assert!(anonymous.starts_with("Hi,"));
        assert!(template_for(WorkflowCase::Closed, "Anna").is_none());
    }
}
