use console::style;

use crate::types::Priority;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Aligned `label: value` line
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<22} {}", style(format!("{}:", label)).dim(), value);
    }

    /// Priority tag colored by urgency
    pub fn priority(&self, priority: Priority) -> String {
        let tag = format!("[{}]", priority.as_str());
        match priority {
            Priority::Critical => style(tag).red().bold().to_string(),
            Priority::High => style(tag).yellow().to_string(),
            Priority::Medium => style(tag).cyan().to_string(),
            Priority::Low => style(tag).dim().to_string(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
