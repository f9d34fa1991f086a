//! CLI output formatting utilities.

use crate::services::ServiceHealth;
use crate::vector_store::SearchResult;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// One line per probed service.
    pub fn health(health: &ServiceHealth) {
        match &health.failure {
            None => println!(
                "  {} {} - {}",
                style("✓").green(),
                style(&health.name).bold(),
                style(&health.url).dim()
            ),
            Some(reason) => {
                println!(
                    "  {} {} - {}",
                    style("✗").red(),
                    style(&health.name).bold(),
                    style(&health.url).dim()
                );
                println!("    {} {}", style("→").dim(), style(reason).dim());
            }
        }
    }

    /// A retrieved chunk with its source and relevance.
    pub fn search_result(result: &SearchResult) {
        let meta = &result.metadata;
        let date = meta.date.map(|d| format!(", {}", d)).unwrap_or_default();
        println!(
            "\n{} {} [{}/{}{}] (score: {:.2})",
            style(">>").green(),
            style(&meta.filename).bold(),
            meta.chunk_index + 1,
            meta.total_chunks,
            date,
            result.relevance_score()
        );
        println!("   {}", content_preview(&result.document, 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Single-line preview of at most `max_chars` characters.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("a\nb", 10), "a b");
        assert_eq!(content_preview("abcdef", 3), "abc...");
        assert_eq!(content_preview("ääää", 2), "ää...");
    }
}
