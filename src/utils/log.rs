// src/utils/log.rs

//! Console report helpers for CLI runs.
//!
//! Everything is emitted through the `log` facade so the output follows the
//! subscriber configured at startup (plain or JSON).

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{}", border);
    ::log::info!("  {}", title);
    ::log::info!("{}", border);
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    ::log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    for line in summary_lines(title, items) {
        ::log::info!("{}", line);
    }
}

fn summary_lines(title: &str, items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    std::iter::once(format!("[SUMMARY] {}", title))
        .chain(
            items
                .iter()
                .map(|(key, value)| format!("    {:<width$} : {}", key, value, width = width)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_aligns_keys() {
        let lines = summary_lines(
            "Ingest",
            &[("pages", "3".to_string()), ("products", "2".to_string())],
        );
        assert_eq!(
            lines,
            vec![
                "[SUMMARY] Ingest".to_string(),
                "    pages    : 3".to_string(),
                "    products : 2".to_string(),
            ]
        );
    }

    #[test]
    fn summary_without_items_is_title_only() {
        assert_eq!(summary_lines("Empty", &[]), vec!["[SUMMARY] Empty".to_string()]);
    }
}
