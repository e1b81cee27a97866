// src/utils/log.rs

//! Run report formatting on top of the `log` facade.
//!
//! Library code logs plain messages with `log::info!` and friends. These
//! helpers add the framed headers, numbered steps and summaries printed
//! around a collection or enrich run.

const RULE_WIDTH: usize = 60;

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("{}", format_step(step_num, total, message));
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a separator line
pub fn separator() {
    log::info!("{}", "─".repeat(RULE_WIDTH));
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {title}");
    for (key, value) in items {
        log::info!("    {key}: {value}");
    }
}

fn format_step(step_num: usize, total: usize, message: &str) -> String {
    format!("[STEP {step_num}/{total}] {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_step() {
        assert_eq!(format_step(2, 5, "rule 'a'"), "[STEP 2/5] rule 'a'");
    }
}
