//! `cronkeep check`: validate schedule patterns.

use cronkeep_cron::Pattern;

/// Print one line per pattern. Returns false if any pattern is invalid.
pub fn run_check(patterns: &[String]) -> bool {
    let mut all_ok = true;
    for line in check_lines(patterns) {
        match line {
            Ok(pattern) => println!("ok      {pattern}"),
            Err(e) => {
                all_ok = false;
                println!("invalid {e}");
            }
        }
    }
    all_ok
}

fn check_lines(patterns: &[String]) -> Vec<Result<String, cronkeep_cron::CronError>> {
    patterns
        .iter()
        .map(|p| Pattern::parse(p).map(|parsed| parsed.to_string()))
        .collect()
}
