use colored::Colorize;
use std::collections::HashMap;

use crate::config::BrowserSpec;
use crate::report::types::SessionOutcome;

/// Render the consolidated end-of-run summary, one line per browser in
/// configuration order. Returns the number of browsers that failed or
/// produced no results.
pub fn display_results(
    browsers: &[BrowserSpec],
    outcomes: &HashMap<String, SessionOutcome>,
) -> u32 {
    let mut failures = 0;

    println!();
    println!();
    println!("**********************************");
    println!("*             Status             *");
    println!("**********************************");
    println!();
    println!();

    for browser in browsers {
        let name = browser.display_name();
        let summary = outcomes.get(&name).and_then(|o| o.summary.as_ref());

        let (passed, failed) = summary.map(|s| (s.passed, s.failed)).unwrap_or((0, 0));

        if passed == 0 && failed == 0 {
            println!("    {}: {}", name, "no results".red());
            failures += 1;
        } else if failed > 0 {
            println!(
                "    {}: {}",
                name,
                format!("{}/{} failed", failed, passed + failed).red()
            );
            failures += 1;
        } else {
            println!("    {}: {}", name, format!("{} passed", passed).green());
        }

        if failed > 0 {
            if let Some(summary) = summary {
                for (n, fail) in summary.failures.iter().enumerate() {
                    let detail = fail
                        .stack
                        .as_deref()
                        .or(fail.message.as_deref())
                        .unwrap_or("");
                    let indented = detail
                        .lines()
                        .map(|line| format!("        {}", line))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!();
                    println!("      {}) {}", n + 1, fail.title);
                    println!("{}", indented.red());
                }
                println!();
                println!();
            }
        }
    }

    println!();
    println!();
    failures
}
