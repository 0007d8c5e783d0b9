//! Runs the named scenarios against the real `rohc` compressor and
//! decompressor and reports a line-oriented diff for any mismatch,
//! the same job a reference implementation's golden-test runner does
//! against a table of expected wire captures, just against expected
//! reconstructed headers instead since this codec has no fixed test
//! vectors to replay.

mod scenarios;

use clap::Parser;
use console::style;
use similar::{ChangeTag, TextDiff};

use scenarios::ScenarioResult;

/// Replays the scripted ROHC scenarios and prints a pass/fail report.
#[derive(Parser)]
struct Cli {
    /// Print the full expected/actual text even for scenarios that pass.
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let results = scenarios::all();

    let mut failures = 0;
    for result in &results {
        report(result, cli.verbose);
        if !result.passed {
            failures += 1;
        }
    }

    println!();
    if failures == 0 {
        println!("{}", style(format!("all {} scenarios passed", results.len())).green().bold());
        Ok(())
    } else {
        println!(
            "{}",
            style(format!("{failures}/{} scenarios failed", results.len())).red().bold()
        );
        anyhow::bail!("{failures} golden scenario(s) failed")
    }
}

fn report(result: &ScenarioResult, verbose: bool) {
    if result.passed {
        println!("{} {} — {}", style("PASS").green().bold(), result.name, result.description);
        if verbose {
            print_lines(&result.expected, "  ");
        }
        return;
    }

    println!("{} {} — {}", style("FAIL").red().bold(), result.name, result.description);
    let diff = TextDiff::from_lines(&result.expected, &result.actual);
    for change in diff.iter_all_changes() {
        let (sign, styled) = match change.tag() {
            ChangeTag::Delete => ("-", style(format!("-{change}")).red()),
            ChangeTag::Insert => ("+", style(format!("+{change}")).green()),
            ChangeTag::Equal => (" ", style(format!(" {change}")).dim()),
        };
        let _ = sign;
        print!("  {styled}");
    }
}

fn print_lines(text: &str, indent: &str) {
    for line in text.lines() {
        println!("{indent}{line}");
    }
}
