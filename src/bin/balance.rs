use anyhow::{bail, Context, Result};
use chemrxn::*;
use std::io::{self, BufRead};

fn main() -> Result<()> {
    init_logging(&std::env::var("CHEMRXN_LOG").unwrap_or_else(|_| "warn".to_string()));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let reaction = args.join(" ");
        let equation = balance_reaction(&reaction).with_context(|| format!("Failed to balance '{}'", reaction))?;
        println!("{}", equation);
        return Ok(());
    }

    // One reaction per line on stdin.
    let mut failures = 0;
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let reaction = line.trim();
        if reaction.is_empty() || reaction.starts_with('#') {
            continue;
        }
        match balance_reaction(reaction) {
            Ok(equation) => println!("{}", equation),
            Err(e) => {
                eprintln!("{}: {}", reaction, e);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{} reaction(s) could not be balanced", failures);
    }
    Ok(())
}
