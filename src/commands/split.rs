use std::path::Path;

use anyhow::{Context, Result};

use feedmill::splitter::Splitter;
use feedmill::utils::rune_count;

pub fn split(input: &Path, opt: usize, max: usize, json: bool) -> Result<()> {
    if opt == 0 || opt > max {
        anyhow::bail!("--opt must be between 1 and --max ({max})");
    }

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    let fragments = Splitter::new(opt, max).split(&content);

    if json {
        println!("{}", serde_json::to_string_pretty(&fragments)?);
        return Ok(());
    }

    println!(
        "{} runes -> {} fragment(s) (opt {opt}, max {max})",
        rune_count(&content),
        fragments.len()
    );
    for (index, fragment) in fragments.iter().enumerate() {
        println!();
        println!("--- fragment {} ({} runes) ---", index + 1, rune_count(fragment));
        println!("{fragment}");
    }

    Ok(())
}
