use std::path::Path;

use anyhow::Result;

use litfilter_core::sheet::read_sheet;

pub fn run(input: &Path) -> Result<()> {
    let sheet = read_sheet(input)?;

    if sheet.columns().is_empty() {
        println!("No columns found in {}", input.display());
        return Ok(());
    }

    println!("Columns in {} ({} data rows):\n", input.display(), sheet.len());

    for (i, name) in sheet.columns().iter().enumerate() {
        let sample = (0..sheet.len())
            .map(|row| sheet.cell(row, i).trim())
            .find(|v| !v.is_empty())
            .map(|v| {
                let short: String = v.chars().take(50).collect();
                if short.len() < v.len() {
                    format!("{}...", short)
                } else {
                    short
                }
            })
            .unwrap_or_else(|| "(empty)".to_string());

        println!("  {:>3}  {:<30} {}", i + 1, name, sample);
    }

    Ok(())
}
