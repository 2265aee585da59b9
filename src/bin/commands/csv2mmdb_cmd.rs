use anyhow::{bail, Context, Result};
use ip2mmdb::{convert_csv_to_mmdb, DatasetKind, RecordSize, WriterOptions};
use std::path::PathBuf;

/// Trimmed, non-empty path argument
fn path_arg(value: &str, name: &str) -> Result<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{} path cannot be empty", name);
    }
    Ok(PathBuf::from(trimmed))
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_csv2mmdb(
    input: String,
    output: String,
    kind: String,
    database_type: Option<String>,
    description: Option<String>,
    desc_lang: String,
    record_size: u16,
    no_ipv4_aliasing: bool,
) -> Result<()> {
    let input = path_arg(&input, "Input")?;
    let output = path_arg(&output, "Output")?;
    let kind: DatasetKind = kind.parse()?;
    let record_size = RecordSize::from_bits(record_size)
        .with_context(|| format!("Unsupported record size {}; use 24, 28 or 32", record_size))?;

    let mut options = WriterOptions::for_dataset(kind)
        .with_record_size(record_size)
        .with_ipv4_aliasing(!no_ipv4_aliasing);
    if let Some(db_type) = database_type {
        options = options.with_database_type(db_type);
    }
    if let Some(desc) = description {
        options = options.with_description(desc_lang, desc);
    }

    let rows = convert_csv_to_mmdb(&input, &output, kind, options)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    println!("Wrote {} entries to {}", rows, output.display());
    Ok(())
}
