//! Name Sanitizer - Turns raw header and file names into ClickHouse identifiers

use std::path::Path;

/// Dataset prefix stripped from file names unless configured otherwise.
pub const DEFAULT_TABLE_PREFIX: &str = "AdventureWorks_";

/// Sanitize a raw column (or table) name.
///
/// Rules, in order: trim, spaces and hyphens become underscores, parentheses
/// are dropped, path separators and dots become underscores. The final trim
/// keeps the transform idempotent when a dropped parenthesis exposed
/// whitespace.
pub fn sanitize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());

    for ch in trimmed.chars() {
        match ch {
            ' ' | '-' => out.push('_'),
            '(' | ')' => {}
            '/' | '\\' | '.' => out.push('_'),
            other => out.push(other),
        }
    }

    out.trim().to_string()
}

/// Derive the destination table name for a source file.
///
/// `Region-A (v2).csv` -> `Region_A_v2`
pub fn table_name_for(path: &Path, prefix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = if !prefix.is_empty() {
        stem.strip_prefix(prefix).unwrap_or(&stem).to_string()
    } else {
        stem
    };

    sanitize_identifier(&stem)
}

/// Sanitize a header row into unique, non-empty column names.
///
/// Empty names become `column_<n>` (1-based position), repeated names get a
/// numeric suffix so every column stays addressable.
pub fn sanitize_header<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<String> = Vec::new();

    for (idx, raw_name) in raw.into_iter().enumerate() {
        let mut name = sanitize_identifier(raw_name);
        if name.is_empty() {
            name = format!("column_{}", idx + 1);
        }

        if names.contains(&name) {
            let mut n = 1;
            while names.contains(&format!("{}_{}", name, n)) {
                n += 1;
            }
            name = format!("{}_{}", name, n);
        }

        names.push(name);
    }

    names
}
