use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `dir/Strings.resx` + `de` → `dir/Strings.de.resx`.
pub fn tagged_sibling(path: &Path, tag: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}"),
    };
    path.with_file_name(name)
}

/// A language tag must be usable as a single file name segment.
pub fn validate_tag(tag: &str) -> Result<String, String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err("language tag must not be empty".into());
    }
    if tag.contains(['.', '/', '\\']) || tag.chars().any(char::is_whitespace) {
        return Err(format!("`{tag}` is not a valid language tag"));
    }
    Ok(tag.to_string())
}

/// `dir/Invoice.rdlc` + `T_` → `dir/T_Invoice.rdlc`.
pub fn prefixed_output(path: &Path, prefix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{prefix}{name}"))
}

pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Report files directly inside `dir`, sorted by name. Files that already
/// carry the output prefix are earlier reinjection results and are left out.
pub fn list_reports(dir: &Path, ext: &str, output_prefix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, ext))
        .filter(|p| {
            output_prefix.is_empty()
                || !p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(output_prefix))
        })
        .collect();
    files.sort();
    files
}

/// File name for logs and occurrence lists.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
