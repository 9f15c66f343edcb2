use crate::dispose::Disposal;
use color_eyre::eyre::WrapErr;
use resloc_core::{ResLocError, Result, RotationTriple};
use resloc_domain::RotationSummary;
use resloc_xml::{Document, NodePath, Selector};
use std::collections::HashMap;

const ENTRY_SELECTOR: &str = "/root/data";

/// Keys touched by one [`exchange`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    pub swapped: Vec<String>,
    /// Import keys with no usable entry in the neutral document.
    pub missing_in_neutral: Vec<String>,
}

/// `(name, path of its <value>)` for every named entry that has a value child.
fn entries(doc: &Document) -> Result<Vec<(String, NodePath)>> {
    let selector: Selector = ENTRY_SELECTOR.parse()?;
    let mut out = Vec::new();
    for path in doc.select(&selector) {
        let Some(entry) = doc.element(&path) else {
            continue;
        };
        let Some(name) = entry.attribute("name") else {
            continue;
        };
        let Some((index, _)) = entry.child("value") else {
            continue;
        };
        out.push((name, path.join(index)));
    }
    Ok(out)
}

/// Promote `import` into `neutral` and return the export document.
///
/// The export starts as a deep copy of `import`. For every import key also
/// defined in `neutral`, the export receives the neutral value as it was
/// before this call and `neutral` receives the import value. Neutral keys the
/// import does not mention are left alone.
pub fn exchange(neutral: &mut Document, import: &Document) -> Result<(Document, Exchange)> {
    let mut neutral_index: HashMap<String, NodePath> = HashMap::new();
    for (name, path) in entries(neutral)? {
        // first definition wins
        neutral_index.entry(name).or_insert(path);
    }
    let before: HashMap<&str, String> = neutral_index
        .iter()
        .map(|(name, path)| (name.as_str(), neutral.text(path).unwrap_or_default()))
        .collect();

    let mut export = import.clone();
    let mut result = Exchange::default();

    for (name, import_path) in entries(import)? {
        let (Some(neutral_path), Some(old)) = (neutral_index.get(&name), before.get(name.as_str()))
        else {
            tracing::debug!(event = "rotation_key_missing", key = %name);
            result.missing_in_neutral.push(name);
            continue;
        };
        let new = import.text(&import_path).unwrap_or_default();

        if new != *old {
            export.set_text(&import_path, old)?;
            neutral.set_text(neutral_path, &new)?;
        }
        tracing::debug!(event = "rotation_swapped", key = %name);
        result.swapped.push(name);
    }

    Ok((export, result))
}

/// Run one full rotation: check, load, exchange, persist, dispose.
///
/// Preconditions are checked before anything is written. After that the
/// steps are not atomic; a failure part way leaves the files as far as the
/// last completed step got.
pub fn rotate(triple: &RotationTriple, disposal: &dyn Disposal) -> Result<RotationSummary> {
    if !triple.neutral.is_file() {
        return Err(ResLocError::file_missing("Neutral file", &triple.neutral).into());
    }
    if !triple.import.is_file() {
        return Err(ResLocError::file_missing("Import file", &triple.import).into());
    }
    if triple.export.exists() {
        return Err(ResLocError::file_exists("Export file", &triple.export).into());
    }

    let mut neutral = Document::load(&triple.neutral)
        .wrap_err_with(|| format!("loading {}", triple.neutral.display()))?;
    let import = Document::load(&triple.import)
        .wrap_err_with(|| format!("loading {}", triple.import.display()))?;

    let (export, exchanged) = exchange(&mut neutral, &import)?;

    neutral
        .save(&triple.neutral)
        .wrap_err_with(|| format!("writing {}", triple.neutral.display()))?;
    if let Err(e) = export.save_new(&triple.export) {
        if e.is_already_exists() {
            return Err(ResLocError::file_exists("Export file", &triple.export).into());
        }
        return Err(e).wrap_err_with(|| format!("writing {}", triple.export.display()));
    }
    let disposed_to = disposal.dispose(&triple.import)?;

    tracing::info!(
        event = "rotation_done",
        neutral = %triple.neutral.display(),
        swapped = exchanged.swapped.len(),
        missing_in_neutral = exchanged.missing_in_neutral.len()
    );
    if !exchanged.missing_in_neutral.is_empty() {
        tracing::warn!(
            event = "rotation_keys_missing",
            neutral = %triple.neutral.display(),
            keys = ?exchanged.missing_in_neutral
        );
    }

    Ok(RotationSummary {
        neutral: triple.neutral.display().to_string(),
        import: triple.import.display().to_string(),
        export: triple.export.display().to_string(),
        swapped: exchanged.swapped,
        missing_in_neutral: exchanged.missing_in_neutral,
        disposed_to: disposed_to.display().to_string(),
    })
}
