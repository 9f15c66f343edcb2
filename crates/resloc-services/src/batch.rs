use crate::confirm::ConfirmationPort;
use crate::dispose::Disposal;
use crate::rotate::rotate;
use crate::util::tagged_sibling;
use color_eyre::eyre::WrapErr;
use regex::Regex;
use resloc_core::{Decision, Result, RotationTriple};
use resloc_domain::{
    RotationSummary, SkippedFile, SwapPlan, SwapPlanEntry, SwapSummary, SCHEMA_VERSION,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOptions {
    /// Extension of resource files, without the dot.
    pub extension: String,
    /// Where disposed files go; relative paths are taken from the swapped root.
    pub trash_dir: PathBuf,
}

impl Default for SwapOptions {
    fn default() -> Self {
        Self {
            extension: "resx".into(),
            trash_dir: PathBuf::from(".resloc-trash"),
        }
    }
}

impl SwapOptions {
    pub fn trash_path(&self, root: &Path) -> PathBuf {
        root.join(&self.trash_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No overlay for this base file; nothing to promote.
    ImportMissing,
    /// The export file is already there, so this base was promoted before.
    ExportExists,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ImportMissing => "import-missing",
            SkipReason::ExportExists => "export-exists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Ready(RotationTriple),
    Skipped { base: PathBuf, reason: SkipReason },
}

/// Find every base resource file under `root` and pair it with its overlays.
///
/// Files of a directory come before its subdirectories, names sorted. Only
/// files without a language tag (`Strings.resx`, not `Strings.de.resx`) are
/// base files. The trash directory is never entered.
pub fn discover(
    root: &Path,
    neutral_tag: &str,
    import_tag: &str,
    opts: &SwapOptions,
) -> Result<Vec<Candidate>> {
    let base_file = Regex::new(&format!(r"(?i)^[^.]+\.{}$", regex::escape(&opts.extension)))?;
    let trash = opts.trash_path(root);

    let walker = WalkDir::new(root)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(move |e| e.path() != trash.as_path());

    let mut out = Vec::new();
    for entry in walker {
        let entry = entry.wrap_err_with(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !base_file.is_match(name) {
            continue;
        }

        let neutral = entry.into_path();
        let import = tagged_sibling(&neutral, import_tag);
        let export = tagged_sibling(&neutral, neutral_tag);

        let reason = if !import.is_file() {
            Some(SkipReason::ImportMissing)
        } else if export.exists() {
            Some(SkipReason::ExportExists)
        } else {
            None
        };
        match reason {
            Some(reason) => {
                tracing::info!(
                    event = "batch_skip",
                    base = %neutral.display(),
                    reason = reason.as_str()
                );
                out.push(Candidate::Skipped {
                    base: neutral,
                    reason,
                });
            }
            None => out.push(Candidate::Ready(RotationTriple::new(neutral, import, export))),
        }
    }
    Ok(out)
}

/// What a discovery would do, without doing it.
pub fn plan(candidates: &[Candidate]) -> SwapPlan {
    let mut ready = Vec::new();
    let mut skipped = Vec::new();
    for c in candidates {
        match c {
            Candidate::Ready(t) => ready.push(SwapPlanEntry {
                neutral: t.neutral.display().to_string(),
                import: t.import.display().to_string(),
                export: t.export.display().to_string(),
            }),
            Candidate::Skipped { base, reason } => skipped.push(SkippedFile {
                path: base.display().to_string(),
                reason: reason.as_str().into(),
            }),
        }
    }
    SwapPlan {
        schema_version: SCHEMA_VERSION,
        ready,
        skipped,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

impl BatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOutcome::Completed => "completed",
            BatchOutcome::Cancelled => "cancelled",
            BatchOutcome::Failed(_) => "failed",
        }
    }
}

/// Which triples were committed, declined, skipped or never reached.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub completed: Vec<RotationSummary>,
    pub declined: Vec<RotationTriple>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    pub not_attempted: Vec<RotationTriple>,
}

impl BatchReport {
    pub fn to_summary(&self) -> SwapSummary {
        SwapSummary {
            schema_version: SCHEMA_VERSION,
            outcome: self.outcome.as_str().into(),
            error: match &self.outcome {
                BatchOutcome::Failed(reason) => Some(reason.clone()),
                _ => None,
            },
            completed: self.completed.clone(),
            declined: self
                .declined
                .iter()
                .map(|t| t.neutral.display().to_string())
                .collect(),
            skipped: self
                .skipped
                .iter()
                .map(|(path, reason)| SkippedFile {
                    path: path.display().to_string(),
                    reason: reason.as_str().into(),
                })
                .collect(),
            not_attempted: self
                .not_attempted
                .iter()
                .map(|t| t.neutral.display().to_string())
                .collect(),
        }
    }
}

/// Rotate every ready candidate the user agrees to, in order.
///
/// `Cancel` or a failed rotation stops the batch; rotations completed before
/// that stay committed and the rest are listed as not attempted.
pub fn run_batch(
    candidates: Vec<Candidate>,
    confirm: &mut dyn ConfirmationPort,
    disposal: &dyn Disposal,
) -> BatchReport {
    let mut report = BatchReport {
        outcome: BatchOutcome::Completed,
        completed: Vec::new(),
        declined: Vec::new(),
        skipped: Vec::new(),
        not_attempted: Vec::new(),
    };

    let mut pending = candidates.into_iter();
    while let Some(candidate) = pending.next() {
        let triple = match candidate {
            Candidate::Ready(t) => t,
            Candidate::Skipped { base, reason } => {
                report.skipped.push((base, reason));
                continue;
            }
        };

        let question = format!(
            "Importing strings from {} to {} and will create {}",
            triple.import.display(),
            triple.neutral.display(),
            triple.export.display()
        );
        let decision = match confirm.decide(&question) {
            Ok(d) => d,
            Err(e) => {
                report.outcome = BatchOutcome::Failed(format!("{e:#}"));
                report.not_attempted.push(triple);
                break;
            }
        };

        match decision {
            Decision::Proceed => match rotate(&triple, disposal) {
                Ok(summary) => report.completed.push(summary),
                Err(e) => {
                    tracing::error!(
                        event = "rotation_failed",
                        neutral = %triple.neutral.display(),
                        error = %format!("{e:#}")
                    );
                    report.outcome =
                        BatchOutcome::Failed(format!("{}: {e:#}", triple.neutral.display()));
                    break;
                }
            },
            Decision::Skip => {
                tracing::info!(event = "rotation_declined", neutral = %triple.neutral.display());
                report.declined.push(triple);
            }
            Decision::Cancel => {
                tracing::warn!(event = "batch_cancelled", at = %triple.neutral.display());
                report.outcome = BatchOutcome::Cancelled;
                report.not_attempted.push(triple);
                break;
            }
        }
    }

    // whatever follows a stop is reported, not touched
    for candidate in pending {
        match candidate {
            Candidate::Ready(t) => report.not_attempted.push(t),
            Candidate::Skipped { base, reason } => report.skipped.push((base, reason)),
        }
    }

    tracing::info!(
        event = "batch_done",
        outcome = report.outcome.as_str(),
        completed = report.completed.len(),
        declined = report.declined.len(),
        skipped = report.skipped.len(),
        not_attempted = report.not_attempted.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::Scripted;
    use crate::dispose::TrashDir;
    use std::fs;

    fn resx(value: &str) -> String {
        format!("<root><data name=\"Greeting\"><value>{value}</value></data></root>")
    }

    fn write(path: &Path, text: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    fn neutral_names(candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| match c {
                Candidate::Ready(t) => t.neutral.clone(),
                Candidate::Skipped { base, .. } => base.clone(),
            })
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn discovery_order_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("sub").join("Ui.resx"), &resx("Hi"));
        write(&root.join("sub").join("Ui.fr.resx"), &resx("Salut"));
        write(&root.join("Strings.resx"), &resx("Hi"));
        write(&root.join("Strings.fr.resx"), &resx("Salut"));
        write(&root.join("Other.resx"), &resx("Hi"));
        write(&root.join("Done.resx"), &resx("Salut"));
        write(&root.join("Done.fr.resx"), &resx("Salut"));
        write(&root.join("Done.en.resx"), &resx("Hi"));
        write(&root.join(".resloc-trash").join("x").join("Old.resx"), &resx("Hi"));
        write(&root.join(".resloc-trash").join("x").join("Old.fr.resx"), &resx("Hi"));

        let found = discover(root, "en", "fr", &SwapOptions::default()).unwrap();

        assert_eq!(
            neutral_names(&found),
            vec!["Done.resx", "Other.resx", "Strings.resx", "Ui.resx"]
        );
        assert!(matches!(
            found[0],
            Candidate::Skipped { reason: SkipReason::ExportExists, .. }
        ));
        assert!(matches!(
            found[1],
            Candidate::Skipped { reason: SkipReason::ImportMissing, .. }
        ));
        match &found[2] {
            Candidate::Ready(t) => {
                assert_eq!(t.import, root.join("Strings.fr.resx"));
                assert_eq!(t.export, root.join("Strings.en.resx"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let plan = plan(&found);
        assert_eq!(plan.ready.len(), 2);
        assert_eq!(plan.skipped.len(), 2);
    }

    fn ready_set(root: &Path, names: &[&str]) -> Vec<Candidate> {
        for name in names {
            write(&root.join(format!("{name}.resx")), &resx("Hi"));
            write(&root.join(format!("{name}.fr.resx")), &resx("Salut"));
        }
        discover(root, "en", "fr", &SwapOptions::default()).unwrap()
    }

    #[test]
    fn cancel_stops_and_reports_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = ready_set(dir.path(), &["A", "B", "C"]);
        let trash = TrashDir::new(dir.path().join(".resloc-trash"), dir.path());
        let mut answers = Scripted::new([Decision::Proceed, Decision::Cancel]);

        let report = run_batch(candidates, &mut answers, &trash);

        assert_eq!(report.outcome, BatchOutcome::Cancelled);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.not_attempted.len(), 2);
        assert_eq!(answers.asked.len(), 2);
        assert!(dir.path().join("A.en.resx").exists());
        assert!(!dir.path().join("B.en.resx").exists());
        assert!(dir.path().join("B.fr.resx").exists());
        assert_eq!(report.to_summary().outcome, "cancelled");
    }

    #[test]
    fn declined_triples_are_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = ready_set(dir.path(), &["A", "B"]);
        let trash = TrashDir::new(dir.path().join(".resloc-trash"), dir.path());
        let mut answers = Scripted::new([Decision::Skip, Decision::Proceed]);

        let report = run_batch(candidates, &mut answers, &trash);

        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.declined.len(), 1);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(fs::read_to_string(dir.path().join("A.resx")).unwrap(), resx("Hi"));
        assert_eq!(fs::read_to_string(dir.path().join("B.resx")).unwrap(), resx("Salut"));
        let summary = report.to_summary();
        assert_eq!(summary.declined.len(), 1);
        assert!(summary.error.is_none());
    }

    #[test]
    fn a_failed_rotation_stops_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = ready_set(dir.path(), &["A", "B"]);
        write(&dir.path().join("A.resx"), "<root><data>");
        let trash = TrashDir::new(dir.path().join(".resloc-trash"), dir.path());
        let mut answers = Scripted::new([Decision::Proceed, Decision::Proceed]);

        let report = run_batch(candidates, &mut answers, &trash);

        assert!(matches!(report.outcome, BatchOutcome::Failed(_)));
        assert!(report.completed.is_empty());
        assert_eq!(report.not_attempted.len(), 1);
        assert_eq!(answers.asked.len(), 1);
        assert!(report.to_summary().error.is_some());
        assert!(!dir.path().join("B.en.resx").exists());
    }
}
