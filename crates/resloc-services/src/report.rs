use crate::confirm::ConfirmationPort;
use crate::extract::Extraction;
use crate::reinject::reinject;
use crate::util::{display_name, list_reports, prefixed_output};
use color_eyre::eyre::WrapErr;
use resloc_core::{Decision, ResLocError, Result};
use resloc_domain::{
    ExtractFileStat, FileFailure, PrepareSummary, ReinjectFileStat, TranslateSummary,
    SCHEMA_VERSION,
};
use resloc_xml::{Document, Selector};
use std::path::Path;

/// Where report documents live and which of their nodes are translatable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub extension: String,
    pub selector: String,
    /// Prepended to the file name of every reinjected document.
    pub output_prefix: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            extension: "rdlc".into(),
            selector: "//Textbox/Value|//TextRun/Value".into(),
            output_prefix: "T_".into(),
        }
    }
}

impl ReportOptions {
    fn selector(&self) -> Result<Selector> {
        Ok(self.selector.parse::<Selector>()?)
    }
}

/// Build a new translation table from every report in `dir`.
///
/// `table` is resolved against `dir`. It must not exist yet; this is checked
/// before any document is opened. A document that cannot be read is reported
/// in `failed` and the others are still scanned.
pub fn prepare(dir: &Path, table: &Path, opts: &ReportOptions) -> Result<PrepareSummary> {
    let table_path = dir.join(table);
    if table_path.exists() {
        return Err(ResLocError::file_exists("Translation table", &table_path).into());
    }
    let selector = opts.selector()?;

    let mut extraction = Extraction::new();
    let mut files = Vec::new();
    let mut failed = Vec::new();

    for input in list_reports(dir, &opts.extension, &opts.output_prefix) {
        let name = display_name(&input);
        let document = match Document::load(&input) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(event = "document_unreadable", document = %name, error = %e);
                failed.push(FileFailure {
                    path: input.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        let scan = extraction.add_document(&name, &document, &selector);
        tracing::info!(
            event = "extract_document",
            document = %name,
            new_values = scan.new_values,
            "found {} new values",
            scan.new_values
        );
        files.push(ExtractFileStat {
            path: input.display().to_string(),
            new_values: scan.new_values,
            nodes: scan.nodes,
        });
    }

    let values = extraction.finish();
    resloc_table::write_table(&table_path, &values)?;

    Ok(PrepareSummary {
        schema_version: SCHEMA_VERSION,
        table: table_path.display().to_string(),
        values: values.len(),
        files,
        failed,
    })
}

/// Write a translated copy of every report in `dir` using the table `table`.
///
/// Each input `X` produces `<prefix>X` next to it; inputs are never
/// modified. An existing output is only replaced when `confirm` says so.
/// `Cancel` stops the run: outputs written so far stay and the remaining
/// documents are listed in `not_attempted`.
pub fn translate(
    dir: &Path,
    table: &Path,
    opts: &ReportOptions,
    confirm: &mut dyn ConfirmationPort,
) -> Result<TranslateSummary> {
    if opts.output_prefix.is_empty() {
        return Err(ResLocError::PreconditionViolation(
            "output prefix must not be empty, outputs would replace their inputs".into(),
        )
        .into());
    }
    let table_path = dir.join(table);
    let map = resloc_table::read_table(&table_path)?;
    let selector = opts.selector()?;
    let inputs = list_reports(dir, &opts.extension, &opts.output_prefix);

    let mut summary = TranslateSummary {
        schema_version: SCHEMA_VERSION,
        outcome: "completed".into(),
        table: table_path.display().to_string(),
        entries: map.len(),
        files: Vec::new(),
        failed: Vec::new(),
        not_attempted: Vec::new(),
    };

    for (i, input) in inputs.iter().enumerate() {
        let name = display_name(input);
        let output = prefixed_output(input, &opts.output_prefix);

        if output.exists() {
            let question = format!("{} already exists. Overwrite it?", output.display());
            match confirm.decide(&question)? {
                Decision::Proceed => {}
                Decision::Skip => {
                    tracing::info!(event = "output_kept", output = %output.display());
                    summary.files.push(ReinjectFileStat {
                        path: input.display().to_string(),
                        output: output.display().to_string(),
                        replaced: 0,
                        node_failures: 0,
                        status: "kept-existing".into(),
                    });
                    continue;
                }
                Decision::Cancel => {
                    tracing::warn!(event = "translate_cancelled", at = %name);
                    summary.outcome = "cancelled".into();
                    summary.not_attempted = inputs[i..]
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect();
                    break;
                }
            }
        }

        match translate_one(input, &output, &map, &selector, &name) {
            Ok(stat) => summary.files.push(stat),
            Err(e) => {
                tracing::warn!(event = "document_failed", document = %name, error = %e);
                summary.failed.push(FileFailure {
                    path: input.display().to_string(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    Ok(summary)
}

fn translate_one(
    input: &Path,
    output: &Path,
    map: &resloc_core::TranslationMap,
    selector: &Selector,
    name: &str,
) -> Result<ReinjectFileStat> {
    let document = Document::load(input)?;
    let result = reinject(&document, map, selector, name);
    result
        .document
        .save(output)
        .wrap_err_with(|| format!("writing {}", output.display()))?;
    tracing::info!(
        event = "reinject_document",
        document = %name,
        output = %output.display(),
        replaced = result.replaced,
        node_failures = result.failures.len()
    );
    Ok(ReinjectFileStat {
        path: input.display().to_string(),
        output: output.display().to_string(),
        replaced: result.replaced,
        node_failures: result.failures.len(),
        status: "written".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AlwaysProceed, Scripted};
    use resloc_core::classify;
    use std::fs;

    fn report(values: &[&str]) -> String {
        let boxes: String = values
            .iter()
            .map(|v| format!("\n    <Textbox><Value>{v}</Value></Textbox>"))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Report>\
             \n  <Body>{boxes}\n  </Body>\n</Report>\n"
        )
    }

    fn values_in(path: &Path) -> Vec<String> {
        let doc = Document::load(path).unwrap();
        let sel: Selector = "//Textbox/Value".parse().unwrap();
        doc.select(&sel).iter().filter_map(|p| doc.text(p)).collect()
    }

    fn is_precondition(err: &color_eyre::eyre::Report) -> bool {
        matches!(classify(err), Some(ResLocError::PreconditionViolation(_)))
    }

    #[test]
    fn prepare_then_translate_scenario() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("R1.rdlc"), report(&["Hello", "Hello", "World"])).unwrap();
        let opts = ReportOptions::default();

        let prepared = prepare(dir.path(), Path::new("t.csv"), &opts).unwrap();
        assert_eq!(prepared.values, 2);
        assert_eq!(prepared.files[0].new_values, 2);
        assert_eq!(prepared.files[0].nodes, 3);
        let table = fs::read_to_string(dir.path().join("t.csv")).unwrap();
        assert!(table.contains(r#""Hello","Hello","R1.rdlc, R1.rdlc""#));
        assert!(table.contains(r#""World","World","R1.rdlc""#));

        fs::write(
            dir.path().join("t.csv"),
            "Original,Translated,Occurrences\nHello,Bonjour,x\nWorld,Monde,x\n",
        )
        .unwrap();
        let translated =
            translate(dir.path(), Path::new("t.csv"), &opts, &mut AlwaysProceed).unwrap();
        assert_eq!(translated.outcome, "completed");
        assert_eq!(translated.files.len(), 1);
        assert_eq!(translated.files[0].replaced, 3);
        assert_eq!(translated.files[0].status, "written");

        assert_eq!(
            values_in(&dir.path().join("T_R1.rdlc")),
            vec!["Bonjour", "Bonjour", "Monde"]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("R1.rdlc")).unwrap(),
            report(&["Hello", "Hello", "World"])
        );
    }

    #[test]
    fn prepare_refuses_existing_table_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.rdlc"), "<Report>").unwrap();
        fs::write(dir.path().join("t.csv"), "old").unwrap();
        let err = prepare(dir.path(), Path::new("t.csv"), &ReportOptions::default()).unwrap_err();
        assert!(is_precondition(&err));
        assert_eq!(fs::read_to_string(dir.path().join("t.csv")).unwrap(), "old");
    }

    #[test]
    fn unreadable_documents_are_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rdlc"), "<Report><Textbox>").unwrap();
        fs::write(dir.path().join("b.rdlc"), report(&["Total"])).unwrap();
        let summary = prepare(dir.path(), Path::new("t.csv"), &ReportOptions::default()).unwrap();
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].path.ends_with("a.rdlc"));
        assert_eq!(summary.values, 1);
    }

    #[test]
    fn translate_without_table_is_a_precondition_violation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rdlc"), report(&["x"])).unwrap();
        let err = translate(
            dir.path(),
            Path::new("missing.csv"),
            &ReportOptions::default(),
            &mut AlwaysProceed,
        )
        .unwrap_err();
        assert!(is_precondition(&err));
        assert!(!dir.path().join("T_a.rdlc").exists());
    }

    #[test]
    fn existing_outputs_follow_the_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.rdlc", "b.rdlc", "c.rdlc"] {
            fs::write(dir.path().join(name), report(&["x"])).unwrap();
        }
        fs::write(dir.path().join("T_a.rdlc"), "keep").unwrap();
        fs::write(dir.path().join("T_b.rdlc"), "keep").unwrap();
        fs::write(dir.path().join("t.csv"), "Original,Translated\nx,y\n").unwrap();

        let mut answers = Scripted::new([Decision::Skip, Decision::Cancel]);
        let summary = translate(
            dir.path(),
            Path::new("t.csv"),
            &ReportOptions::default(),
            &mut answers,
        )
        .unwrap();

        assert_eq!(answers.asked.len(), 2);
        assert_eq!(summary.outcome, "cancelled");
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].status, "kept-existing");
        assert_eq!(summary.not_attempted.len(), 2);
        assert!(summary.not_attempted[0].ends_with("b.rdlc"));
        assert_eq!(fs::read_to_string(dir.path().join("T_a.rdlc")).unwrap(), "keep");
        assert_eq!(fs::read_to_string(dir.path().join("T_b.rdlc")).unwrap(), "keep");
        assert!(!dir.path().join("T_c.rdlc").exists());
    }

    #[test]
    fn outputs_are_not_inputs_on_a_second_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rdlc"), report(&["x"])).unwrap();
        fs::write(dir.path().join("t.csv"), "Original,Translated\nx,y\n").unwrap();
        let opts = ReportOptions::default();
        translate(dir.path(), Path::new("t.csv"), &opts, &mut AlwaysProceed).unwrap();
        let again = translate(dir.path(), Path::new("t.csv"), &opts, &mut AlwaysProceed).unwrap();
        assert_eq!(again.files.len(), 1);
        assert!(!dir.path().join("T_T_a.rdlc").exists());
        assert_eq!(values_in(&dir.path().join("T_a.rdlc")), vec!["y"]);
    }
}
