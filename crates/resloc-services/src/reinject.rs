use resloc_core::{ResLocError, TranslationMap};
use resloc_xml::{Document, Selector};

/// Edited copy of a document plus what happened to its nodes.
#[derive(Debug)]
pub struct Reinjection {
    pub document: Document,
    pub replaced: usize,
    pub failures: Vec<ResLocError>,
}

/// Apply `map` to every selected node whose text matches a key exactly.
///
/// `document` itself is left untouched. A node that cannot be updated is
/// logged, recorded in `failures` and skipped; the rest of the document is
/// still processed.
pub fn reinject(
    document: &Document,
    map: &TranslationMap,
    selector: &Selector,
    id: &str,
) -> Reinjection {
    let mut edited = document.clone();
    let mut replaced = 0usize;
    let mut failures = Vec::new();

    for path in document.select(selector) {
        let Some(current) = document.text(&path) else {
            continue;
        };
        if current.is_empty() {
            continue;
        }
        let Some(translated) = map.get(&current) else {
            continue;
        };
        if *translated == current {
            // keep the original bytes, escaping included
            replaced += 1;
            continue;
        }
        match edited.set_text(&path, translated) {
            Ok(()) => replaced += 1,
            Err(e) => {
                tracing::warn!(
                    event = "reinject_node_failed",
                    document = id,
                    node = %path,
                    error = %e
                );
                failures.push(ResLocError::NodeMutation {
                    document: id.to_string(),
                    node: path.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Reinjection {
        document: edited,
        replaced,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R1: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Report xmlns="http://schemas.microsoft.com/sqlserver/reporting/2005/01/reportdefinition">
  <Body>
    <Textbox Name="a"><Value>Hello</Value></Textbox>
    <Textbox Name="b"><Value>Hello</Value></Textbox>
    <Textbox Name="c"><Value>World</Value></Textbox>
    <Textbox Name="d"><Value>=Fields!Total.Value</Value></Textbox>
  </Body>
</Report>
"#;

    fn selector() -> Selector {
        "//Textbox/Value".parse().unwrap()
    }

    fn map(pairs: &[(&str, &str)]) -> TranslationMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.select(&selector())
            .iter()
            .filter_map(|p| doc.text(p))
            .collect()
    }

    #[test]
    fn replaces_exact_matches_only() {
        let doc = Document::parse(R1).unwrap();
        let out = reinject(
            &doc,
            &map(&[("Hello", "Bonjour"), ("World", "Monde"), ("world", "nope")]),
            &selector(),
            "R1.rdlc",
        );
        assert_eq!(out.replaced, 3);
        assert!(out.failures.is_empty());
        assert_eq!(
            texts(&out.document),
            vec!["Bonjour", "Bonjour", "Monde", "=Fields!Total.Value"]
        );
        // the source document is not modified
        assert_eq!(texts(&doc), vec!["Hello", "Hello", "World", "=Fields!Total.Value"]);
    }

    #[test]
    fn identity_mapping_reproduces_the_input() {
        let doc = Document::parse(R1).unwrap();
        let identity = map(&[
            ("Hello", "Hello"),
            ("World", "World"),
            ("=Fields!Total.Value", "=Fields!Total.Value"),
        ]);
        let out = reinject(&doc, &identity, &selector(), "R1.rdlc");
        assert_eq!(out.replaced, 4);
        assert_eq!(String::from_utf8(out.document.to_bytes().unwrap()).unwrap(), R1);
    }

    #[test]
    fn a_failing_node_does_not_stop_the_document() {
        // the outer Value is rewritten first, which removes the inner one
        let doc = Document::parse(
            "<Report><Textbox><Value><Textbox><Value>x</Value></Textbox></Value></Textbox>\
             <Textbox><Value>y</Value></Textbox></Report>",
        )
        .unwrap();
        let out = reinject(&doc, &map(&[("x", "X"), ("y", "Y")]), &selector(), "N.rdlc");
        assert_eq!(out.replaced, 2);
        assert_eq!(out.failures.len(), 1);
        assert!(matches!(out.failures[0], ResLocError::NodeMutation { .. }));
        assert_eq!(texts(&out.document), vec!["X", "Y"]);
    }
}
