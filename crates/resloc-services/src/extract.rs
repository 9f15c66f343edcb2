use resloc_core::TranslatableValue;
use resloc_xml::{Document, Selector};
use std::collections::HashMap;

/// Collects unique texts across documents, one occurrence per matching node.
#[derive(Debug, Default)]
pub struct Extraction {
    values: Vec<TranslatableValue>,
    index: HashMap<String, usize>,
}

/// What one document contributed to an [`Extraction`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentScan {
    pub nodes: usize,
    pub new_values: usize,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(
        &mut self,
        id: &str,
        document: &Document,
        selector: &Selector,
    ) -> DocumentScan {
        let mut scan = DocumentScan::default();
        for path in document.select(selector) {
            let Some(text) = document.text(&path) else {
                continue;
            };
            // whitespace-only values are layout, not text
            if text.trim().is_empty() {
                continue;
            }
            scan.nodes += 1;
            let slot = match self.index.get(&text) {
                Some(&i) => i,
                None => {
                    scan.new_values += 1;
                    self.values.push(TranslatableValue::new(text.clone()));
                    self.index.insert(text, self.values.len() - 1);
                    self.values.len() - 1
                }
            };
            self.values[slot].occurrences.push(id.to_string());
        }
        tracing::debug!(
            event = "extract_scan",
            document = id,
            nodes = scan.nodes,
            new_values = scan.new_values
        );
        scan
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values ordered by text, ignoring case; texts equal under that order
    /// fall back to ordinal comparison so the result stays deterministic.
    pub fn finish(self) -> Vec<TranslatableValue> {
        let mut values = self.values;
        values.sort_by_cached_key(|v| (v.text.to_lowercase(), v.text.clone()));
        values
    }
}

/// One-shot extraction over `(identifier, document)` pairs.
pub fn extract<'a, I>(documents: I, selector: &Selector) -> Vec<TranslatableValue>
where
    I: IntoIterator<Item = (&'a str, &'a Document)>,
{
    let mut extraction = Extraction::new();
    for (id, document) in documents {
        extraction.add_document(id, document, selector);
    }
    extraction.finish()
}
