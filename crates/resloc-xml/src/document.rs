use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{Selector, XmlError};

const BOM: &str = "\u{feff}";

/// Address of an element: child indices walked down from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn join(&self, child: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(child);
        Self(steps)
    }

    pub fn steps(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(BytesText<'static>),
    CData(BytesCData<'static>),
    /// Comments, processing instructions and anything else kept verbatim.
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
pub struct Element {
    start: BytesStart<'static>,
    local_name: String,
    children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    fn from_start(start: BytesStart<'static>, self_closing: bool) -> Self {
        let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        Self {
            start,
            local_name,
            children: Vec::new(),
            self_closing,
        }
    }

    /// Element name without namespace prefix.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let attr = self.start.try_get_attribute(name).ok()??;
        attr.unescape_value().ok().map(|v| v.into_owned())
    }

    /// Child elements in document order, with their index among all child nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children.iter().enumerate().filter_map(|(i, n)| match n {
            Node::Element(e) => Some((i, e)),
            _ => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local_name: &str) -> Option<(usize, &Element)> {
        self.child_elements().find(|(_, e)| e.local_name == local_name)
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Element(e) => e.collect_text(out),
                Node::Text(t) => match t.unescape() {
                    Ok(s) => out.push_str(&s),
                    Err(_) => out.push_str(&String::from_utf8_lossy(t)),
                },
                Node::CData(c) => out.push_str(&String::from_utf8_lossy(c)),
                Node::Other(_) => {}
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        if self.self_closing {
            // `<value />` keeps its trailing blank in the start tag content
            let raw = String::from_utf8_lossy(&self.start);
            let name_len = self.start.name().as_ref().len();
            let reopened = BytesStart::from_content(raw.trim_end().to_owned(), name_len);
            self.start = reopened;
        }
        self.children.clear();
        if !text.is_empty() {
            let escaped = partial_escape(text).into_owned();
            self.children.push(Node::Text(BytesText::from_escaped(escaped)));
        }
        self.self_closing = false;
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut Element> {
        match self.children.get_mut(index)? {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// A parsed XML document. `Clone` produces a fully independent copy.
#[derive(Debug, Clone)]
pub struct Document {
    prolog: Vec<Event<'static>>,
    root: Element,
    epilog: Vec<Event<'static>>,
    bom: bool,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        let (bom, body) = match text.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(false);

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = match reader.read_event() {
                Ok(ev) => ev.into_owned(),
                Err(e) => {
                    return Err(XmlError::Parse {
                        position: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })
                }
            };
            match event {
                Event::Start(start) => stack.push(Element::from_start(start, false)),
                Event::Empty(start) => {
                    let element = Element::from_start(start, true);
                    attach(&mut stack, &mut root, element, &reader)?;
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        return Err(XmlError::Parse {
                            position: reader.buffer_position() as u64,
                            message: "closing tag without an open element".into(),
                        });
                    };
                    attach(&mut stack, &mut root, element, &reader)?;
                }
                Event::Eof => break,
                Event::Text(t) => match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(t)),
                    None => outside_root(&root, &mut prolog, &mut epilog, Event::Text(t)),
                },
                Event::CData(c) => match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::CData(c)),
                    None => outside_root(&root, &mut prolog, &mut epilog, Event::CData(c)),
                },
                other => match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Other(other)),
                    None => outside_root(&root, &mut prolog, &mut epilog, other),
                },
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Parse {
                position: reader.buffer_position() as u64,
                message: format!("element <{}> is never closed", open.local_name),
            });
        }
        let root = root.ok_or(XmlError::NoRoot)?;

        Ok(Self {
            prolog,
            root,
            epilog,
            bom,
        })
    }

    pub fn load(path: &Path) -> Result<Self, XmlError> {
        let text = fs::read_to_string(path).map_err(|source| XmlError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn element(&self, path: &NodePath) -> Option<&Element> {
        let mut current = &self.root;
        for &index in path.steps() {
            current = match current.children.get(index)? {
                Node::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let mut current = &mut self.root;
        for &index in path.steps() {
            current = current.child_mut(index)?;
        }
        Some(current)
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        select_into(&self.root, NodePath::root(), &mut names, selector, &mut out);
        out
    }

    pub fn text(&self, path: &NodePath) -> Option<String> {
        self.element(path).map(Element::text)
    }

    pub fn set_text(&mut self, path: &NodePath, text: &str) -> Result<(), XmlError> {
        let element = self
            .element_mut(path)
            .ok_or_else(|| XmlError::NoSuchElement(path.clone()))?;
        element.set_text(text);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut buf = Vec::new();
        if self.bom {
            buf.extend_from_slice(BOM.as_bytes());
        }
        let mut writer = Writer::new(buf);
        for event in &self.prolog {
            emit(&mut writer, event.clone())?;
        }
        write_element(&mut writer, &self.root)?;
        for event in &self.epilog {
            emit(&mut writer, event.clone())?;
        }
        Ok(writer.into_inner())
    }

    /// Write the document, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), XmlError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|source| XmlError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the document to a file that must not exist yet.
    pub fn save_new(&self, path: &Path) -> Result<(), XmlError> {
        let bytes = self.to_bytes()?;
        let wrap = |source| XmlError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(wrap)?;
        file.write_all(&bytes).map_err(wrap)?;
        file.flush().map_err(wrap)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    reader: &Reader<&[u8]>,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::Parse {
            position: reader.buffer_position() as u64,
            message: format!("second root element <{}>", element.local_name),
        });
    }
    *root = Some(element);
    Ok(())
}

fn outside_root(
    root: &Option<Element>,
    prolog: &mut Vec<Event<'static>>,
    epilog: &mut Vec<Event<'static>>,
    event: Event<'static>,
) {
    if root.is_none() {
        prolog.push(event);
    } else {
        epilog.push(event);
    }
}

fn select_into<'d>(
    element: &'d Element,
    path: NodePath,
    names: &mut Vec<&'d str>,
    selector: &Selector,
    out: &mut Vec<NodePath>,
) {
    names.push(&element.local_name);
    if selector.matches(names.as_slice()) {
        out.push(path.clone());
    }
    for (index, child) in element.child_elements() {
        select_into(child, path.join(index), names, selector, out);
    }
    names.pop();
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Serialize(e.to_string()))
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<(), XmlError> {
    if element.self_closing && element.children.is_empty() {
        return emit(writer, Event::Empty(element.start.clone()));
    }
    emit(writer, Event::Start(element.start.clone()))?;
    for node in &element.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(t) => emit(writer, Event::Text(t.clone()))?,
            Node::CData(c) => emit(writer, Event::CData(c.clone()))?,
            Node::Other(ev) => emit(writer, ev.clone())?,
        }
    }
    emit(writer, Event::End(element.start.to_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- generated -->
<Report xmlns="http://schemas.microsoft.com/sqlserver/reporting/2005/01/reportdefinition"
        xmlns:rd="http://schemas.microsoft.com/SQLServer/reporting/reportdesigner">
  <Body>
    <ReportItems>
      <Textbox Name="title">
        <Value>Hello &amp; welcome</Value>
        <rd:DefaultName>title</rd:DefaultName>
      </Textbox>
      <Textbox Name="empty">
        <Value />
      </Textbox>
    </ReportItems>
  </Body>
</Report>
"#;

    fn values() -> Selector {
        "//Textbox/Value".parse().unwrap()
    }

    #[test]
    fn untouched_document_round_trips_byte_for_byte() {
        let doc = Document::parse(REPORT).unwrap();
        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert_eq!(out, REPORT);
    }

    #[test]
    fn bom_is_kept() {
        let text = format!("{BOM}<root><data name=\"a\"><value>x</value></data></root>");
        let doc = Document::parse(&text).unwrap();
        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn select_returns_document_order_and_unescaped_text() {
        let doc = Document::parse(REPORT).unwrap();
        let paths = doc.select(&values());
        assert_eq!(paths.len(), 2);
        assert_eq!(doc.text(&paths[0]).as_deref(), Some("Hello & welcome"));
        assert_eq!(doc.text(&paths[1]).as_deref(), Some(""));
    }

    #[test]
    fn set_text_escapes_and_expands_empty_elements() {
        let mut doc = Document::parse(REPORT).unwrap();
        let paths = doc.select(&values());
        doc.set_text(&paths[0], "Bonjour <et> bienvenue").unwrap();
        doc.set_text(&paths[1], "Rempli").unwrap();
        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(out.contains("<Value>Bonjour &lt;et&gt; bienvenue</Value>"));
        assert!(out.contains("<Value>Rempli</Value>"));
        assert!(out.contains("<rd:DefaultName>title</rd:DefaultName>"));

        let reparsed = Document::parse(&out).unwrap();
        let paths = reparsed.select(&values());
        assert_eq!(
            reparsed.text(&paths[0]).as_deref(),
            Some("Bonjour <et> bienvenue")
        );
    }

    #[test]
    fn set_text_on_missing_path_fails() {
        let mut doc = Document::parse("<root><a/></root>").unwrap();
        let err = doc.set_text(&NodePath::root().join(7), "x").unwrap_err();
        assert!(matches!(err, XmlError::NoSuchElement(_)));
    }

    #[test]
    fn clone_is_independent() {
        let original =
            Document::parse("<root><data name=\"k\"><value>v</value></data></root>").unwrap();
        let mut copy = original.clone();
        let sel: Selector = "/root/data/value".parse().unwrap();
        let path = copy.select(&sel).remove(0);
        copy.set_text(&path, "changed").unwrap();
        assert_eq!(original.text(&path).as_deref(), Some("v"));
        assert_eq!(copy.text(&path).as_deref(), Some("changed"));
    }

    #[test]
    fn attributes_and_children() {
        let doc = Document::parse(
            "<root><data name=\"Greeting\" xml:space=\"preserve\">\
             <value>Hi</value><comment>c</comment></data></root>",
        )
        .unwrap();
        let (idx, data) = doc.root().child("data").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(data.attribute("name").as_deref(), Some("Greeting"));
        assert_eq!(data.attribute("missing"), None);
        let (vidx, value) = data.child("value").unwrap();
        assert_eq!(vidx, 0);
        assert_eq!(value.text(), "Hi");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            Document::parse("<a><b></a>"),
            Err(XmlError::Parse { .. })
        ));
        assert!(matches!(Document::parse("<a>"), Err(XmlError::Parse { .. })));
        assert!(matches!(
            Document::parse("<?xml version=\"1.0\"?>"),
            Err(XmlError::NoRoot)
        ));
    }

    #[test]
    fn save_new_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        let doc = Document::parse("<root/>").unwrap();
        doc.save_new(&path).unwrap();
        let err = doc.save_new(&path).unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "<root/>");
    }
}
