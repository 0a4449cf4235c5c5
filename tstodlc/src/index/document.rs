//! Owned XML element tree for index documents.
//!
//! Index files are small XML documents made of elements and attributes
//! only. The tree is owned top-down: the document owns the root, the root
//! owns its branches, branches own their `Package` elements. Text nodes,
//! comments and processing instructions are dropped on load.

use std::fmt;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::error::{IndexError, IndexResult};

/// Root tag of local and server index documents.
pub const INDEX_ROOT_TAG: &str = "DlcIndex";

/// Tag of package records.
pub const PACKAGE_TAG: &str = "Package";

/// Root attribute toggling revision suffixes on produced file names.
pub const REVISION_ATTR: &str = "revision";

/// Root attribute holding the catalog priority of the last run.
pub const PRIORITY_ATTR: &str = "priority";

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// All children in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given tag, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Children with the given tag.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute of the first child with the given tag.
    pub fn child_attr(&self, child: &str, key: &str) -> Option<&str> {
        self.child(child).and_then(|c| c.attr(key))
    }

    /// Append a child.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Insert a child at `index`.
    pub fn insert_child(&mut self, index: usize, child: Element) {
        self.children.insert(index, child);
    }

    /// Remove and return the child at `index`.
    pub fn remove_child(&mut self, index: usize) -> Element {
        self.children.remove(index)
    }

    /// Mutable access to the child list.
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    /// Keep only the children for which `keep` returns true.
    pub fn retain_children(&mut self, keep: impl FnMut(&Element) -> bool) {
        self.children.retain(keep);
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> IndexResult<Element> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| IndexError::Xml(e.to_string()))?;
            match event {
                Event::Start(start) => {
                    let element = element_from_start(&start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| IndexError::Xml("unbalanced closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(IndexError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| IndexError::Xml("document has no root element".to_string()))
    }

    /// Serialize this element as a document, indented with two spaces.
    pub fn to_xml(&self) -> IndexResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_to(&mut writer)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| IndexError::Xml(e.to_string()))
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> IndexResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| IndexError::Xml(e.to_string()))?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| IndexError::Xml(e.to_string()))?;
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| IndexError::Xml(e.to_string()))?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> IndexResult<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| IndexError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| IndexError::Xml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> IndexResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(IndexError::Xml("document has more than one root element".to_string())),
    }
}

/// Named package branch of an index document.
///
/// The root element itself is the default branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// The root element.
    Root,
    /// `InitialPackages`.
    Initial,
    /// `TutorialPackages`.
    Tutorial,
}

impl Branch {
    /// Every branch, in processing order.
    pub const ALL: [Branch; 3] = [Branch::Root, Branch::Initial, Branch::Tutorial];

    /// Child tag of the branch, `None` for the root.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Branch::Root => None,
            Branch::Initial => Some("InitialPackages"),
            Branch::Tutorial => Some("TutorialPackages"),
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().unwrap_or(INDEX_ROOT_TAG))
    }
}

/// An index document: a root element holding package branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    root: Element,
}

impl IndexDocument {
    /// Create an empty document with the given root tag.
    pub fn empty(root_tag: &str) -> Self {
        Self {
            root: Element::new(root_tag),
        }
    }

    /// Wrap an existing root element.
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Parse a document from XML text.
    pub fn parse(xml: &str) -> IndexResult<Self> {
        Element::parse(xml).map(Self::from_root)
    }

    /// Serialize the document.
    pub fn to_xml(&self) -> IndexResult<String> {
        self.root.to_xml()
    }

    /// The root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The root element, mutably.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Root tag name.
    pub fn root_tag(&self) -> &str {
        self.root.name()
    }

    /// Branch element, if present.
    pub fn branch(&self, branch: Branch) -> Option<&Element> {
        match branch.tag() {
            None => Some(&self.root),
            Some(tag) => self.root.child(tag),
        }
    }

    /// Branch element, mutably, if present.
    pub fn branch_mut(&mut self, branch: Branch) -> Option<&mut Element> {
        match branch.tag() {
            None => Some(&mut self.root),
            Some(tag) => self.root.child_mut(tag),
        }
    }

    /// Whether the branch exists.
    pub fn has_branch(&self, branch: Branch) -> bool {
        self.branch(branch).is_some()
    }

    /// Create the branch if missing. Returns true when it was created.
    pub fn ensure_branch(&mut self, branch: Branch) -> bool {
        match branch.tag() {
            Some(tag) if self.root.child(tag).is_none() => {
                self.root.push_child(Element::new(tag));
                true
            }
            _ => false,
        }
    }

    /// Revision mode stored in the document, if any.
    ///
    /// Any integer other than zero counts as enabled.
    pub fn revision(&self) -> Option<bool> {
        self.root
            .attr(REVISION_ATTR)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|v| v != 0)
    }

    /// Store the revision mode.
    pub fn set_revision(&mut self, enabled: bool) {
        self.root
            .set_attr(REVISION_ATTR, if enabled { "1" } else { "0" });
    }

    /// Catalog priority stored in the document, if any.
    pub fn priority(&self) -> Option<u16> {
        self.root
            .attr(PRIORITY_ATTR)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Store the catalog priority.
    pub fn set_priority(&mut self, priority: u16) {
        self.root.set_attr(PRIORITY_ATTR, priority.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DlcIndex revision="1" priority="2">
  <!-- generated -->
  <Package platform="all" unzip="false">
    <FileName val="dlc:buildings-r10.zip" />
    <Language val="en" />
  </Package>
  <InitialPackages>
    <Package platform="ios">
      <FileName val="dlc:menu.zip"/>
    </Package>
  </InitialPackages>
</DlcIndex>
"#;

    #[test]
    fn test_parse_structure() {
        let doc = IndexDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root_tag(), "DlcIndex");
        assert_eq!(doc.revision(), Some(true));
        assert_eq!(doc.priority(), Some(2));

        let root = doc.branch(Branch::Root).unwrap();
        let packages: Vec<_> = root.children_named(PACKAGE_TAG).collect();
        assert_eq!(packages.len(), 1);
        assert_eq!(
            packages[0].child_attr("FileName", "val"),
            Some("dlc:buildings-r10.zip")
        );

        let initial = doc.branch(Branch::Initial).unwrap();
        assert_eq!(initial.children_named(PACKAGE_TAG).count(), 1);
        assert!(!doc.has_branch(Branch::Tutorial));
    }

    #[test]
    fn test_serialize_then_parse_preserves_tree() {
        let doc = IndexDocument::parse(SAMPLE).unwrap();
        let xml = doc.to_xml().unwrap();
        let reparsed = IndexDocument::parse(&xml).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_serialize_indents_and_escapes() {
        let root = Element::new("DlcIndex").with_child(
            Element::new("Package").with_child(Element::new("FileName").with_attr("val", "a&b")),
        );
        let xml = root.to_xml().unwrap();
        assert!(xml.contains("\n  <Package>"));
        assert!(xml.contains("\n    <FileName val=\"a&amp;b\"/>"));
        assert_eq!(Element::parse(&xml).unwrap(), root);
    }

    #[test]
    fn test_set_attr_keeps_position() {
        let mut element = Element::new("Package")
            .with_attr("platform", "all")
            .with_attr("tier", "all");
        element.set_attr("platform", "ios");
        assert_eq!(
            element.attributes(),
            &[
                ("platform".to_string(), "ios".to_string()),
                ("tier".to_string(), "all".to_string())
            ]
        );
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("<a/><b/>").is_err());
        assert!(Element::parse("<a>").is_err());
    }

    #[test]
    fn test_ensure_branch() {
        let mut doc = IndexDocument::empty(INDEX_ROOT_TAG);
        assert!(!doc.ensure_branch(Branch::Root));
        assert!(doc.ensure_branch(Branch::Tutorial));
        assert!(!doc.ensure_branch(Branch::Tutorial));
        assert!(doc.has_branch(Branch::Tutorial));
        assert_eq!(doc.root().children().len(), 1);
    }

    #[test]
    fn test_revision_and_priority_attributes() {
        let mut doc = IndexDocument::empty(INDEX_ROOT_TAG);
        assert_eq!(doc.revision(), None);
        assert_eq!(doc.priority(), None);

        doc.set_revision(false);
        doc.set_priority(5);
        assert_eq!(doc.revision(), Some(false));
        assert_eq!(doc.priority(), Some(5));
        assert_eq!(doc.root().attr("revision"), Some("0"));
    }

    #[test]
    fn test_branch_display() {
        assert_eq!(Branch::Root.to_string(), "DlcIndex");
        assert_eq!(Branch::Initial.to_string(), "InitialPackages");
        assert_eq!(Branch::Tutorial.to_string(), "TutorialPackages");
    }
}
