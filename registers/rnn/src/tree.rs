// Licensed under the Apache-2.0 license

//! Minimal markup tree used by the loader.
//!
//! The loader only needs to walk elements, read attributes and report line
//! numbers, so the document is materialized into a small owned tree with
//! `quick-xml` and the rest of the crate never touches the parser directly.

use crate::error::TreeError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A single `name="value"` attribute, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// An element with its attributes, child elements and trimmed text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified tag name as written (`xsi:foo` keeps its prefix).
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element.
    pub text: String,
    /// 1-based line of the opening tag.
    pub line: u32,
}

impl Element {
    /// Look up an attribute by its exact qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Look up an attribute by local name, ignoring any namespace prefix.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.rsplit(':').next() == Some(local))
            .map(|a| a.value.as_str())
    }
}

/// Tracks line numbers for monotonically increasing byte offsets.
struct LineCounter<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> LineCounter<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> u32 {
        let offset = offset.min(self.bytes.len());
        if offset > self.pos {
            self.line += self.bytes[self.pos..offset]
                .iter()
                .filter(|b| **b == b'\n')
                .count() as u32;
            self.pos = offset;
        }
        self.line
    }
}

fn syntax(line: u32, message: impl ToString) -> TreeError {
    TreeError::Syntax {
        line,
        message: message.to_string(),
    }
}

fn element(start: &BytesStart, line: u32) -> Result<Element, TreeError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| syntax(line, e))?
        .to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(line, e))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| syntax(line, e))?
            .to_string();
        let value = attr.unescape_value().map_err(|e| syntax(line, e))?;
        attrs.push(Attribute {
            name: key,
            value: value.into_owned(),
        });
    }
    Ok(Element {
        name,
        attrs,
        line,
        ..Default::default()
    })
}

fn attach(stack: &mut [Element], roots: &mut Vec<Element>, mut el: Element) {
    el.text = el.text.trim().to_string();
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => roots.push(el),
    }
}

/// Parse a document and return its top-level elements.
///
/// Well-formed documents have exactly one; callers decide what to do with
/// stray extra roots.
pub fn parse(text: &str) -> Result<Vec<Element>, TreeError> {
    let mut reader = Reader::from_str(text);
    let mut lines = LineCounter::new(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots = Vec::new();

    loop {
        let start = reader.buffer_position() as usize;
        let line = lines.line_at(start);
        match reader.read_event().map_err(|e| syntax(line, e))? {
            Event::Start(e) => stack.push(element(&e, line)?),
            Event::Empty(e) => {
                let el = element(&e, line)?;
                attach(&mut stack, &mut roots, el);
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| syntax(line, "unexpected closing tag"))?;
                attach(&mut stack, &mut roots, el);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(|e| syntax(line, e))?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(syntax(
            lines.line_at(text.len()),
            format!("unclosed element <{}>", open.name),
        ));
    }
    if roots.is_empty() {
        return Err(TreeError::Empty);
    }
    Ok(roots)
}
