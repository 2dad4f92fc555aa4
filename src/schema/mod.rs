//! The schema-directed parsing core (§2, §3, §4): the coupling between the
//! schema registry, the event handler / parse stack, and the lazy pump.
//!
//! `Schema` and `Descriptor` (declared in [`registry`] and [`descriptor`])
//! are the declarative half — what user code writes. This module is the
//! engine half: [`Element`] and [`Document`] back attribute reads with calls
//! into the pump, [`Children`] and [`Texts`] are the repeated-child views,
//! and [`ParserState`] is the single `Rc<RefCell<_>>` that the whole
//! partially-parsed tree shares (§5 "Shared-resource policy").

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::{Rc, Weak};

pub mod descriptor;
pub mod registry;

pub use descriptor::Descriptor;
pub use registry::Schema;

use crate::chunks::ChunkProducer;
use crate::error::{Error, Result};
use crate::schema::registry::{schema_of, ElementSchema, TagDescriptor};
use crate::xml::{Attribute, EventSource, Sink, XmlError};


type NodeHandle = Rc<RefCell<NodeInner>>;

/// What a `data[tag]` entry holds: either a single child/text, or an ordered
/// sequence of them for a `multiple` descriptor (§3 invariant 3).
enum DataValue {
    Single(DataItem),
    Multiple(Vec<DataItem>),
}

/// One entry in a `data[tag]` slot: a nested element for `Child`, or a plain
/// string for `Text` (§4.1 on-start/on-end).
#[derive(Clone)]
enum DataItem {
    Element(NodeHandle),
    Text(String),
}

/// A node in the partial tree (§3 "Element"). Type-erased at this layer —
/// [`Element<K>`] is the typed handle wrapped around one of these.
struct NodeInner {
    schema_fn: fn() -> Result<&'static ElementSchema>,
    content: Option<String>,
    data: HashMap<&'static str, DataValue>,
    #[allow(dead_code)] // kept for completeness of the §3 data model; no accessor currently reads it back
    parent: Option<Weak<RefCell<NodeInner>>>,
    root: Weak<RefCell<ParserState>>,
    stack_top: usize,
}

impl NodeInner {
    fn schema(&self) -> Result<&'static ElementSchema> {
        (self.schema_fn)()
    }
}

/// A parse-stack entry (§3 "ParseFrame"): the tag, the reserved value, and
/// the character buffer accumulated since the matching start-element.
struct ParseFrame {
    tag: String,
    node: NodeHandle,
    kind: FrameKind,
    content: String,
}

enum FrameKind {
    /// The reserved value is the element itself (root, or a `Child`). Its
    /// own content descriptor, if any, is resolved dynamically at
    /// end-element time via `node.schema()`.
    Element,
    /// The reserved value is the *parent* (§4.1: "Text returns parent
    /// itself"); `data_attr` is where the accumulated text is stored.
    Text { data_attr: &'static str, multiple: bool },
}

/// The shared parser state (§5 "Shared-resource policy"): the event source,
/// the chunk producer, and the parse stack, all owned by the document and
/// reached by every other node only through a `Weak` back-reference.
struct ParserState {
    event_source: EventSource,
    producer: Box<dyn ChunkProducer>,
    stack: Vec<ParseFrame>,
    exhausted: bool,
    document_tag: &'static str,
    root_schema_fn: fn() -> Result<&'static ElementSchema>,
    // Captured the instant the root element starts, independent of the
    // stack's later state. A chunk can carry the *entire* document, in which
    // case a single `pump_one` call pushes and pops the root frame before
    // `Document::parse` ever gets to inspect the stack between pumps — the
    // root would be unobservable if the stack were the only source of truth.
    root_node: Option<NodeHandle>,
    self_weak: Weak<RefCell<ParserState>>,
}

impl ParserState {
    /// Pulls and feeds exactly one chunk (§4.4 "pull one chunk"). Returns
    /// `Ok(false)` once the producer is exhausted; never feeds more than one
    /// chunk per call, so callers control exactly how far parsing advances.
    fn pump_one(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let chunk = match self.producer.next_chunk() {
            Some(c) => c,
            None => {
                self.exhausted = true;
                return self.check_clean_eof();
            }
        };
        // Swap the event source out so `self` (containing it) can also be
        // passed as the `&mut dyn Sink` the swapped-out source dispatches
        // into — the two mutable borrows would otherwise alias one struct.
        let mut event_source = std::mem::take(&mut self.event_source);
        let result = event_source.feed(&chunk, self);
        self.event_source = event_source;
        result?;
        Ok(true)
    }

    // Once the producer is exhausted, a non-empty stack or an unparsed tail
    // means the document was truncated or malformed (§7 `Xml`), not just a
    // clean end of input.
    fn check_clean_eof(&mut self) -> Result<bool> {
        if !self.event_source.is_drained() {
            let cause = self
                .event_source
                .take_trailing_error()
                .unwrap_or_else(|| quick_xml::Error::UnexpectedEof("unparsed input remained after the chunk producer was exhausted".into()));
            return Err(Error::Xml(XmlError(cause)));
        }
        if !self.stack.is_empty() {
            return Err(Error::Xml(XmlError(quick_xml::Error::UnexpectedEof(
                "chunk producer exhausted with open elements still on the parse stack".into(),
            ))));
        }
        Ok(false)
    }
}

impl Sink for ParserState {
    fn start_element(&mut self, name: &str, _attributes: &[Attribute]) -> Result<()> {
        if self.stack.is_empty() {
            if name != self.document_tag {
                return Err(Error::SchemaMismatch { expected: self.document_tag, found: name.to_owned() });
            }
            // The root's own schema is recovered from the document tag at
            // `Document::parse` time; see the `root_schema_fn` stashed there.
            let schema_fn = self.root_schema_fn;
            let node = Rc::new(RefCell::new(NodeInner {
                schema_fn,
                content: None,
                data: HashMap::new(),
                parent: None,
                root: self.self_weak.clone(),
                stack_top: self.stack.len() + 1,
            }));
            self.root_node = Some(node.clone());
            self.stack.push(ParseFrame { tag: name.to_owned(), node, kind: FrameKind::Element, content: String::new() });
            return Ok(());
        }

        let parent = self.stack.last().unwrap().node.clone();
        let parent_schema = parent.borrow().schema()?;
        let (_attr, tag_descriptor) = match parent_schema.child_tags.get(name) {
            Some(entry) => entry,
            None => return Err(Error::UnexpectedElement { parent: parent_schema.type_name, tag: name.to_owned() }),
        };

        match tag_descriptor {
            TagDescriptor::Child(child) => {
                let stack_top = self.stack.len() + 1;
                let new_node = Rc::new(RefCell::new(NodeInner {
                    schema_fn: child.child_schema,
                    content: None,
                    data: HashMap::new(),
                    parent: Some(Rc::downgrade(&parent)),
                    root: self.self_weak.clone(),
                    stack_top,
                }));

                {
                    let mut parent_mut = parent.borrow_mut();
                    if child.multiple {
                        match parent_mut.data.entry(child.tag).or_insert_with(|| DataValue::Multiple(Vec::new())) {
                            DataValue::Multiple(v) => v.push(DataItem::Element(new_node.clone())),
                            DataValue::Single(_) => unreachable!("registry guarantees one kind per tag"),
                        }
                    } else {
                        parent_mut.data.insert(child.tag, DataValue::Single(DataItem::Element(new_node.clone())));
                    }
                }

                self.stack.push(ParseFrame { tag: name.to_owned(), node: new_node, kind: FrameKind::Element, content: String::new() });
            }
            TagDescriptor::Text(text) => {
                self.stack.push(ParseFrame {
                    tag: name.to_owned(),
                    node: parent,
                    kind: FrameKind::Text { data_attr: text.tag, multiple: text.multiple },
                    content: String::new(),
                });
            }
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if let Some(frame) = self.stack.last_mut() {
            frame.content.push_str(text);
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        let frame = match self.stack.pop() {
            Some(f) => f,
            None => return Err(Error::MalformedEvents { expected: String::new(), found: name.to_owned() }),
        };
        if frame.tag != name {
            return Err(Error::MalformedEvents { expected: frame.tag, found: name.to_owned() });
        }

        match frame.kind {
            FrameKind::Element => {
                // Resolved outside the `if` condition: a `Ref` borrowed inside
                // an `if` condition stays alive for the whole arm (Rust's
                // temporary-scope rule), which would otherwise alias the
                // `borrow_mut()` below.
                let has_content = frame.node.borrow().schema()?.content.is_some();
                if has_content {
                    frame.node.borrow_mut().content = Some(frame.content);
                }
            }
            FrameKind::Text { data_attr, multiple } => {
                let mut parent_mut = frame.node.borrow_mut();
                if multiple {
                    match parent_mut.data.entry(data_attr).or_insert_with(|| DataValue::Multiple(Vec::new())) {
                        DataValue::Multiple(v) => v.push(DataItem::Text(frame.content)),
                        DataValue::Single(_) => unreachable!("registry guarantees one kind per tag"),
                    }
                } else {
                    parent_mut.data.insert(data_attr, DataValue::Single(DataItem::Text(frame.content)));
                }
            }
        }
        Ok(())
    }
}

/// Drains chunks while `satisfied` is false (§4.4 case B: single-valued
/// descriptor or content reads). Stops the moment the producer is exhausted
/// or the document this node belongs to has already been dropped.
fn pump_until<F: FnMut() -> bool>(node: &NodeHandle, mut satisfied: F) -> Result<()> {
    while !satisfied() {
        let state = match node.borrow().root.upgrade() {
            Some(s) => s,
            None => return Ok(()),
        };
        if !state.borrow_mut().pump_one()? {
            return Ok(());
        }
    }
    Ok(())
}

// True once `node`'s own frame has left the parse stack — "no further
// siblings with this tag can appear" (§4.4 case C).
fn is_closed(state: &ParserState, node: &NodeHandle) -> bool {
    let stack_top = node.borrow().stack_top;
    if state.stack.len() < stack_top {
        return true;
    }
    !Rc::ptr_eq(&state.stack[stack_top - 1].node, node)
}

/// Drains chunks while `satisfied` is false, stopping early once `node`'s
/// own frame leaves the stack (§4.4 case C: repeated-child view reads).
fn pump_until_closed_or<F: FnMut() -> bool>(node: &NodeHandle, mut satisfied: F) -> Result<()> {
    loop {
        if satisfied() {
            return Ok(());
        }
        let state = match node.borrow().root.upgrade() {
            Some(s) => s,
            None => return Ok(()),
        };
        if is_closed(&state.borrow(), node) {
            return Ok(());
        }
        if !state.borrow_mut().pump_one()? {
            return Ok(());
        }
    }
}

fn data_len(node: &NodeHandle, tag: &str) -> usize {
    match node.borrow().data.get(tag) {
        Some(DataValue::Multiple(v)) => v.len(),
        Some(DataValue::Single(_)) => 1,
        None => 0,
    }
}

/// A typed handle onto one node of the partial tree (§3 "Element", §4.5
/// "Element attribute reads delegate to descriptor read semantics").
///
/// `K` is a zero-sized marker type implementing [`Schema`]; concrete element
/// kinds wrap this generic engine in small named accessor methods (see
/// SPEC_FULL.md §9), e.g.:
///
/// ```ignore
/// impl Element<Person> {
///     pub fn name(&self) -> xmlorm::error::Result<Option<String>> { self.text("name") }
///     pub fn urls(&self) -> Children<Url> { self.children("url") }
/// }
/// ```
pub struct Element<K: Schema> {
    node: NodeHandle,
    _marker: PhantomData<K>,
}

impl<K: Schema> Clone for Element<K> {
    fn clone(&self) -> Self {
        Element { node: self.node.clone(), _marker: PhantomData }
    }
}

impl<K: Schema> Element<K> {
    /// Builds a standalone element with no parser behind it, for
    /// programmatically constructing a tree rather than parsing one (§6).
    /// Reads on such an element never block: there is nothing to pump.
    pub fn new() -> Element<K> {
        let node = Rc::new(RefCell::new(NodeInner {
            schema_fn: schema_of::<K>,
            content: None,
            data: HashMap::new(),
            parent: None,
            root: Weak::new(),
            stack_top: 0,
        }));
        Element { node, _marker: PhantomData }
    }

    fn typed(node: NodeHandle) -> Result<Element<K>> {
        let expected = schema_of::<K> as fn() -> Result<&'static ElementSchema>;
        let actual = node.borrow().schema_fn;
        if actual as usize != expected as usize {
            return Err(Error::TypeMismatch { expected: schema_of::<K>()?.type_name, found: actual()?.type_name });
        }
        Ok(Element { node, _marker: PhantomData })
    }

    /// Reads this element's own direct text content (§4.1 `Content`).
    /// Pumps until the element's end-element event fires or input runs out.
    /// `None` both when the schema declares no content descriptor and when
    /// the element simply has no character data yet to report — the
    /// distinction the port makes (§9 open questions) is "not yet known"
    /// (`None`) vs. "known and present, possibly empty" (`Some(String)`).
    pub fn content(&self) -> Result<Option<String>> {
        pump_until(&self.node, || self.node.borrow().content.is_some())?;
        Ok(self.node.borrow().content.clone())
    }

    /// Overwrites the element's direct text content (user assignment, §3
    /// lifecycle: "frozen from the parser's side, but user assignment
    /// remains possible").
    pub fn set_content(&self, value: Option<String>) {
        self.node.borrow_mut().content = value;
    }

    /// Reads a single, optional nested element declared by a `Child`
    /// descriptor for `tag`.
    pub fn child<C: Schema>(&self, tag: &'static str) -> Result<Option<Element<C>>> {
        pump_until(&self.node, || self.node.borrow().data.contains_key(tag))?;
        let item = match self.node.borrow().data.get(tag) {
            None => return Ok(None),
            Some(DataValue::Single(DataItem::Element(h))) => h.clone(),
            Some(_) => unreachable!("schema registry maps {tag:?} to a child descriptor"),
        };
        Element::typed(item).map(Some)
    }

    /// Type-checked assignment for a single-valued `Child` descriptor (§4.1).
    /// The generic parameter `C` enforces the type check at compile time;
    /// see [`Element::typed`] for the defensive runtime check the internal
    /// parser-facing setter still performs.
    pub fn set_child<C: Schema>(&self, tag: &'static str, value: Option<Element<C>>) {
        let mut node = self.node.borrow_mut();
        match value {
            Some(el) => {
                node.data.insert(tag, DataValue::Single(DataItem::Element(el.node)));
            }
            None => {
                node.data.remove(tag);
            }
        }
    }

    /// A lazy sequence facade over a repeated `Child` descriptor (§4.5
    /// "repeated-child view").
    pub fn children<C: Schema>(&self, tag: &'static str) -> Children<C> {
        Children { node: self.node.clone(), tag, _marker: PhantomData }
    }

    /// Type-checked assignment for a repeated `Child` descriptor.
    pub fn set_children<C: Schema>(&self, tag: &'static str, values: Vec<Element<C>>) {
        self.node.borrow_mut().data.insert(tag, DataValue::Multiple(values.into_iter().map(|e| DataItem::Element(e.node)).collect()));
    }

    /// Reads a single, optional text-only nested element (`Text` descriptor).
    pub fn text(&self, tag: &'static str) -> Result<Option<String>> {
        pump_until(&self.node, || self.node.borrow().data.contains_key(tag))?;
        match self.node.borrow().data.get(tag) {
            None => Ok(None),
            Some(DataValue::Single(DataItem::Text(s))) => Ok(Some(s.clone())),
            Some(_) => unreachable!("schema registry maps {tag:?} to a text descriptor"),
        }
    }

    /// Assigns a single text-only nested element.
    pub fn set_text(&self, tag: &'static str, value: Option<String>) {
        let mut node = self.node.borrow_mut();
        match value {
            Some(s) => {
                node.data.insert(tag, DataValue::Single(DataItem::Text(s)));
            }
            None => {
                node.data.remove(tag);
            }
        }
    }

    /// A lazy sequence facade over a repeated `Text` descriptor. Unlike
    /// [`Children`], entries only appear once their end-element has fired
    /// (§4.1: `Text` on-end is where the value is stored at all).
    pub fn texts(&self, tag: &'static str) -> Texts {
        Texts { node: self.node.clone(), tag }
    }

    /// Assigns a repeated text-only nested element.
    pub fn set_texts(&self, tag: &'static str, values: Vec<String>) {
        self.node.borrow_mut().data.insert(tag, DataValue::Multiple(values.into_iter().map(DataItem::Text).collect()));
    }
}

impl<K: Schema> Default for Element<K> {
    fn default() -> Self {
        Element::new()
    }
}

/// The sequence facade for a repeated `Child` descriptor (§2 item 6, §4.5).
///
/// An in-progress child — started but not yet ended — is already visible
/// here as soon as its start-element fires (§4.5 "Note that an in-progress
/// child appears..."); only its own fields fill in lazily as more chunks are
/// fed.
pub struct Children<C: Schema> {
    node: NodeHandle,
    tag: &'static str,
    _marker: PhantomData<C>,
}

impl<C: Schema> Children<C> {
    /// The number of children with this tag observed so far. Drains chunks
    /// until the parent's frame leaves the stack, so the count returned is
    /// final (§4.5 "length").
    pub fn len(&self) -> Result<usize> {
        pump_until_closed_or(&self.node, || false)?;
        Ok(data_len(&self.node, self.tag))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the child at index `i`, pumping only as far as needed to reach
    /// it (§4.5 "indexed read at i"). Fails with `IndexOutOfRange` once the
    /// parent has closed and no such index exists.
    pub fn get(&self, i: usize) -> Result<Element<C>> {
        let node = &self.node;
        let tag = self.tag;
        pump_until_closed_or(node, || data_len(node, tag) > i)?;
        let len = data_len(node, tag);
        if len <= i {
            return Err(Error::IndexOutOfRange { index: i, len });
        }
        let item = match node.borrow().data.get(tag) {
            Some(DataValue::Multiple(v)) => v[i].clone(),
            _ => unreachable!(),
        };
        match item {
            DataItem::Element(h) => Element::typed(h),
            DataItem::Text(_) => unreachable!("schema registry maps {tag:?} to a child descriptor"),
        }
    }

    /// The partially-materialized children observed so far, without driving
    /// the pump any further than whatever has already happened (§4.5
    /// "string form ... never itself drives the pump").
    pub fn partial_len(&self) -> usize {
        data_len(&self.node, self.tag)
    }

    fn is_closed_now(&self) -> bool {
        match self.node.borrow().root.upgrade() {
            Some(state) => is_closed(&state.borrow(), &self.node),
            None => true,
        }
    }
}

impl<C: Schema> fmt::Display for Children<C> {
    /// Renders the currently materialized prefix, with a trailing ellipsis
    /// if more may still arrive — read-only, never advances the pump.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.partial_len();
        write!(f, "[{} of {} {}]", len, if self.is_closed_now() { "" } else { "at least " }, self.tag)
    }
}

/// The sequence facade for a repeated `Text` descriptor. Same pump contract
/// as [`Children`]; items are plain strings instead of typed elements.
pub struct Texts {
    node: NodeHandle,
    tag: &'static str,
}

impl Texts {
    pub fn len(&self) -> Result<usize> {
        pump_until_closed_or(&self.node, || false)?;
        Ok(data_len(&self.node, self.tag))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, i: usize) -> Result<String> {
        let node = &self.node;
        let tag = self.tag;
        pump_until_closed_or(node, || data_len(node, tag) > i)?;
        let len = data_len(node, tag);
        if len <= i {
            return Err(Error::IndexOutOfRange { index: i, len });
        }
        match node.borrow().data.get(tag) {
            Some(DataValue::Multiple(v)) => match &v[i] {
                DataItem::Text(s) => Ok(s.clone()),
                DataItem::Element(_) => unreachable!("schema registry maps {tag:?} to a text descriptor"),
            },
            _ => unreachable!(),
        }
    }
}

/// The distinguished root element (§3 "DocumentElement"): an `Element<K>`
/// plus the parser machinery keeping it alive. `Deref`s to the root element,
/// matching "DocumentElement extends Element".
pub struct Document<K: Schema> {
    root: Element<K>,
    // Kept alive only so the `Rc<RefCell<ParserState>>` outlives every
    // `Weak` reference into it; unused once the document is built, since all
    // reads go through `root`'s own node.
    #[allow(dead_code)]
    state: Option<Rc<RefCell<ParserState>>>,
}

impl<K: Schema> Deref for Document<K> {
    type Target = Element<K>;
    fn deref(&self) -> &Element<K> {
        &self.root
    }
}

impl<K: Schema> Document<K> {
    /// Builds an empty document for programmatic tree construction (§6 "A
    /// document can also be constructed empty"), rather than from a byte
    /// stream. Still requires `K::document_tag()` to validate the schema is
    /// usable as a document root — matching the parsing path's
    /// `SchemaIncomplete` check.
    pub fn empty() -> Result<Document<K>> {
        K::document_tag().ok_or(Error::SchemaIncomplete { type_name: std::any::type_name::<K>() })?;
        Ok(Document { root: Element::new(), state: None })
    }

    /// Parses `producer` as a document of kind `K` (§4.4 case A: "feed
    /// chunks until the stack becomes non-empty or input is exhausted").
    ///
    /// Fails with `SchemaIncomplete` if `K` declares no document tag,
    /// `SchemaMismatch` if the root element's name doesn't match it, and
    /// `Error::Xml` if the producer is exhausted before any root element
    /// appears at all.
    pub fn parse<P>(producer: P) -> Result<Document<K>>
    where
        P: ChunkProducer + 'static,
    {
        let document_tag = K::document_tag().ok_or(Error::SchemaIncomplete { type_name: std::any::type_name::<K>() })?;

        let state = Rc::new(RefCell::new(ParserState {
            event_source: EventSource::new(),
            producer: Box::new(producer),
            stack: Vec::new(),
            exhausted: false,
            document_tag,
            root_schema_fn: schema_of::<K>,
            root_node: None,
            self_weak: Weak::new(),
        }));
        state.borrow_mut().self_weak = Rc::downgrade(&state);

        loop {
            if state.borrow().root_node.is_some() {
                break;
            }
            if !state.borrow_mut().pump_one()? {
                break;
            }
        }

        let root_node = match state.borrow().root_node.clone() {
            Some(node) => node,
            None => {
                return Err(Error::Xml(XmlError(quick_xml::Error::UnexpectedEof(
                    "chunk producer was exhausted before any root element appeared".into(),
                ))))
            }
        };

        Ok(Document { root: Element { node: root_node, _marker: PhantomData }, state: Some(state) })
    }
}
