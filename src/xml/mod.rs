//! The low-level XML event source.
//!
//! This is the `feed(chunk)` collaborator described by the schema core: a thin,
//! incremental wrapper around `quick-xml`'s pull reader that turns whatever text
//! fragments the caller hands it into `start_element`/`characters`/`end_element`
//! callbacks on a [`Sink`]. It is deliberately ignorant of schemas, parse stacks
//! or reserved values — all of that lives one layer up, in `crate::schema`.
//!
//! Unlike `feed-rs`'s `ElementSource` (which owns a single `BufRead` for the
//! whole document and pulls from it on demand), this source is *fed* data from
//! outside: each call to [`EventSource::feed`] appends one chunk to a retained,
//! unconsumed tail and re-parses from the start of that tail. Any token that
//! doesn't fully fit in the buffer yet (e.g. a chunk boundary that falls inside
//! a tag) is simply left unconsumed for the next `feed` call to pick up. Such a
//! partial tail looks identical, from this layer's point of view, to a
//! genuinely truncated document — telling the two apart is the pump's job
//! (§4.4), once it knows whether the producer has anything left to give.

use std::error::Error as StdError;
use std::fmt;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;


/// Wraps the underlying `quick-xml` error so the rest of the crate never
/// names that dependency directly (mirrors `feed-rs`'s own `XmlError`).
#[derive(Debug)]
pub struct XmlError(pub(crate) quick_xml::Error);

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for XmlError {}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError(e)
    }
}

/// A name/value pair for an XML attribute (carried but currently unread by the
/// handler layer above — see the Design Notes on `Attribute` descriptors).
#[derive(Debug, Clone)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: String,
}

/// Callbacks the event source drives as it consumes buffered input.
///
/// This is the Rust realization of the abstract "low-level XML event source"
/// collaborator: any type that can react to start/characters/end events in
/// stream order conforms, regardless of how it chooses to react. Returning
/// `Err` aborts dispatch of the current `feed` call immediately — used by the
/// handler above to surface `UnexpectedElement`, `SchemaMismatch` and
/// `MalformedEvents` the moment they're detected.
pub(crate) trait Sink {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> Result<()>;
    fn characters(&mut self, text: &str) -> Result<()>;
    fn end_element(&mut self, name: &str) -> Result<()>;
}

/// Incremental event source, fed one text chunk at a time.
#[derive(Default)]
pub(crate) struct EventSource {
    // Retained unconsumed tail: bytes appended by `feed` that the reader has
    // not yet turned into a complete event. Always starts at the first
    // unconsumed byte - we drain the consumed prefix after every feed.
    buffer: String,
    // The most recent reason the reader stopped short of the end of the
    // buffer. Cleared on every feed that fully drains the buffer. Used only
    // to build a diagnostic once the pump knows input has truly run out.
    trailing_error: Option<quick_xml::Error>,
}

impl EventSource {
    pub(crate) fn new() -> EventSource {
        EventSource { buffer: String::new(), trailing_error: None }
    }

    /// Appends `chunk` to the retained buffer and dispatches as many complete
    /// events as are now available to `sink`. Stops cleanly when the buffer
    /// is exhausted or ends mid-token; the remainder is kept for the next
    /// call. Returns early with `Err` only if `sink` itself rejects an event.
    pub(crate) fn feed(&mut self, chunk: &str, sink: &mut dyn Sink) -> Result<()> {
        self.buffer.push_str(chunk);
        self.trailing_error = None;

        let mut reader = Reader::from_str(&self.buffer);
        reader.config_mut().expand_empty_elements = true;
        reader.config_mut().trim_text(false);

        let mut consumed = 0usize;
        let result = loop {
            match reader.read_event() {
                Ok(Event::Eof) => break Ok(()),

                Ok(Event::Start(e)) => {
                    let name = decode_name(e.name().as_ref());
                    let attributes = decode_attributes(&e);
                    if let Err(err) = sink.start_element(&name, &attributes) {
                        break Err(err);
                    }
                    consumed = reader.buffer_position() as usize;
                }

                Ok(Event::End(e)) => {
                    let name = decode_name(e.name().as_ref());
                    if let Err(err) = sink.end_element(&name) {
                        break Err(err);
                    }
                    consumed = reader.buffer_position() as usize;
                }

                Ok(Event::Text(e)) => {
                    if let Ok(text) = e.unescape() {
                        if !text.is_empty() {
                            if let Err(err) = sink.characters(&text) {
                                break Err(err);
                            }
                        }
                    }
                    consumed = reader.buffer_position() as usize;
                }

                Ok(Event::CData(e)) => {
                    if let Ok(text) = std::str::from_utf8(e.as_ref()) {
                        if let Err(err) = sink.characters(text) {
                            break Err(err);
                        }
                    }
                    consumed = reader.buffer_position() as usize;
                }

                // Comments, processing instructions, doctypes, the XML
                // declaration: not interesting to the schema layer, but fully
                // consumed so we don't re-parse them on the next feed.
                Ok(_) => {
                    consumed = reader.buffer_position() as usize;
                }

                // The buffer ends mid-token (could be a genuine chunk
                // boundary, or genuinely malformed XML if no more chunks ever
                // arrive). Retain the unconsumed tail and let the pump decide
                // once it knows whether the producer is exhausted.
                Err(e) => {
                    self.trailing_error = Some(e);
                    break Ok(());
                }
            }
        };

        self.buffer.drain(..consumed);
        result
    }

    /// True once every fed byte has been turned into a dispatched event.
    pub(crate) fn is_drained(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    /// Consumes and returns the reason the reader last stopped short of the
    /// end of the buffer, if any. Meaningful only once the producer is known
    /// to be exhausted — see `ParserState::pump_chunk`.
    pub(crate) fn take_trailing_error(&mut self) -> Option<quick_xml::Error> {
        self.trailing_error.take()
    }
}

// Strips a namespace prefix, matching feed-rs's `XmlEvent::parse_name`: this
// core addresses elements by local name only (see §4.3 — namespace-aware
// child lookup is not part of this schema model).
fn decode_name(bytes: &[u8]) -> String {
    let name = String::from_utf8_lossy(bytes).into_owned();
    match name.find(':') {
        Some(index) => name[index + 1..].to_owned(),
        None => name,
    }
}

fn decode_attributes(start: &quick_xml::events::BytesStart) -> Vec<Attribute> {
    start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| Attribute {
            name: decode_name(a.key.as_ref()),
            value: a.unescape_value().unwrap_or_default().into_owned(),
        })
        .collect()
}
