use xmlorm::error::{Error, Result};
use xmlorm::schema::{Descriptor, Document, Element, Schema};

struct Feed;
impl Schema for Feed {
    fn document_tag() -> Option<&'static str> {
        Some("feed")
    }
    fn descriptors() -> Vec<Descriptor> {
        vec![
            Descriptor::required_text("title", "title").unwrap(),
            Descriptor::children::<Entry>("entries", "entry").unwrap(),
        ]
    }
}

struct Entry;
impl Schema for Entry {
    fn descriptors() -> Vec<Descriptor> {
        vec![Descriptor::required_text("title", "title").unwrap(), Descriptor::text("summary", "summary").unwrap()]
    }
}

impl Element<Feed> {
    fn title(&self) -> Result<Option<String>> {
        self.text("title")
    }
    fn entries(&self) -> xmlorm::schema::Children<Entry> {
        self.children("entry")
    }
}

impl Element<Entry> {
    fn title(&self) -> Result<Option<String>> {
        self.text("title")
    }
    fn summary(&self) -> Result<Option<String>> {
        self.text("summary")
    }
}

const FEED_XML: &str = r#"
<feed>
  <title>Example Feed</title>
  <entry>
    <title>First post</title>
    <summary>Hello, world!</summary>
  </entry>
  <entry>
    <title>Second post</title>
  </entry>
</feed>
"#;

fn chunks(source: &str, size: usize) -> impl Iterator<Item = String> {
    source.as_bytes().chunks(size).map(|c| String::from_utf8_lossy(c).into_owned()).collect::<Vec<_>>().into_iter()
}

#[test]
fn test_reads_a_flat_document_split_across_many_chunks() {
    let feed = Document::<Feed>::parse(chunks(FEED_XML, 7)).unwrap();
    assert_eq!(feed.title().unwrap().as_deref(), Some("Example Feed"));

    let entries = feed.entries();
    assert_eq!(entries.len().unwrap(), 2);

    let first = entries.get(0).unwrap();
    assert_eq!(first.title().unwrap().as_deref(), Some("First post"));
    assert_eq!(first.summary().unwrap().as_deref(), Some("Hello, world!"));

    let second = entries.get(1).unwrap();
    assert_eq!(second.title().unwrap().as_deref(), Some("Second post"));
    assert_eq!(second.summary().unwrap(), None);
}

#[test]
fn test_whole_document_in_a_single_chunk() {
    let feed = Document::<Feed>::parse(std::iter::once(FEED_XML.to_owned())).unwrap();
    assert_eq!(feed.title().unwrap().as_deref(), Some("Example Feed"));
    assert_eq!(feed.entries().len().unwrap(), 2);
}

#[test]
fn test_index_out_of_range_is_reported_once_the_feed_has_closed() {
    let feed = Document::<Feed>::parse(chunks(FEED_XML, 32)).unwrap();
    let entries = feed.entries();
    let err = entries.get(10).unwrap_err();
    match err {
        Error::IndexOutOfRange { index, len } => {
            assert_eq!(index, 10);
            assert_eq!(len, 2);
        }
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }
}

#[test]
fn test_unknown_child_element_is_rejected() {
    let xml = "<feed><title>t</title><bogus/></feed>";
    let feed = Document::<Feed>::parse(chunks(xml, 5)).unwrap();
    let err = feed.entries().len().unwrap_err();
    assert!(matches!(err, Error::UnexpectedElement { tag, .. } if tag == "bogus"));
}

#[test]
fn test_root_tag_mismatch_is_rejected() {
    let err = Document::<Feed>::parse(chunks("<rss><title>t</title></rss>", 5)).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { expected: "feed", .. }));
}

#[test]
fn test_empty_document_can_be_built_and_populated_programmatically() {
    let feed = Document::<Feed>::empty().unwrap();
    feed.set_text("title", Some("Built by hand".to_owned()));

    let entry = Element::<Entry>::new();
    entry.set_text("title", Some("Only entry".to_owned()));
    feed.set_children("entry", vec![entry]);

    assert_eq!(feed.title().unwrap().as_deref(), Some("Built by hand"));
    assert_eq!(feed.entries().len().unwrap(), 1);
    assert_eq!(feed.entries().get(0).unwrap().title().unwrap().as_deref(), Some("Only entry"));
}

#[test]
fn test_entries_without_a_document_tag_cannot_be_parsed_as_a_root() {
    let err = Document::<Entry>::parse(chunks("<entry><title>t</title></entry>", 5)).unwrap_err();
    assert!(matches!(err, Error::SchemaIncomplete { .. }));
}
