//! The byte-chunk producer collaborator: "any finite lazy sequence of text
//! fragments" (§1). Kept as a trait, rather than requiring `Iterator` directly,
//! so callers can adapt sources that don't naturally express as one (a socket
//! read loop, a generator driven by a callback) without an intermediate
//! allocation for every fragment.

/// A finite, lazily-pulled source of text fragments.
///
/// The schema core calls `next_chunk` exactly once per "pull one chunk" step
/// in the pump (§4.4) — never more than the read in progress requires.
pub trait ChunkProducer {
    /// Returns the next fragment, or `None` once the source is exhausted.
    fn next_chunk(&mut self) -> Option<String>;
}

/// Any iterator of owned strings is a valid chunk producer.
impl<I> ChunkProducer for I
where
    I: Iterator<Item = String>,
{
    fn next_chunk(&mut self) -> Option<String> {
        self.next()
    }
}
