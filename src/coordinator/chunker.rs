//! Fixed-window chunking of an upload stream
//!
//! The input arrives as an arbitrary sequence of byte buffers (multipart
//! frames, file reads, ...). `split` re-cuts it into windows of exactly
//! `chunk_size` bytes; only the last window may be shorter. Each window is
//! tagged with its content identifier.

use crate::common::{chunk_id, Error, Result};
use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

/// A chunk cut from an upload stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Position in the stream, starting at 0
    pub index: usize,
    pub id: String,
    pub data: Bytes,
}

impl RawChunk {
    fn new(index: usize, data: Bytes) -> Self {
        Self {
            index,
            id: chunk_id(&data),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Split a byte stream into fixed-size chunks.
///
/// Single pass and lazy: the source is only polled when the next chunk is
/// requested. The first source error is yielded and ends the stream.
pub fn split<S>(source: S, chunk_size: usize) -> impl Stream<Item = Result<RawChunk>>
where
    S: Stream<Item = Result<Bytes>>,
{
    try_stream! {
        if chunk_size == 0 {
            Err::<(), _>(Error::InvalidConfig("chunk_size must be greater than zero".into()))?;
        }
        futures_util::pin_mut!(source);
        let mut window = BytesMut::with_capacity(chunk_size);
        let mut index = 0usize;

        while let Some(piece) = source.next().await {
            let mut piece = piece?;
            while !piece.is_empty() {
                let take = (chunk_size - window.len()).min(piece.len());
                window.extend_from_slice(&piece.split_to(take));
                if window.len() == chunk_size {
                    let full = window.split().freeze();
                    yield RawChunk::new(index, full);
                    index += 1;
                }
            }
        }

        if !window.is_empty() {
            yield RawChunk::new(index, window.freeze());
        }
    }
}

/// Wrap an in-memory buffer as a single-item source for `split`
pub fn once(data: impl Into<Bytes>) -> impl Stream<Item = Result<Bytes>> {
    futures_util::stream::iter(std::iter::once(Ok(data.into())))
}
