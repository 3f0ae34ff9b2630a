//! Pull-based access to a response body.

use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;

use crate::errors::StreamError;

/// Yields the raw byte chunks of one response body.
///
/// `Ok(None)` marks the clean end of the body. A returned error is terminal;
/// callers do not poll again afterwards.
#[async_trait::async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
}

type BoxedByteStream<E> = Pin<Box<dyn futures::Stream<Item = Result<Bytes, E>> + Send + 'static>>;

/// Adapts any fallible byte stream (for example `reqwest::Response::bytes_stream`).
pub struct ByteStreamSource<E> {
    inner: BoxedByteStream<E>,
    chunks: u64,
}

impl<E> ByteStreamSource<E>
where
    E: Display + Send + 'static,
{
    pub fn new<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, E>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            chunks: 0,
        }
    }

    /// Chunks yielded so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks
    }
}

#[async_trait::async_trait]
impl<E> ChunkSource for ByteStreamSource<E>
where
    E: Display + Send + 'static,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        match self.inner.next().await {
            Some(Ok(chunk)) => {
                self.chunks += 1;
                Ok(Some(chunk))
            }
            Some(Err(err)) => Err(StreamError::transport(format!("response body read failed: {err}"))),
            None => Ok(None),
        }
    }
}

/// In-memory body split into fixed-size chunks. Used for replaying captured
/// streams.
#[derive(Debug, Clone)]
pub struct StaticSource {
    body: Bytes,
    chunk_size: usize,
}

impl StaticSource {
    pub fn new(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            body: body.into(),
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait::async_trait]
impl ChunkSource for StaticSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        if self.body.is_empty() {
            return Ok(None);
        }
        let take = self.chunk_size.min(self.body.len());
        Ok(Some(self.body.split_to(take)))
    }
}
