//! # Byte Sources
//!
//! The ingestion side of streaming compilation reads module bytes through
//! the [`ByteSource`] two-phase protocol: [`begin_read`](ByteSource::begin_read)
//! exposes the next chunk, [`end_read`](ByteSource::end_read) reports how much
//! of it was consumed. A source that has nothing ready says so and the reader
//! suspends until it is told the source is readable again.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::error::SourceError;

/// Outcome of [`ByteSource::begin_read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// Nothing ready yet; the reader must wait for a readiness notification
    ShouldWait,
    /// A chunk is available. It may be empty.
    Ready(Bytes),
    /// The stream ended normally
    Done,
    /// The stream failed
    Error(SourceError),
}

/// Outcome of [`ByteSource::end_read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReadResult {
    /// More reads may follow
    Ok,
    /// The stream ended with this chunk
    Done,
    /// The stream failed
    Error(SourceError),
}

/// A sequential, single-consumer byte stream
pub trait ByteSource: Send {
    /// Expose the next chunk without consuming it
    fn begin_read(&mut self) -> ReadResult;

    /// Consume `consumed` bytes of the chunk returned by the last `begin_read`
    fn end_read(&mut self, consumed: usize) -> EndReadResult;

    /// Stop producing data; no further reads will be made
    fn cancel(&mut self);
}

/// An in-memory source serving a fixed list of chunks
#[derive(Debug, Default)]
pub struct ChunkedSource {
    chunks: VecDeque<Bytes>,
    cancelled: bool,
}

impl ChunkedSource {
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            cancelled: false,
        }
    }

    /// Serve `data` in chunks of at most `chunk_size` bytes
    pub fn split(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let mut data = data.into();
        let chunk_size = chunk_size.max(1);
        let mut chunks = VecDeque::new();
        while !data.is_empty() {
            let take = chunk_size.min(data.len());
            chunks.push_back(data.split_to(take));
        }
        Self {
            chunks,
            cancelled: false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl ByteSource for ChunkedSource {
    fn begin_read(&mut self) -> ReadResult {
        if self.cancelled {
            return ReadResult::Done;
        }
        match self.chunks.front() {
            Some(chunk) => ReadResult::Ready(chunk.clone()),
            None => ReadResult::Done,
        }
    }

    fn end_read(&mut self, consumed: usize) -> EndReadResult {
        if let Some(front) = self.chunks.front_mut() {
            if consumed >= front.len() {
                self.chunks.pop_front();
            } else {
                front.advance(consumed);
            }
        }
        EndReadResult::Ok
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.chunks.clear();
    }
}

/// Producer half of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::UnboundedSender<Result<Bytes, SourceError>>,
}

impl ChunkSender {
    /// Queue a chunk. Returns `false` if the source is gone or cancelled.
    pub fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(Ok(chunk.into())).is_ok()
    }

    /// Fail the stream
    pub fn fail(&self, error: SourceError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// True once the consumer has cancelled or been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A source fed from another thread or task.
///
/// Dropping every [`ChunkSender`] ends the stream once the queued chunks are
/// read. Reads never block; an empty queue reports [`ReadResult::ShouldWait`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Bytes, SourceError>>,
    current: Option<Bytes>,
    cancelled: bool,
}

impl ChannelSource {
    pub fn new() -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ChunkSender { tx },
            Self {
                rx,
                current: None,
                cancelled: false,
            },
        )
    }
}

impl ByteSource for ChannelSource {
    fn begin_read(&mut self) -> ReadResult {
        if self.cancelled {
            return ReadResult::Done;
        }
        if let Some(chunk) = &self.current {
            return ReadResult::Ready(chunk.clone());
        }

        match self.rx.try_recv() {
            Ok(Ok(chunk)) => {
                self.current = Some(chunk.clone());
                ReadResult::Ready(chunk)
            }
            Ok(Err(e)) => ReadResult::Error(e),
            Err(TryRecvError::Empty) => ReadResult::ShouldWait,
            Err(TryRecvError::Disconnected) => ReadResult::Done,
        }
    }

    fn end_read(&mut self, consumed: usize) -> EndReadResult {
        if let Some(chunk) = self.current.as_mut() {
            if consumed >= chunk.len() {
                self.current = None;
            } else {
                chunk.advance(consumed);
            }
        }
        EndReadResult::Ok
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.current = None;
        self.rx.close();
    }
}
