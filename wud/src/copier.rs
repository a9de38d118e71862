//! Window copies and the bounded streaming pipe.
//!
//! [`copy_range`] drives a [`ContentDecrypter`] across an arbitrary byte
//! window into a caller-supplied sink, chunk by chunk, so callers never
//! deal with sector or block sizes. [`stream_range`] runs the same loop on
//! a background thread and hands the bytes over through a bounded channel;
//! back-pressure falls out of the channel capacity, and dropping the
//! consumer stops the producer.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use crate::Error;
use crate::decrypt::ContentDecrypter;

/// Alignment units pulled from the engine per chunk after the first.
const CHUNK_UNITS: u64 = 16;

/// Chunks buffered between the producer thread and the consumer.
const PIPE_DEPTH: usize = 4;

/// A copy that stopped on a fatal error, carrying how many bytes made it
/// into the sink first so callers can judge the partial result.
#[derive(Debug)]
pub struct CopyError {
    pub produced: u64,
    pub source: Error,
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copy stopped after {:#x} bytes: {}",
            self.produced, self.source
        )
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// End of the chunk starting at `pos`: stop at the next alignment boundary
/// first so every following chunk is unit-aligned.
fn chunk_end(pos: u64, end: u64, unit: u64) -> u64 {
    let target = if pos % unit != 0 {
        (pos / unit + 1) * unit
    } else {
        pos + CHUNK_UNITS * unit
    };
    target.min(end)
}

/// Fill `sink` with `length` decrypted bytes starting at `offset`.
///
/// Returns the number of bytes produced, which equals `length` on
/// success; any shortfall surfaces as an error, never silently.
pub fn copy_range(
    dec: &ContentDecrypter,
    offset: u64,
    length: u64,
    sink: &mut dyn Write,
) -> std::result::Result<u64, CopyError> {
    let unit = dec.chunk_unit() as u64;
    let end = offset + length;
    let mut produced = 0;
    let mut pos = offset;

    while pos < end {
        let target = chunk_end(pos, end, unit);
        let chunk = dec
            .read(pos, (target - pos) as usize)
            .map_err(|source| CopyError { produced, source })?;
        sink.write_all(&chunk).map_err(|e| CopyError {
            produced,
            source: Error::Io(e),
        })?;
        produced += chunk.len() as u64;
        pos = target;
    }
    Ok(produced)
}

/// Decrypt `[offset, offset + length)` on a background thread and expose
/// the bytes as a [`Read`] stream.
///
/// The producer blocks once [`PIPE_DEPTH`] chunks are in flight; dropping
/// the returned stream disconnects the pipe and the producer exits
/// normally. A fatal producer error becomes the stream's final item.
pub fn stream_range(dec: ContentDecrypter, offset: u64, length: u64) -> ContentStream {
    let (tx, rx) = sync_channel(PIPE_DEPTH);
    thread::spawn(move || produce(dec, offset, length, tx));
    ContentStream {
        rx,
        current: Vec::new(),
        pos: 0,
        done: false,
    }
}

fn produce(dec: ContentDecrypter, offset: u64, length: u64, tx: SyncSender<io::Result<Vec<u8>>>) {
    let unit = dec.chunk_unit() as u64;
    let end = offset + length;
    let mut pos = offset;

    while pos < end {
        let target = chunk_end(pos, end, unit);
        match dec.read(pos, (target - pos) as usize) {
            Ok(chunk) => {
                if tx.send(Ok(chunk)).is_err() {
                    // Consumer hung up; normal termination.
                    return;
                }
                pos = target;
            }
            Err(e) => {
                let _ = tx.send(Err(io::Error::from(e)));
                return;
            }
        }
    }
}

/// Readable end of the streaming pipe returned by [`stream_range`].
pub struct ContentStream {
    rx: Receiver<io::Result<Vec<u8>>>,
    current: Vec<u8>,
    pos: usize,
    done: bool,
}

impl Read for ContentStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.current.len() {
                let n = out.len().min(self.current.len() - self.pos);
                out[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.done || out.is_empty() {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                // Producer finished and dropped its sender.
                Err(_) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }
    }
}
