//! Error types for the slice summarizer.
//!
//! The reader stack (window/block_walker/inflate/cursor) keeps the
//! `io::Error` convention used throughout the teacher crate's BGZF reader:
//! download failures, BGZF framing violations, and decompression failures
//! (spec error kinds 2, 3, and 4) all surface from that stack as plain
//! `io::Error`s with a descriptive `ErrorKind`, the same way the teacher's
//! `bgzf.rs`/`remote.rs` do. This module adds a `thiserror`-derived enum only
//! for the one failure domain the reader stack can't express itself: bad
//! invocation input (spec error kind 1), plus wrapping the reader stack's
//! `io::Error` and the handler's JSON parsing errors transparently.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SliceError
{
    #[error("malformed invocation input: {0}")]
    BadInput(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SliceError>;
