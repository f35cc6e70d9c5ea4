//! Summarises a virtual byte range of a BGZF-compressed VCF file stored in
//! an object store into aggregate `AC`/`AN` counts.
//!
//! The pipeline, leaf to root: a [`downloader::Downloader`] performs one
//! ranged fetch; a [`window::WindowScheduler`] keeps several of those
//! prefetching into a bounded rotating buffer; a [`block_walker::BlockWalker`]
//! interprets BGZF block framing over that buffer; an
//! [`inflate::InflateStage`] decompresses one block at a time; a
//! [`reader::SliceReader`] fuses all of the above behind a cross-block
//! tokenizer; and [`aggregator::summarise`] drives that tokenizer over VCF
//! records. [`handler::handle`] wires the whole thing to an invocation
//! payload and an [`object_store::ObjectStore`].

pub mod aggregator;
pub mod block_walker;
pub mod downloader;
pub mod error;
pub mod handler;
pub mod inflate;
pub mod object_store;
pub mod reader;
pub mod virtual_offset;
pub mod window;

pub use aggregator::Counts;
pub use handler::{handle, handle_with_counts, HandledSlice};
