//! The fused sliced-BGZF reader: ties the Window Scheduler, BGZF Block
//! Walker, Inflate Stage, and the cross-block Field Cursor (§4.5) together
//! into the one cohesive pipeline spec.md §2 describes ("Aggregator ⇢
//! Tokenizer ⇢ Block Walker ⇢ Inflate Stage").

use std::io;
use std::sync::Arc;

use crate::block_walker::BlockWalker;
use crate::inflate::InflateStage;
use crate::object_store::ObjectStore;
use crate::virtual_offset::SliceDescriptor;
use crate::window::WindowScheduler;

/// A token returned by [`SliceReader::read_until_any`]: either a zero-copy
/// view into the scratch buffer (the token lay entirely in one block) or a
/// view into the overflow buffer (the token straddled a block boundary).
/// Property P5 of spec.md §8 is this distinction: callers that only ever
/// see `Scratch` variants know no cross-block copy occurred.
pub enum Token<'a>
{
    Scratch(&'a [u8]),
    Overflow(&'a [u8]),
}

impl<'a> Token<'a>
{
    pub fn as_bytes(&self) -> &[u8]
    {
        match self
        {
            Token::Scratch(b) => b,
            Token::Overflow(b) => b,
        }
    }

    pub fn len(&self) -> usize
    {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

pub struct SliceReader
{
    scheduler: WindowScheduler,
    walker: BlockWalker,
    inflate: InflateStage,
    overflow: Vec<u8>,
    char_pos: u64,
    overflow_activations: u64,
}

impl SliceReader
{
    pub fn open(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        slice: SliceDescriptor,
    ) -> io::Result<Self>
    {
        let total_compressed = slice.end_compressed - slice.start_compressed;
        let scheduler = WindowScheduler::new(store, bucket.into(), key.into(), slice.start_compressed, total_compressed)?;
        let walker = BlockWalker::new(total_compressed, slice.end_uncompressed);
        let inflate = InflateStage::new();

        let mut reader =
            SliceReader { scheduler, walker, inflate, overflow: Vec::new(), char_pos: 0, overflow_activations: 0 };

        reader.walker.advance(&mut reader.scheduler)?;
        reader.inflate_current_block()?;
        reader.seek(slice.start_uncompressed as u64)?;
        Ok(reader)
    }

    fn inflate_current_block(&mut self) -> io::Result<()>
    {
        let start = self.walker.compressed_payload_start;
        let len = self.walker.compressed_payload_len();
        let payload = &self.scheduler.buffer()[start..start + len];
        self.inflate.inflate_block(payload, self.walker.uncompressed_len)
    }

    fn block_uncompressed_len(&self) -> u64
    {
        self.walker.uncompressed_len as u64
    }

    fn current_block(&self) -> &[u8]
    {
        &self.inflate.scratch()[..self.walker.uncompressed_len as usize]
    }

    /// `keepReading()`: there is more data either in a later block or
    /// still unread in the current one.
    pub fn keep_reading(&self) -> bool
    {
        self.walker.more_blocks() || self.char_pos < self.block_uncompressed_len()
    }

    pub fn total_compressed_consumed(&self) -> u64
    {
        self.walker.total_compressed_consumed()
    }

    pub fn blocks_read(&self) -> u64
    {
        self.inflate.reads()
    }

    pub fn overflow_activations(&self) -> u64
    {
        self.overflow_activations
    }

    /// `getNextBlock()`: move to the next block if the cursor has read past
    /// the end of the current one. Returns `keep_reading()` afterwards.
    fn advance_block(&mut self) -> io::Result<bool>
    {
        if self.walker.more_blocks() && self.char_pos >= self.block_uncompressed_len()
        {
            self.char_pos -= self.block_uncompressed_len();
            self.walker.advance(&mut self.scheduler)?;
            self.inflate_current_block()?;
        }
        Ok(self.keep_reading())
    }

    /// `seek(n)`: advance the cursor by `n` uncompressed bytes, crossing
    /// block boundaries transparently.
    pub fn seek(&mut self, n: u64) -> io::Result<bool>
    {
        self.char_pos += n;
        if self.char_pos < self.block_uncompressed_len()
        {
            return Ok(self.keep_reading());
        }
        while self.block_uncompressed_len() <= self.char_pos
        {
            if !self.advance_block()?
            {
                break;
            }
        }
        Ok(self.keep_reading())
    }

    /// `skipPast<N, delim>`: advance past the `n`-th (1-indexed)
    /// occurrence of `delim`. Returns `false` at end-of-slice.
    pub fn skip_past(&mut self, n: usize, delim: u8) -> io::Result<bool>
    {
        let mut remaining = n;
        loop
        {
            let block = self.current_block();
            let pos = self.char_pos as usize;
            if pos < block.len()
            {
                if let Some(rel) = memchr::memchr(delim, &block[pos..])
                {
                    self.char_pos = (pos + rel + 1) as u64;
                    remaining -= 1;
                    if remaining == 0
                    {
                        return Ok(true);
                    }
                    continue;
                }
            }
            self.char_pos = self.block_uncompressed_len();
            if !self.advance_block()?
            {
                return Ok(false);
            }
        }
    }

    /// `skipPastAndCountChars`: advance past the next `delim`, returning
    /// the number of `\t`, `/`, `|`, or `;` characters seen en route.
    pub fn skip_past_and_count(&mut self, delim: u8) -> io::Result<u64>
    {
        let mut count = 0u64;
        loop
        {
            let block = self.current_block();
            let mut pos = self.char_pos as usize;
            while pos < block.len()
            {
                let c = block[pos];
                if c == b'\t' || c == b'/' || c == b'|' || c == b';'
                {
                    count += 1;
                }
                pos += 1;
                if c == delim
                {
                    self.char_pos = pos as u64;
                    return Ok(count);
                }
            }
            self.char_pos = self.block_uncompressed_len();
            if !self.advance_block()?
            {
                return Ok(count);
            }
        }
    }

    /// `readPastChars<delims>`: read characters until any delimiter in
    /// `delims` is hit, returning the delimiter and a view of the token.
    /// Straddling blocks is handled by appending each block's contribution
    /// to the overflow buffer; end-of-slice before a delimiter returns
    /// `(0, accumulated bytes)`.
    pub fn read_until_any(&mut self, delims: &[u8]) -> io::Result<(u8, Token<'_>)>
    {
        let mut start = self.char_pos as usize;
        let mut straddled = false;
        self.overflow.clear();

        loop
        {
            let block_len = self.walker.uncompressed_len as usize;
            let scratch = self.inflate.scratch();
            if start < block_len
            {
                if let Some(rel) = find_any(&scratch[start..block_len], delims)
                {
                    let delim_pos = start + rel;
                    let delim = scratch[delim_pos];
                    self.char_pos = (delim_pos + 1) as u64;
                    return if straddled
                    {
                        self.overflow.extend_from_slice(&scratch[start..delim_pos]);
                        Ok((delim, Token::Overflow(&self.overflow)))
                    }
                    else
                    {
                        Ok((delim, Token::Scratch(&self.inflate.scratch()[start..delim_pos])))
                    };
                }

                self.overflow.extend_from_slice(&scratch[start..block_len]);
                straddled = true;
                self.overflow_activations += 1;
            }

            self.char_pos = block_len as u64;
            if !self.advance_block()?
            {
                return Ok((0u8, Token::Overflow(&self.overflow)));
            }
            start = 0;
        }
    }
}

fn find_any(haystack: &[u8], delims: &[u8]) -> Option<usize>
{
    match delims
    {
        [a] => memchr::memchr(*a, haystack),
        [a, b] => memchr::memchr2(*a, *b, haystack),
        [a, b, c] => memchr::memchr3(*a, *b, *c, haystack),
        _ => haystack.iter().position(|c| delims.contains(c)),
    }
}
