//! BGZF Block Walker (§4.3): interprets BGZF block framing inside the
//! rotating buffer arena to find each block's boundaries and uncompressed
//! length.

use std::io;

use crate::window::{WindowScheduler, HEADROOM};

const GZIP_MAGIC: [u8; 4] = [0x1f, 0x8b, 0x08, 0x04];
const XLEN_OFFSET: usize = 10;
const BC_SUBFIELD: [u8; 4] = [b'B', b'C', 2, 0];

fn get16(buf: &[u8], at: usize) -> u16
{
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn get32(buf: &[u8], at: usize) -> u32
{
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Framing details for the block currently loaded into the scratch buffer.
pub struct BlockWalker
{
    pub block_start: usize,
    pub next_block_start: usize,
    pub xlen: u16,
    pub compressed_payload_start: usize,
    /// Authoritative uncompressed length of the current block (`ISIZE`, or
    /// `endUncompressed` verbatim for the slice's final block).
    pub uncompressed_len: u32,
    total_compressed_consumed: u64,
    final_block_distance: u64,
    final_uncompressed: u16,
}

impl BlockWalker
{
    pub fn new(final_block_distance: u64, final_uncompressed: u16) -> Self
    {
        BlockWalker {
            block_start: HEADROOM,
            next_block_start: HEADROOM,
            xlen: 0,
            compressed_payload_start: HEADROOM,
            uncompressed_len: 0,
            total_compressed_consumed: 0,
            final_block_distance,
            final_uncompressed,
        }
    }

    /// `totalCompressedConsumed <= endCompressed - startCompressed`: there
    /// is at least one more block to read after the current one.
    pub fn more_blocks(&self) -> bool
    {
        self.total_compressed_consumed <= self.final_block_distance
    }

    pub fn total_compressed_consumed(&self) -> u64
    {
        self.total_compressed_consumed
    }

    /// `compressedPayloadLen` for the block currently loaded.
    pub fn compressed_payload_len(&self) -> usize
    {
        self.next_block_start - self.block_start - self.xlen as usize - 20
    }

    /// Advance `block_start` to the next block, letting the Window
    /// Scheduler rotate the arena first if needed, then parse the new
    /// block's framing out of the (possibly just-rotated) buffer.
    pub fn advance(&mut self, scheduler: &mut WindowScheduler) -> io::Result<()>
    {
        self.block_start = scheduler.rotate(self.next_block_start)?;
        self.parse_block_details(scheduler.buffer())
    }

    fn parse_block_details(&mut self, buffer: &[u8]) -> io::Result<()>
    {
        let start = self.block_start;
        if buffer[start..start + 4] != GZIP_MAGIC
        {
            log::warn!("Block {} does not start with correct bytes", start);
        }

        let xlen = get16(buffer, start + XLEN_OFFSET) as usize;
        self.xlen = xlen as u16;
        let payload_start = start + 12 + xlen;
        self.compressed_payload_start = payload_start;

        let mut field = start + XLEN_OFFSET + 2;
        let field_end = payload_start;
        let mut bsize = None;
        while field + 4 <= field_end
        {
            let sublen = get16(buffer, field + 2) as usize;
            if buffer[field..field + 4] == BC_SUBFIELD
            {
                bsize = Some(get16(buffer, field + 4));
                break;
            }
            if field + 4 + sublen > field_end
            {
                break;
            }
            field += 4 + sublen;
        }

        let bsize = match bsize
        {
            Some(b) => b,
            None =>
            {
                log::error!("Block {} does not have extra field for BSIZE", start);
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("BGZF block at {} missing BC subfield", start),
                ));
            }
        };

        self.next_block_start = start + bsize as usize + 1;
        self.total_compressed_consumed += (self.next_block_start - start) as u64;

        self.uncompressed_len = if self.more_blocks()
        {
            get32(buffer, self.next_block_start - 4)
        }
        else
        {
            self.final_uncompressed as u32
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn bgzf_block(payload: &[u8], isize_: u32) -> Vec<u8>
    {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        let compressed = enc.finish().unwrap();

        let xlen: u16 = 6;
        let bsize = 12 + xlen as usize + compressed.len() + 8 - 1;
        let mut block = Vec::new();
        block.extend_from_slice(&GZIP_MAGIC);
        block.extend_from_slice(&[0, 0, 0, 0]); // MTIME
        block.push(0); // XFL
        block.push(0xff); // OS
        block.extend_from_slice(&xlen.to_le_bytes());
        block.extend_from_slice(&BC_SUBFIELD);
        block.extend_from_slice(&(bsize as u16).to_le_bytes());
        block.extend_from_slice(&compressed);
        block.extend_from_slice(&[0, 0, 0, 0]); // CRC32 (unchecked by this reimplementation)
        block.extend_from_slice(&isize_.to_le_bytes());
        block
    }

    #[test]
    fn parses_a_single_non_final_block()
    {
        let payload = b"hello world";
        let block = bgzf_block(payload, payload.len() as u32);
        let mut buf = vec![0u8; HEADROOM + block.len()];
        buf[HEADROOM..].copy_from_slice(&block);

        let mut walker = BlockWalker::new(u64::MAX, 0);
        walker.parse_block_details(&buf).unwrap();

        assert_eq!(walker.uncompressed_len, payload.len() as u32);
        assert_eq!(walker.next_block_start, HEADROOM + block.len());
        assert!(walker.more_blocks());
    }

    #[test]
    fn final_block_uses_end_uncompressed_verbatim()
    {
        let payload = b"abcdefghij";
        let block = bgzf_block(payload, payload.len() as u32);
        let mut buf = vec![0u8; HEADROOM + block.len()];
        buf[HEADROOM..].copy_from_slice(&block);

        // final_block_distance 0 means any consumed bytes exceed it: final block.
        let mut walker = BlockWalker::new(0, 4);
        walker.parse_block_details(&buf).unwrap();

        assert_eq!(walker.uncompressed_len, 4);
        assert!(!walker.more_blocks());
    }

    #[test]
    fn missing_bc_subfield_is_fatal()
    {
        let mut block = Vec::new();
        block.extend_from_slice(&GZIP_MAGIC);
        block.extend_from_slice(&[0, 0, 0, 0]);
        block.push(0);
        block.push(0xff);
        block.extend_from_slice(&0u16.to_le_bytes()); // xlen = 0, no subfields
        block.extend_from_slice(&[0u8; 8]); // filler compressed+trailer
        let mut buf = vec![0u8; HEADROOM + block.len()];
        buf[HEADROOM..].copy_from_slice(&block);

        let mut walker = BlockWalker::new(u64::MAX, 0);
        assert!(walker.parse_block_details(&buf).is_err());
    }
}
