//! Inflate Stage (§4.4): decompresses one BGZF block's deflate payload into
//! a fixed 64 KiB scratch buffer, reusing a single `Decompress` state across
//! calls (reset between blocks rather than recreated), matching `fastx`'s
//! use of `flate2::Decompress` for BGZF blocks in `bgzf.rs`.

use std::io;

use flate2::Decompress;

const SCRATCH_LEN: usize = 65_536;

pub struct InflateStage
{
    decompress: Decompress,
    scratch: [u8; SCRATCH_LEN],
    reads: u64,
}

impl InflateStage
{
    pub fn new() -> Self
    {
        InflateStage { decompress: Decompress::new(false), scratch: [0u8; SCRATCH_LEN], reads: 0 }
    }

    pub fn scratch(&self) -> &[u8]
    {
        &self.scratch
    }

    /// Inflate `compressed` (a raw-deflate payload, no zlib/gzip wrapper)
    /// into the scratch buffer. Must produce exactly `expected_len` bytes;
    /// a shortfall is fatal (spec.md §4.4/§4.7 kind 4).
    pub fn inflate_block(&mut self, compressed: &[u8], expected_len: u32) -> io::Result<()>
    {
        self.decompress.reset(false);
        let before_out = self.decompress.total_out();
        let start = std::time::Instant::now();
        let status = self
            .decompress
            .decompress(compressed, &mut self.scratch[..expected_len as usize], flate2::FlushDecompress::Finish)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("inflate failed: {}", e)))?;
        let produced = self.decompress.total_out() - before_out;
        self.reads += 1;
        log::trace!(
            "Inflate took {:?} to inflate {} bytes into {} bytes on read {}",
            start.elapsed(),
            compressed.len(),
            produced,
            self.reads
        );

        if produced != expected_len as u64 || status == flate2::Status::BufError
        {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("inflate produced {} bytes, expected {}", produced, expected_len),
            ));
        }
        Ok(())
    }

    pub fn reads(&self) -> u64
    {
        self.reads
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn inflates_exactly_one_block_at_a_time()
    {
        let mut stage = InflateStage::new();
        let payload = b"some vcf-ish bytes\tfor a single block\n";

        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        let compressed = enc.finish().unwrap();

        stage.inflate_block(&compressed, payload.len() as u32).unwrap();
        assert_eq!(&stage.scratch()[..payload.len()], payload);
        assert_eq!(stage.reads(), 1);
    }

    #[test]
    fn shortfall_is_an_error()
    {
        let mut stage = InflateStage::new();
        let payload = b"short";
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        let compressed = enc.finish().unwrap();

        assert!(stage.inflate_block(&compressed, 999).is_err());
    }
}
