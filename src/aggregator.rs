//! Aggregator (§4.6): drives a [`SliceReader`] over every VCF record in a
//! slice, extracting `AC`/`AN` from the INFO column and folding them into
//! running variant/call counts.

use std::io;

use crate::reader::SliceReader;

/// Running totals across a slice: number of alternate alleles observed
/// (`numVariants`) and the total allele number (`numCalls`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts
{
    pub num_variants: u64,
    pub num_calls: u64,
}

/// Parses the decimal digits of `s` as a `u64`, matching the source's
/// `atoui64`: stops at the first non-digit rather than rejecting it.
fn parse_leading_digits(s: &[u8]) -> u64
{
    let mut value = 0u64;
    for &b in s
    {
        if !b.is_ascii_digit()
        {
            break;
        }
        value = value * 10 + (b - b'0') as u64;
    }
    value
}

/// Consumes one record's INFO column, adding to `counts`. Assumes the
/// cursor is positioned at the start of a record (CHROM).
fn add_counts(reader: &mut SliceReader, counts: &mut Counts) -> io::Result<()>
{
    let mut found_ac = false;
    let mut found_an = false;

    reader.skip_past(7, b'\t')?;

    loop
    {
        let (last_delim, token) = reader.read_until_any(b";\t")?;
        if last_delim == 0
        {
            // End-of-slice mid-INFO: drop this partial record (spec.md §4.7 kind 5).
            return Ok(());
        }

        let bytes = token.as_bytes();
        if bytes.len() >= 4
        {
            if &bytes[..3] == b"AC="
            {
                found_ac = true;
                counts.num_variants += 1 + bytes[3..].iter().filter(|&&b| b == b',').count() as u64;
            }
            else if &bytes[..3] == b"AN="
            {
                found_an = true;
                counts.num_calls += parse_leading_digits(&bytes[3..]);
            }
            else
            {
                log::debug!("Found unrecognised INFO field: {:?}", String::from_utf8_lossy(bytes));
            }
        }
        else
        {
            log::debug!("Found short unrecognised INFO field: {:?}", String::from_utf8_lossy(bytes));
        }

        if last_delim == b'\t' && !(found_ac && found_an)
        {
            log::debug!("Did not find either AC or AN. AC found: {}. AN found: {}", found_ac, found_an);
            return Ok(());
        }
        if found_ac && found_an
        {
            return Ok(());
        }
    }
}

/// Summarises every record in `reader`'s slice, mirroring the original
/// handler's record loop: the first record is parsed directly, then a
/// per-dataset inter-record stride (`2 × skipPastAndCount('\n')`) is
/// measured once and reused to jump between subsequent records' INFO
/// columns (spec.md §9 notes this assumes fixed VCF column layout).
pub fn summarise(reader: &mut SliceReader) -> io::Result<Counts>
{
    let mut counts = Counts::default();
    add_counts(reader, &mut counts)?;

    let stride = 2 * reader.skip_past_and_count(b'\n')?;
    log::debug!("Measured inter-record stride: {} bytes", stride);

    let mut records = 1u32;
    while reader.keep_reading()
    {
        add_counts(reader, &mut counts)?;
        if !reader.seek(stride)?
        {
            break;
        }
        reader.skip_past(1, b'\n')?;
        records += 1;
    }
    log::info!("Processed {} records: {:?}", records, counts);
    Ok(counts)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::object_store::InMemoryObjectStore;
    use crate::virtual_offset::SliceDescriptor;
    use crate::window::HEADROOM;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::sync::Arc;

    fn bgzf_member(payload: &[u8]) -> Vec<u8>
    {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        let compressed = enc.finish().unwrap();

        let xlen: u16 = 6;
        let bsize = 12 + xlen as usize + compressed.len() + 8 - 1;
        let mut block = Vec::new();
        block.extend_from_slice(&[0x1f, 0x8b, 0x08, 0x04]);
        block.extend_from_slice(&[0, 0, 0, 0]);
        block.push(0);
        block.push(0xff);
        block.extend_from_slice(&xlen.to_le_bytes());
        block.extend_from_slice(&[b'B', b'C']);
        block.extend_from_slice(&2u16.to_le_bytes());
        block.extend_from_slice(&(bsize as u16).to_le_bytes());
        block.extend_from_slice(&compressed);
        block.extend_from_slice(&[0, 0, 0, 0]);
        block.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        block
    }

    fn reader_over(blocks: &[&[u8]]) -> SliceReader
    {
        let mut compressed = Vec::new();
        for payload in blocks
        {
            compressed.extend_from_slice(&bgzf_member(payload));
        }
        let total_compressed = compressed.len() as u64;
        let mut data = vec![0u8; HEADROOM + compressed.len()];
        data[HEADROOM..].copy_from_slice(&compressed);
        let store: Arc<dyn crate::object_store::ObjectStore> =
            Arc::new(InMemoryObjectStore { data: Arc::new(data[HEADROOM..].to_vec()) });

        let slice = SliceDescriptor {
            start_compressed: 0,
            start_uncompressed: 0,
            end_compressed: total_compressed - 1,
            end_uncompressed: blocks.last().unwrap().len() as u16,
        };
        SliceReader::open(store, "bucket", "key", slice).unwrap()
    }

    fn record(info: &str) -> String
    {
        format!("chr1\t100\t.\tA\tC\t30\tPASS\t{}\tGT\n", info)
    }

    #[test]
    fn one_record_slice()
    {
        let vcf = record("AC=3;AN=100;DP=20");
        let mut reader = reader_over(&[vcf.as_bytes()]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts.num_variants, 1);
        assert_eq!(counts.num_calls, 100);
    }

    #[test]
    fn multi_allelic_counts_commas_plus_one()
    {
        let vcf = record("AC=1,2,1;AN=400");
        let mut reader = reader_over(&[vcf.as_bytes()]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts.num_variants, 3);
        assert_eq!(counts.num_calls, 400);
    }

    #[test]
    fn an_before_ac_still_matches_both()
    {
        let vcf = record("AN=50;AC=2");
        let mut reader = reader_over(&[vcf.as_bytes()]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts.num_variants, 1);
        assert_eq!(counts.num_calls, 50);
    }

    #[test]
    fn token_straddling_blocks_is_still_recognised()
    {
        let vcf = record("AC=5;AN=20");
        let mid = vcf.len() / 2;
        let (left, right) = vcf.as_bytes().split_at(mid);
        let mut reader = reader_over(&[left, right]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts.num_variants, 1);
        assert_eq!(counts.num_calls, 20);
        assert!(reader.overflow_activations() >= 1);
    }

    #[test]
    fn truncated_info_at_eof_is_dropped()
    {
        let vcf = "chr1\t100\t.\tA\tC\t30\tPASS\tAC=3;AN";
        let mut reader = reader_over(&[vcf.as_bytes()]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts, Counts::default());
    }

    #[test]
    fn multiple_records_use_measured_stride()
    {
        let vcf = format!("{}{}", record("AC=1;AN=10"), record("AC=2,3;AN=20"));
        let mut reader = reader_over(&[vcf.as_bytes()]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts.num_variants, 1 + 2);
        assert_eq!(counts.num_calls, 30);
    }

    #[test]
    fn final_record_shorter_than_measured_stride_does_not_panic()
    {
        // Record 1's post-INFO tail ("GT:DP\t0/1:10\n") sets a stride longer
        // than record 2 has left before end-of-slice ("\t\n" only): seek
        // must overshoot safely instead of leaving the cursor past the
        // block so the next skip_past/read_until_any indexes out of bounds.
        let vcf = format!(
            "{}{}",
            "chr1\t100\t.\tA\tC\t30\tPASS\tAC=1;AN=10\tGT:DP\t0/1:10\n",
            "chr1\t100\t.\tA\tC\t30\tPASS\tAC=2;AN=20\t\n"
        );
        let mut reader = reader_over(&[vcf.as_bytes()]);
        let counts = summarise(&mut reader).unwrap();
        assert_eq!(counts.num_variants, 1 + 1);
        assert_eq!(counts.num_calls, 10 + 20);
    }
}
