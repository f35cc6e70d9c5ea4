//! Invocation handler (§6): decodes the SNS-wrapped invocation envelope,
//! drives the reader stack over the requested slice, and bundles the result
//! the way `bundle_response`/`my_handler` do in the original source.

use std::sync::Arc;

use serde::Deserialize;

use crate::aggregator::{self, Counts};
use crate::error::{Result, SliceError};
use crate::object_store::ObjectStore;
use crate::reader::SliceReader;
use crate::virtual_offset::SliceDescriptor;

/// The outer envelope an SNS-triggered invocation delivers: a single
/// record carrying the real payload as a JSON-encoded string.
#[derive(Deserialize)]
struct Envelope
{
    #[serde(rename = "Records")]
    records: Vec<SnsRecord>,
}

#[derive(Deserialize)]
struct SnsRecord
{
    #[serde(rename = "Sns")]
    sns: SnsMessage,
}

#[derive(Deserialize)]
struct SnsMessage
{
    #[serde(rename = "Message")]
    message: String,
}

/// The inner payload: where to read, and which virtual byte range to
/// summarise.
#[derive(Deserialize)]
struct SliceRequest
{
    location: String,
    virtual_start: i64,
    virtual_end: i64,
}

/// A bucket/key pair split out of an `s3://bucket/key` location string.
struct BucketKey
{
    bucket: String,
    key: String,
}

/// Splits `s3://bucket/key` the same way the source does: find the first
/// `/` at or after byte 5 (past the `s3://` prefix) and split there.
fn split_location(location: &str) -> Result<BucketKey>
{
    let bytes = location.as_bytes();
    if bytes.len() <= 5
    {
        return Err(SliceError::BadInput(format!("location too short: {:?}", location)));
    }
    for j in 5..bytes.len()
    {
        if bytes[j] == b'/'
        {
            let bucket = location[5..j].to_string();
            let key = location[j + 1..].to_string();
            return Ok(BucketKey { bucket, key });
        }
    }
    Err(SliceError::BadInput(format!("no bucket/key separator found in location: {:?}", location)))
}

/// Parses `req.payload`'s `Records[0].Sns.Message` into a [`SliceRequest`].
fn parse_request(payload: &str) -> Result<SliceRequest>
{
    let envelope: Envelope = serde_json::from_str(payload)?;
    let message = envelope
        .records
        .into_iter()
        .next()
        .ok_or_else(|| SliceError::BadInput("invocation payload has no Records[0]".to_string()))?
        .sns
        .message;
    log::info!("Message is: {}", message);
    let request: SliceRequest = serde_json::from_str(&message)?;
    Ok(request)
}

/// Builds the `{"headers": ..., "statusCode": ..., "body": "..."}` response
/// document, escaping `"` and `\` in `body` byte-for-byte like
/// `bundle_response`.
pub fn bundle_response(body: &str, status_code: u16) -> String
{
    let mut escaped = String::with_capacity(body.len());
    for c in body.chars()
    {
        if c == '"' || c == '\\'
        {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!(
        "{{\"headers\": {{\"Access-Control-Allow-Origin\": \"*\"}}, \"statusCode\": {}, \"body\": \"{}\"}}",
        status_code, escaped
    )
}

/// Result of a full invocation, primarily useful to tests and the CLI
/// entrypoint which want the counts as well as the bundled JSON body.
pub struct HandledSlice
{
    pub counts: Counts,
    pub response_body: String,
}

/// Parses, reads, and summarises one invocation payload, logging the same
/// timing/throughput summary the original `my_handler` prints at the end
/// of a run (total bytes, elapsed time, throughput, block/record counts).
pub fn handle_with_counts(store: Arc<dyn ObjectStore>, payload: &str) -> Result<HandledSlice>
{
    let request = parse_request(payload)?;
    let BucketKey { bucket, key } = split_location(&request.location)?;

    let slice = SliceDescriptor::new(request.virtual_start as u64, request.virtual_end as u64);
    let start = std::time::Instant::now();
    let mut reader = SliceReader::open(store, bucket, key, slice)?;
    log::info!("Loaded Reader");

    let counts = aggregator::summarise(&mut reader)?;
    let elapsed = start.elapsed();
    let total_bytes = reader.total_compressed_consumed();
    let mb_per_sec = if elapsed.as_secs_f64() > 0.0 { total_bytes as f64 / 1_000_000.0 / elapsed.as_secs_f64() } else { 0.0 };
    log::info!(
        "Finished processing {} bytes in {:?} ({:.2} MB/s); read {} blocks; {:?}",
        total_bytes,
        elapsed,
        mb_per_sec,
        reader.blocks_read(),
        counts
    );

    Ok(HandledSlice { counts, response_body: bundle_response("Success", 200) })
}

/// Runs the full pipeline for one invocation payload and returns only the
/// bundled JSON response body, matching the original `my_handler`'s return
/// contract (the counts themselves are logged, not returned to the caller).
pub fn handle(store: Arc<dyn ObjectStore>, payload: &str) -> Result<String>
{
    handle_with_counts(store, payload).map(|handled| handled.response_body)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn splits_bucket_and_key_from_location()
    {
        let bk = split_location("s3://my-bucket/path/to/file.vcf.gz").unwrap();
        assert_eq!(bk.bucket, "my-bucket");
        assert_eq!(bk.key, "path/to/file.vcf.gz");
    }

    #[test]
    fn rejects_location_without_separator()
    {
        assert!(split_location("s3://nobucketsep").is_err());
    }

    #[test]
    fn bundle_response_escapes_quotes_and_backslashes()
    {
        let body = bundle_response(r#"has "quotes" and \backslash\"#, 200);
        assert!(body.contains(r#"has \"quotes\" and \\backslash\\"#));
        assert!(body.starts_with("{\"headers\""));
        assert!(body.contains("\"statusCode\": 200"));
    }

    #[test]
    fn parses_sns_wrapped_request()
    {
        let inner = serde_json::json!({
            "location": "s3://bucket/key.vcf.gz",
            "virtual_start": 0,
            "virtual_end": 100,
        })
        .to_string();
        let payload = serde_json::json!({
            "Records": [{"Sns": {"Message": inner}}]
        })
        .to_string();
        let request = parse_request(&payload).unwrap();
        assert_eq!(request.location, "s3://bucket/key.vcf.gz");
        assert_eq!(request.virtual_start, 0);
        assert_eq!(request.virtual_end, 100);
    }

    #[test]
    fn rejects_malformed_envelope()
    {
        assert!(parse_request("{not json").is_err());
        assert!(parse_request("{}").is_err());
    }
}
