//! CLI entrypoint for the slice summarizer: reads an invocation payload
//! (SNS-wrapped JSON) from a file or stdin, runs it through the handler,
//! and prints the bundled response.

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use vcf_slice_summary::error::SliceError;
use vcf_slice_summary::object_store::S3HttpObjectStore;
use vcf_slice_summary::{handle, handle_with_counts};

#[derive(Parser)]
#[command(name = "summarise-slice", about = "Summarise a virtual byte range of a BGZF VCF into AC/AN counts")]
struct Args
{
    /// Path to the invocation event JSON. Reads from stdin if omitted.
    #[arg(long)]
    event: Option<String>,

    /// AWS region the bucket lives in.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Print the raw (numVariants, numCalls) counts in addition to the
    /// bundled response body.
    #[arg(long)]
    counts: bool,
}

fn read_event(path: Option<&str>) -> io::Result<String>
{
    match path
    {
        Some(path) => fs::read_to_string(path),
        None =>
        {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode
{
    env_logger::init();
    let args = Args::parse();

    let payload = match read_event(args.event.as_deref())
    {
        Ok(payload) => payload,
        Err(e) =>
        {
            eprintln!("failed to read event: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store: Arc<dyn vcf_slice_summary::object_store::ObjectStore> = Arc::new(S3HttpObjectStore::new(args.region));

    let result = if args.counts
    {
        handle_with_counts(store, &payload).map(|handled| {
            eprintln!("numVariants: {}, numCalls: {}", handled.counts.num_variants, handled.counts.num_calls);
            handled.response_body
        })
    }
    else
    {
        handle(store, &payload)
    };

    match result
    {
        Ok(body) =>
        {
            println!("{}", body);
            ExitCode::SUCCESS
        }
        Err(e) =>
        {
            eprintln!("invocation failed: {}", e);
            match e
            {
                SliceError::BadInput(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
