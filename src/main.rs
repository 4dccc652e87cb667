use std::{error::Error, fs, path::PathBuf};

use clap::Parser;

use pe_authenticode::Pkcs7Signature;

/// Inspect an Authenticode PKCS#7 signature blob.
///
/// The input is the raw attribute certificate table entry extracted from a
/// PE file (WIN_CERTIFICATE revision 2, PKCS_SIGNED_DATA).
#[derive(Parser)]
#[command(name = "pe-authenticode", version, about)]
struct Args {
    /// DER-encoded PKCS#7 blob.
    input: PathBuf,

    /// Emit the flattened signature records as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let bytes = fs::read(&args.input)?;
    let signature = Pkcs7Signature::parse(&bytes);
    let records = signature.signatures();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for (index, record) in records.iter().enumerate() {
            println!(
                "signature #{}: {} digest {}",
                index,
                record.digest_algorithm.as_deref().unwrap_or("unknown"),
                record.signed_digest.as_deref().unwrap_or("-"),
            );
            if let Some(signer) = &record.signer {
                for cert in &signer.chain {
                    println!("  signer: {}", cert.subject_raw);
                }
                for counter_signer in &signer.counter_signers {
                    println!(
                        "  counter-signed at {}",
                        counter_signer.signing_time.as_deref().unwrap_or("unknown"),
                    );
                }
            }
        }
    }

    for warning in signature.verify() {
        eprintln!("warning: {warning}");
    }

    Ok(())
}
