//! `rbsigner`: the host-side counterpart to the resident loader in
//! `rustboot-core`. It never runs on the target; it only prepares what a
//! host feeds the loader over the wire.
//!
//! ```text
//! rbsigner keygen <out-prefix>
//! rbsigner sign <image> <seed-file> <out-transcript> [addr-hex] [block-size]
//! ```

mod keygen;
mod transcript;

use std::convert::TryInto;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use log::info;

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("keygen") => cmd_keygen(&args[2..]),
        Some("sign") => cmd_sign(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("USAGE:");
    println!("    rbsigner keygen <out-prefix>");
    println!("    rbsigner sign <image> <seed-file> <out-transcript> [addr-hex] [block-size]");
}

fn cmd_keygen(args: &[String]) -> Result<()> {
    let out_prefix = args
        .get(0)
        .context("usage: rbsigner keygen <out-prefix>")?;

    let keypair = keygen::generate();
    keygen::write_keypair(&keypair, Path::new(out_prefix))?;
    info!("wrote {0}.sk and {0}.pk", out_prefix);
    println!("{}", keygen::format_pubkey_const(&keypair.public));
    Ok(())
}

fn cmd_sign(args: &[String]) -> Result<()> {
    let image_path = args.get(0).context(
        "usage: rbsigner sign <image> <seed-file> <out-transcript> [addr-hex] [block-size]",
    )?;
    let seed_path = args.get(1).context("missing <seed-file>")?;
    let out_path = args.get(2).context("missing <out-transcript>")?;
    let addr = match args.get(3) {
        Some(a) => parse_addr(a)?,
        None => rustboot_core::config::APP_START,
    };
    let block_size = match args.get(4) {
        Some(b) => b.parse::<usize>().context("block size must be a positive integer")?,
        None => transcript::DEFAULT_BLOCK_SIZE,
    };

    let image = fs::read(image_path)
        .with_context(|| format!("reading firmware image from {}", image_path))?;
    let seed_bytes =
        fs::read(seed_path).with_context(|| format!("reading seed key from {}", seed_path))?;
    let seed: [u8; 32] = seed_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("seed file must be exactly 32 bytes, got {}", seed_bytes.len()))?;

    let secret = SecretKey::from_bytes(&seed).context("seed is not a valid Ed25519 secret key")?;
    let public = PublicKey::from(&secret);
    let keypair = Keypair { secret, public };

    let wire = transcript::build_transcript(&image, addr, block_size, &keypair);
    fs::write(out_path, &wire)
        .with_context(|| format!("writing transcript to {}", out_path))?;
    info!(
        "signed {} bytes at 0x{:08x}, wrote {} bytes of wire transcript to {}",
        image.len(),
        addr,
        wire.len(),
        out_path
    );
    Ok(())
}

fn parse_addr(tok: &str) -> Result<u32> {
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).context("invalid hex address")
    } else {
        tok.parse::<u32>().context("invalid decimal address")
    }
}
