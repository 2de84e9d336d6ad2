//! Ed25519 keypair generation and on-disk persistence.
//!
//! The loader only ever trusts one compiled-in public key (see
//! `rustboot_core::config::PUBLIC_KEY`); this module produces that key
//! (and the seed that signs against it) and a ready-to-paste Rust
//! snippet so the two stay in lockstep.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ed25519_dalek::{Keypair, PublicKey};
use rand::rngs::OsRng;

/// Generate a fresh keypair from the OS CSPRNG.
pub fn generate() -> Keypair {
    let mut csprng = OsRng {};
    Keypair::generate(&mut csprng)
}

/// Write the 32-byte seed to `<out_prefix>.sk` and the 32-byte public key
/// to `<out_prefix>.pk`, both as raw bytes (not hex/PEM) so `rbsigner
/// sign` can read the seed straight back in.
pub fn write_keypair(keypair: &Keypair, out_prefix: &Path) -> Result<()> {
    let sk_path = out_prefix.with_extension("sk");
    let pk_path = out_prefix.with_extension("pk");
    fs::write(&sk_path, keypair.secret.to_bytes())
        .with_context(|| format!("writing secret key to {}", sk_path.display()))?;
    fs::write(&pk_path, keypair.public.to_bytes())
        .with_context(|| format!("writing public key to {}", pk_path.display()))?;
    Ok(())
}

/// Render `pk` as the `pub const PUBLIC_KEY` array `rustboot_core::config`
/// expects, for pasting into a board's build.
pub fn format_pubkey_const(pk: &PublicKey) -> String {
    let mut out = String::from("pub const PUBLIC_KEY: [u8; 32] = [\n");
    for row in pk.to_bytes().chunks(8) {
        out.push_str("    ");
        for b in row {
            out.push_str(&format!("0x{:02x}, ", b));
        }
        out.push('\n');
    }
    out.push_str("];\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrips_through_disk() {
        let keypair = generate();
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("test-key");
        write_keypair(&keypair, &prefix).unwrap();

        let seed = fs::read(prefix.with_extension("sk")).unwrap();
        assert_eq!(seed, keypair.secret.to_bytes());
        let pk = fs::read(prefix.with_extension("pk")).unwrap();
        assert_eq!(pk, keypair.public.to_bytes());
    }

    #[test]
    fn pubkey_const_contains_every_byte() {
        let keypair = generate();
        let rendered = format_pubkey_const(&keypair.public);
        for b in keypair.public.to_bytes().iter() {
            assert!(rendered.contains(&format!("0x{:02x}", b)));
        }
    }
}
