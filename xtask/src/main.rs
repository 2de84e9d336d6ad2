#![deny(unused_must_use)]

//! Developer task runner for the workspace: host-side tests, the one
//! board build, flashing it via `probe-rs`, and forwarding key/signing
//! commands to `rbsigner`. `anyhow` + `xshell`, `cargo xtask <verb>`
//! dispatch, scoped to the single SAM D21 board target this loader
//! ships for.

use std::env;
use std::path::PathBuf;

use xshell::cmd;

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let args = args.iter().map(|s| &**s).collect::<Vec<_>>();

    match &args[..] {
        ["test"] => test_workspace(),
        ["build"] => build_board(),
        ["flash"] => flash_board(),
        ["keygen", rest @ ..] => forward_to_rbsigner("keygen", rest),
        ["sign", rest @ ..] => forward_to_rbsigner("sign", rest),
        _ => {
            println!("USAGE:");
            println!("    cargo xtask test              run the host-side test suite");
            println!("    cargo xtask build             build the samd21 board image");
            println!("    cargo xtask flash             flash the samd21 board via probe-rs");
            println!("    cargo xtask keygen <args...>  forward to `rbsigner keygen`");
            println!("    cargo xtask sign <args...>    forward to `rbsigner sign`");
            Ok(())
        }
    }
}

/// Runs every crate that builds on the host: the board crate is
/// `no_std`/Thumb-only and excluded, same as a real embedded workspace
/// would exclude it from a host `cargo test` pass.
fn test_workspace() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir())?;
    cmd!("cargo test -p rustboot-core -p rustboot-hal -p rbsigner").run()?;
    Ok(())
}

fn build_board() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir().join("boards/samd21"))?;
    cmd!("cargo build --release").run()?;
    Ok(())
}

fn flash_board() -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir().join("boards/samd21"))?;
    cmd!("cargo flash --chip ATSAMD21G18A --release").run()?;
    Ok(())
}

fn forward_to_rbsigner(subcommand: &str, rest: &[&str]) -> Result<(), anyhow::Error> {
    let _p = xshell::pushd(root_dir().join("rbsigner"))?;
    let rest = rest.to_vec();
    cmd!("cargo run -- {subcommand} {rest...}").run()?;
    Ok(())
}

fn root_dir() -> PathBuf {
    let mut xtask_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    xtask_dir.pop();
    xtask_dir
}
