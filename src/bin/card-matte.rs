//! Card matte CLI tool
//!
//! Command-line interface for extracting alpha mattes from card art with the
//! card-matte library.

#[cfg(feature = "cli")]
use card_matte::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
