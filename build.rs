//! Build script for generating the `zond` man page.
//!
//! The packaging pipeline expects the man page in the build output
//! directory, so it is rendered here with clap-mangen from the same parser
//! definitions the binary uses.

use std::io::Write;
use std::path::PathBuf;
use std::{env, fs};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    for input in ["build.rs", "src/cli/mod.rs"] {
        writeln!(stdout, "cargo:rerun-if-changed={input}")?;
    }

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set"))?;

    let mut page = Vec::new();
    Man::new(Cli::command()).render(&mut page)?;
    fs::write(out_dir.join("zond.1"), page)?;

    Ok(())
}
