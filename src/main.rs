// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;
use std::process;

use clap::Parser;

use pdp11obj::cli;

/// Dump the contents of a PDP-11 RT-11/RSX-11 linker object file.
#[derive(Debug, Parser)]
#[clap(name = env!("CARGO_CRATE_NAME"), version)]
#[command(version, about, long_about = None)]
struct App {
    /// an RT-11/RSX-11 .OBJ object module
    object: PathBuf,
}

fn usage() -> ! {
    eprintln!("pdp11obj: object-filename");
    process::exit(1);
}

fn main() {
    let app = App::try_parse().unwrap_or_else(|e| {
        if e.use_stderr() {
            usage()
        } else {
            // --help and --version
            e.exit()
        }
    });

    if let Err(e) = cli::dump(&mut std::io::stdout(), &app.object) {
        eprintln!("{e:#}");
        process::exit(1);
    }
}
