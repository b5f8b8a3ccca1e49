//! `dbz-patch` — apply a patch to a document.
//!
//! Usage:
//!   dbz-patch '<ops-array-json>'
//!
//! The document is read from stdin and the patched document is written to
//! stdout. If an operation fails, the failure goes to stderr and the exit
//! status is 2; the document printed is the state when the patch halted.

use dbz_core::cli::apply_patch_json;
use std::io::{self, Read, Write};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let ops = match args.get(1) {
        Some(p) => p.clone(),
        None => {
            eprintln!("First argument must be a JSON array of patch operations.");
            std::process::exit(1);
        }
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match apply_patch_json(buf.trim(), &ops) {
        Ok(report) => {
            let mut out = io::stdout();
            if let Err(e) = out
                .write_all(report.document.as_bytes())
                .and_then(|_| out.write_all(b"\n"))
            {
                eprintln!("{e}");
                std::process::exit(1);
            }
            if let Some(failure) = report.failure {
                eprintln!("{failure}");
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
