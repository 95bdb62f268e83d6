//! caspub CLI entry point
//!
//! A minimal entrypoint: parse and dispatch via cli::run, print the error's
//! name and message to stderr, exit with the code mapped from the error
//! kind (0 on success, or a hook's own exit status when a hook fails).
//!
//! All logic is delegated to the CLI module.

use caspub::cli;

fn main() {
    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.kind().exit_code());
        }
    }
}
