//! floe CLI: streams large JSON documents into a record store.

use std::process::ExitCode;

use floe::{Application, Config};

fn main() -> ExitCode {
    Application::<Config>::run()
}
