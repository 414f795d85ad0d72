//! Sark relay server binary.
//! Run with: cargo run --bin sark-relay

use std::process::ExitCode;

use sark::start_relay;

fn main() -> ExitCode {
    start_relay::run()
}
