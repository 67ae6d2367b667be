//! Nova chat proxy binary.
//! Run with: cargo run --bin nova-server

use std::process::ExitCode;

use nova_chat::start_nova_chat;

fn main() -> ExitCode {
    start_nova_chat::run()
}
