//! Library surface for the `playback` CLI binary: argument parsing and the
//! terminal video sink, factored out of `main.rs` so they're independently
//! testable.

pub mod cli;
pub mod term_sink;
