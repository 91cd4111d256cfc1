//! Process entry point library for the package-sandbox daemon: wires the
//! store, admission controller, exclusive worker, and HTTP API into one
//! owned `Daemon` value. Split from `main.rs` so integration tests can
//! drive a real daemon instance the same way `at-daemon`'s `lib.rs`/
//! `main.rs` split lets its own tests do.

pub mod daemon;
