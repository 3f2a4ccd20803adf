//! External process for a distributed temperature relaxation exchange.
//!
//! The process connects to a central coordinator over TCP, reports its
//! temperature, and on every central value it receives moves its own value
//! to `(3 * own + 2 * central) / 5`. It stops when the coordinator sends the
//! sentinel index `-1`. Each module owns one concern:
//!
//! - [`codec`] maps a [`codec::Message`] to and from its 8-byte record.
//! - [`connection`] owns the TCP stream and sends/receives one record at a time.
//! - [`relaxation`] is the convergence state machine and the loop driving it.
//! - [`cli`] parses and validates the command line.
//! - [`report`] renders the final outcome as text or JSON.
//! - [`error`] holds the error taxonomy.
//!
//! Tests drive the state machine over in-memory streams and against scripted
//! coordinators listening on localhost.

pub mod cli;
pub mod codec;
pub mod connection;
pub mod error;
pub mod relaxation;
pub mod report;
