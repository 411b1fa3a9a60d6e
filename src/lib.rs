//! A client for the ISC DHCP Object Management API (OMAPI).
//!
//! OMAPI is the binary protocol `dhcpd` and `dhclient` expose for managing
//! leases and host declarations at runtime - the same protocol `omshell`
//! speaks. This crate implements the wire codec ([`OutBuffer`], [`InBuffer`],
//! [`Message`]), HMAC-MD5 message authentication ([`auth`]), and a
//! synchronous [`Client`] built on top of them.
//!
//! ```no_run
//! # fn main() -> Result<(), omapi::Error> {
//! let mut client = omapi::Client::connect("127.0.0.1", 7911, None, None)?;
//! client.add_host("192.0.2.10", "00:11:22:33:44:55")?;
//! # Ok(())
//! # }
//! ```
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::todo,
    clippy::unimplemented,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::print_stdout,
    missing_debug_implementations,
    unreachable_pub,
    missing_docs
)]

mod errors;
pub use errors::Error;

mod dictionary;
pub use dictionary::Dictionary;

mod out_buffer;
pub use out_buffer::{OutBuffer, SIZE_LIMIT};

mod in_buffer;
pub use in_buffer::InBuffer;

mod message;
pub use message::{Message, Opcode};

mod addr;
pub use addr::{pack_ip, pack_mac, unpack_ip, unpack_mac};

pub mod auth;

mod client;
pub use client::Client;

// Unused crate lint workaround for dev dependencies only pulled in by the
// benchmark and fuzz targets.
#[cfg(test)]
use criterion as _;
