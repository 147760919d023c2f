//! # flakeid
//!
//! Process-local Snowflake IDs. Each ID is a 63-bit integer packing the
//! milliseconds since a chosen epoch, an 8-bit node identifier and a 14-bit
//! per-millisecond sequence:
//!
//! ```text
//!  +--------------+----------------+----------------+---------------+
//!  | reserved (1) | timestamp (41) |  node ID (8)   | sequence (14) |
//!  +--------------+----------------+----------------+---------------+
//! ```
//!
//! A single [`Generator`] can be shared by any number of threads. The IDs it
//! hands out are unique and strictly increasing; processes configured with
//! distinct node IDs and the same epoch never collide with each other.
//!
//! ```
//! use std::time::UNIX_EPOCH;
//! use flakeid::{CUSTOM_EPOCH, Generator};
//!
//! let generator = Generator::new(7, UNIX_EPOCH + CUSTOM_EPOCH)?;
//! let id = generator.next_id()?;
//! println!("{id}");
//! generator.close();
//! # Ok::<(), flakeid::Error>(())
//! ```
//!
//! ## Features
//!
//! - `global` (default): the process-wide generator in [`global`]
//! - `parking-lot`: use `parking_lot::Mutex` (no lock poisoning)
//! - `cache-padded`: pad the generator lock to a cache line
//! - `tracing`: spans and lifecycle events via `tracing`
//! - `serde`: `Serialize`/`Deserialize` for [`SnowflakeId`] and
//!   [`GeneratorConfig`]

#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod generator;
#[cfg(feature = "global")]
pub mod global;
mod id;
mod time;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::Generator;
pub use crate::id::*;
pub use crate::time::*;
