#![deny(missing_docs)]
//! A multithreaded key-value server that maps [`String`] keys to [`String`] values, with a
//! bounded, set-associative cache in front of an authoritative in-memory store.
//!
//! This crate provides the server engine itself, as well as a [`kvcache-client`] and
//! [`kvcache-server`] executable that can be used to interact with it.
//! Key/value data is sent between the client and server using synchronous networking over a
//! small XML protocol, one request and one response per connection.
//!
//! ## Supported Storage Operations
//! The server supports three types of operations:
//!
//! - `PUT` a key/value pair into the store
//! - `GET` the value associated with a key
//! - `DEL` a key/value pair from the store
//!
//! See the [`KvsEngine`] trait and the [`KvMessage`] type for more information on the
//! structure of these operations.
//!
//! ## KvServer
//! [`KvServer`] is the implementor of the [`KvsEngine`] trait and the brains of this entire
//! operation. It combines:
//! - a [`KvCache`]: `num_sets` sets of `set_capacity` entries each. A key always maps to the
//!   same set, and a full set makes room using second-chance ("clock") eviction
//! - a [`KvStore`]: an unbounded concurrent map that is the single source of truth. It can be
//!   dumped to and restored from a snapshot file
//!
//! Writes go to the store and then the cache. Reads fall through to the store on a cache miss
//! and refill the cache. Each operation is serialized by the lock of the key's cache set, so
//! operations on keys in different sets run in parallel.
//!
//! ## Client / Server
//! Client and server logic is contained in the [`client`] and [`server`] structs. The server
//! accepts connections on one thread and services each of them as a job on a fixed-size
//! [`ThreadPool`]. Both sides encode and decode [`KvMessage`]s.
//!
//! ## Custom Protocol
//! Every request is a `<KVMessage type="...">` document carrying a `Key` (and a `Value` for
//! puts). The server always answers with a `resp` message: `Success` for a put or del, the key
//! and value for a get, or the text of the failure, e.g. `Data Error: Key does not exist`.
//! A request that cannot be parsed is answered with `Unknown Error: Could not parse`.
//!
//! [`String`]: https://doc.rust-lang.org/std/string/struct.String.html
//! [`client`]: ./struct.KvsClient.html
//! [`server`]: ./struct.SocketServer.html
//! [`kvcache-server`]: ./kvcache-server.rs
//! [`kvcache-client`]: ./kvcache-client.rs

pub use cache::{CacheSnapshot, KvCache};
pub use client::KvsClient;
pub use config::{PoolKind, ServerConfig};
pub use engine::{KvServer, KvStore, KvsEngine};
pub use error::{KvsError, Result, SUCCESS};
pub use message::{KvMessage, MAX_MESSAGE_LEN};
pub use server::SocketServer;
pub use thread_pool::{RayonThreadPool, SharedQueueThreadPool, ThreadPool};

pub mod cache;
mod client;
pub mod config;
mod engine;
mod error;
mod message;
mod server;
pub mod thread_pool;
mod xml;
