//! This module provides the key/value engines that a [`SocketServer`] can serve.
//! The production engine is [`KvServer`]: a [`KvCache`] kept consistent with an authoritative
//! [`KvStore`] using the cache-aside pattern.
//!
//! [`SocketServer`]: crate::SocketServer
//! [`KvCache`]: crate::KvCache
use crate::{KvsError, Result};

/// A trait for the basic functionality of a key/value storage engine
pub trait KvsEngine: Clone + Send + 'static {
    /// sets a `key` and `value`
    ///
    /// If the given `key` already exists the previous `value` will be overwritten.
    fn put(&self, key: String, value: String) -> Result<()>;

    /// Gets the value associated with the given `key`
    ///
    /// # Errors
    ///
    /// Returns `KvsError::NoSuchKey` if the given `key` does not exist.
    fn get(&self, key: &str) -> Result<String>;

    /// Removes the given `key` (and associated value) from the store
    ///
    /// # Errors
    ///
    /// Returns `KvsError::NoSuchKey` if the given `key` is not found.
    fn del(&self, key: &str) -> Result<()>;

    /// Returns true if `key` exists. Behaves like [`KvsEngine::get`], including its effect on
    /// any cache, but reports a missing key as `false` instead of an error
    fn has_key(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(KvsError::NoSuchKey) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

mod kv_server;
mod store;

pub use self::kv_server::KvServer;
pub use self::store::KvStore;
