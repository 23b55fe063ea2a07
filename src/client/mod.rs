//! Clients for the external stores
//!
//! This module provides [`RedisBuffer`], the hand-off buffer between stages,
//! and [`MongoCollection`], the document store the load stage writes to.

mod mongo;
mod redis;

pub use self::mongo::MongoCollection;
pub use self::redis::RedisBuffer;
