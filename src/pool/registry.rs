//! Protocol tag → constructor lookup.

use crate::config::SimConfig;
use crate::error::{DecodeError, Error};
use crate::hash::FastMap;
use crate::pool::{Pool, PoolSnapshot, DEX_LITE, DEX_T1, MAVERICK_V2};
use tracing::debug;

pub type Constructor = fn(&PoolSnapshot) -> Result<Pool, Error>;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    constructors: FastMap<String, Constructor>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the three built-in kernels under their exchange tags.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEX_LITE, |snapshot| Pool::dex_lite(snapshot, &SimConfig::default()));
        registry.register(DEX_T1, |snapshot| Pool::dex_t1(snapshot, &SimConfig::default()));
        registry.register(MAVERICK_V2, |snapshot| {
            Pool::maverick_v2(snapshot, &SimConfig::default())
        });
        registry
    }

    /// Adds or replaces the constructor for `tag`, returning the previous one.
    pub fn register(&mut self, tag: &str, constructor: Constructor) -> Option<Constructor> {
        self.constructors.insert(tag.to_string(), constructor)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Builds a simulator with the constructor registered for `snapshot.exchange`.
    pub fn construct(&self, snapshot: &PoolSnapshot) -> Result<Pool, Error> {
        let constructor = self
            .constructors
            .get(snapshot.exchange.as_str())
            .ok_or_else(|| DecodeError::UnknownProtocol(snapshot.exchange.clone()))?;

        let pool = constructor(snapshot)?;
        debug!(exchange = %snapshot.exchange, pool = %snapshot.address, "pool constructed");
        Ok(pool)
    }
}
