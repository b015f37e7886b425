//! `serde`/`toml`-deserializable store configuration — the shape an
//! embedding daemon's config loader would read off disk.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;
use crate::factory::{CasSharded, EntryFactory, Flat};
use crate::store::{Builder, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    pub name: String,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactoryConfig {
    Flat,
    Cas {
        #[serde(default = "default_min_len")]
        min_len: usize,
    },
}

fn default_min_len() -> usize {
    crate::factory::MIN_CAS_NAME_LEN
}

impl Default for FactoryConfig {
    fn default() -> Self {
        FactoryConfig::Flat
    }
}

fn build_factory(cfg: &FactoryConfig) -> Box<dyn EntryFactory> {
    match cfg {
        FactoryConfig::Flat => Box::new(Flat),
        FactoryConfig::Cas { min_len } => Box::new(CasSharded::new(*min_len)),
    }
}

/// Buffer-pool sizing used when a caller opens a handle with a non-zero
/// part size. `None` (the default) leaves chunked I/O unpooled.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BufferPoolConfig {
    pub chunk_size: usize,
    pub chunk_count: usize,
}

/// Deserializable description of a [`Store`].
///
/// ```toml
/// [[states]]
/// name = "staging"
/// directory = "/var/lib/store/staging"
///
/// [[states]]
/// name = "committed"
/// directory = "/var/lib/store/committed"
///
/// [factory]
/// kind = "cas"
/// min_len = 4
///
/// lru_capacity = 10000
///
/// [buffer_pool]
/// chunk_size = 65536
/// chunk_count = 32
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub states: Vec<StateConfig>,
    #[serde(default)]
    pub factory: FactoryConfig,
    #[serde(default)]
    pub lru_capacity: Option<u64>,
    #[serde(default)]
    pub buffer_pool: Option<BufferPoolConfig>,
}

impl StoreConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            crate::error::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    pub(crate) fn build(&self) -> Result<Store> {
        let factory = build_factory(&self.factory);
        let mut builder = self.states.iter().fold(
            Builder::new_boxed(factory),
            |builder, state| builder.with_state(state.name.clone(), state.directory.clone()),
        );
        if let Some(capacity) = self.lru_capacity {
            builder = builder.with_lru_capacity(capacity);
        }
        if let Some(pool) = &self.buffer_pool {
            builder = builder.with_buffer_pool(pool.chunk_size, pool.chunk_count);
        }
        Ok(builder.build())
    }
}
