//! A stateful local file store: a content-addressed or flat on-disk
//! repository of named [`state::State`] directories, with per-entry
//! locking, pluggable sidecar metadata, optional LRU eviction, and a
//! [`operation::FileOperation`] façade that gates mutating verbs on the
//! entry's current state.

mod allocator;
mod config;
mod entry;
mod error;
mod factory;
mod handle;
mod metadata;
mod operation;
mod registry;
mod state;
mod store;

pub use config::{BufferPoolConfig, FactoryConfig, StateConfig, StoreConfig};
pub use error::{Error, FileStateError, Result};
pub use factory::{CasSharded, EntryFactory, Flat, MIN_CAS_NAME_LEN};
pub use handle::{ReadWriter, Reader};
pub use metadata::{sidecar_path, ByteRangeUpdate, MetadataDescriptor};
pub use operation::{FileOperation, FileStat};
pub use state::{AcceptSet, State, StateId, States};
pub use store::{Builder, Store};
