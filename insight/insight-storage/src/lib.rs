//! In-process collaborators for the index insight engine.
//!
//! Provides an artifact store, a cluster view and a scripted model client
//! that implement the `insight-core` traits without any external service.

pub mod cluster;
pub mod fixture;
pub mod memory_store;
pub mod model;

pub use cluster::InMemoryCluster;
pub use fixture::{ClusterFixture, IndexFixture, ModelFixture};
pub use memory_store::MemoryArtifactStore;
pub use model::{ModelCall, ModelReply, ModelRule, ScriptedModel};
