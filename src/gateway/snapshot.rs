//! Snapshot-backed gateway client
//!
//! Serves nodes from a captured gateway state: either a JSON file that is
//! re-read on every poll (`file://` addresses) or an in-memory node list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{GatewayClient, Node};
use crate::{Error, Result};

const FILE_SCHEME: &str = "file://";

/// Snapshot file schema
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Debug)]
enum Source {
    File(PathBuf),
    Memory(RwLock<Vec<Node>>),
    Unsupported(String),
}

/// Gateway client serving captured node snapshots
#[derive(Debug)]
pub struct SnapshotGateway {
    source: Source,
}

impl SnapshotGateway {
    /// Create a client for a gateway address
    ///
    /// Only `file://` addresses are served. Any other address is accepted here
    /// and reported as unreachable on every poll, the same way a gateway with
    /// a bad address behaves.
    #[must_use]
    pub fn new(address: &str) -> Self {
        let source = address.strip_prefix(FILE_SCHEME).map_or_else(
            || Source::Unsupported(address.to_string()),
            |path| Source::File(PathBuf::from(path)),
        );
        Self { source }
    }

    /// Create an in-memory gateway holding the given nodes
    #[must_use]
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self {
            source: Source::Memory(RwLock::new(nodes)),
        }
    }

    /// Change an attribute value in an in-memory snapshot, bypassing the
    /// writable check (a sensor reading changing on its own)
    ///
    /// Returns false if the node or attribute is unknown or the snapshot is
    /// not in memory.
    pub async fn set_value(&self, node_id: &str, attr_name: &str, value: &str) -> bool {
        let Source::Memory(nodes) = &self.source else {
            return false;
        };
        let mut nodes = nodes.write().await;
        let Some(attr) = nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .and_then(|n| n.attrs.get_mut(attr_name))
        else {
            return false;
        };
        attr.value = value.to_string();
        true
    }

    async fn read_file(path: &Path) -> Result<Vec<Node>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::GatewayUnreachable(format!("{}: {e}", path.display())))?;
        let snapshot: SnapshotFile = serde_json::from_str(&content)
            .map_err(|e| Error::GatewayProtocol(format!("{}: {e}", path.display())))?;
        Ok(snapshot.nodes)
    }
}

#[async_trait]
impl GatewayClient for SnapshotGateway {
    async fn poll_nodes(&self) -> Result<Vec<Node>> {
        match &self.source {
            Source::File(path) => Self::read_file(path).await,
            Source::Memory(nodes) => Ok(nodes.read().await.clone()),
            Source::Unsupported(address) => Err(Error::GatewayUnreachable(format!(
                "unsupported gateway address '{address}'"
            ))),
        }
    }

    async fn write_data(&self, node_id: &str, attr_name: &str, value: &str) -> Result<()> {
        let nodes = match &self.source {
            Source::Memory(nodes) => nodes,
            Source::File(path) => {
                return Err(Error::GatewayWrite(format!(
                    "snapshot {} is read-only",
                    path.display()
                )));
            }
            Source::Unsupported(address) => {
                return Err(Error::GatewayWrite(format!(
                    "unsupported gateway address '{address}'"
                )));
            }
        };

        let mut nodes = nodes.write().await;
        let attr = nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .and_then(|n| n.attrs.get_mut(attr_name))
            .ok_or_else(|| {
                Error::GatewayWrite(format!("no attribute '{attr_name}' on '{node_id}'"))
            })?;

        if !attr.writable {
            return Err(Error::GatewayWrite(format!(
                "attribute '{attr_name}' on '{node_id}' is read-only"
            )));
        }

        attr.value = value.to_string();
        tracing::debug!(node = %node_id, attr = %attr_name, value, "snapshot value written");
        Ok(())
    }
}
