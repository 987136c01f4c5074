//! Block/Anchor Tracker.

use shared_types::{BlockId, BlockInfo};
use tracing::debug;

use super::Gatekeeper;
use crate::domain::registry::{registry_kind, RegistryKind};
use crate::error::{GatekeeperError, GatekeeperResult};

impl Gatekeeper {
    /// Record the next block of a block-anchored registry. Heights must
    /// strictly increase.
    pub async fn add_block(&self, registry: &str, block: BlockInfo) -> GatekeeperResult<()> {
        if registry_kind(registry) != Some(RegistryKind::BlockAnchored) {
            return Err(GatekeeperError::InvalidParameter(format!(
                "registry={registry}"
            )));
        }
        if block.hash.is_empty() {
            return Err(GatekeeperError::InvalidBlock("empty hash".into()));
        }

        let _writer = self.block_writer.lock().await;
        if let Some(tip) = self.store.get_block(registry, None).await? {
            if block.height <= tip.height {
                return Err(GatekeeperError::InvalidBlock(format!(
                    "height {} not above tip {}",
                    block.height, tip.height
                )));
            }
        }

        debug!(registry, height = block.height, "[gatekeeper] block added");
        self.store.add_block(registry, block).await?;
        Ok(())
    }

    /// A recorded block, or the tip when `id` is `None`.
    pub async fn get_block(&self, registry: &str, id: Option<BlockId>) -> GatekeeperResult<Option<BlockInfo>> {
        if registry_kind(registry).is_none() {
            return Err(GatekeeperError::InvalidParameter(format!(
                "registry={registry}"
            )));
        }
        Ok(self.store.get_block(registry, id.as_ref()).await?)
    }
}
