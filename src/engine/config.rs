//! Engine configuration.

use super::error::EngineError;

/// Configuration for an [`Engine`](super::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of block slots in the memory pool.
    ///
    /// This is the whole memory budget of query execution. Joins need at
    /// least 3 slots when materializing; a two-pass sort over `B` blocks needs
    /// roughly `sqrt(B) + 1`.
    pub pool_slots: usize,

    /// Size of one block in bytes, on storage and in a pool slot.
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_slots: 10,
            block_size: 256,
        }
    }
}

impl EngineConfig {
    /// Sets the number of pool slots.
    pub fn with_pool_slots(mut self, pool_slots: usize) -> Self {
        self.pool_slots = pool_slots;
        self
    }

    /// Sets the block size in bytes.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Checks that the configuration can run at all.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` if the pool or the block size is
    /// zero. Whether a schema's tuple fits in a block is checked when its
    /// relation is created.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.pool_slots == 0 {
            return Err(EngineError::InvalidConfig(
                "pool_slots must be at least 1".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(EngineError::InvalidConfig(
                "block_size must be at least 1 byte".to_string(),
            ));
        }
        Ok(())
    }
}
