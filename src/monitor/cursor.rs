//! Monitor-side cursor handling: recovery on start, then load/advance/rewind
//! delegated to the durable [`CursorStore`] (spec §3 "MonitorCursor").

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::store::CursorStore;

pub struct Cursor {
    store: CursorStore,
    height: i32,
}

impl Cursor {
    /// Recovers the starting height: the persisted cursor if one exists,
    /// else the highest `blockHeight` across `confirmed` TxRecords, else the
    /// node's current tip (spec §3).
    pub async fn recover(
        store: CursorStore,
        rpc: &dyn ZcashRpcClient,
    ) -> Result<Self, TransientError> {
        let height = store.recover(rpc).await?;
        Ok(Self { store, height })
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Persists and tracks the new height. Never called for a height lower
    /// than the current one except via [`Cursor::rewind`] (spec §4.2: "a
    /// scan that partially processes heights must persist the highest
    /// fully-processed height").
    pub async fn advance_to(&mut self, height: i32) -> Result<(), TransientError> {
        self.store.advance(height).await?;
        self.height = height;
        Ok(())
    }

    /// Rewinds the cursor during reorg handling (spec §4.2 "Reorg handler").
    pub async fn rewind_to(&mut self, height: i32) -> Result<(), TransientError> {
        self.store.rewind(height).await?;
        self.height = height;
        Ok(())
    }
}
