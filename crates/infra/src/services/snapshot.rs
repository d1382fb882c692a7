use storerec_core::StoreId;
use storerec_engine::{EngineError, SnapshotReader, StoreSnapshot};

use super::AppServices;

impl SnapshotReader for AppServices {
    fn snapshot(&self, store_id: StoreId) -> Result<StoreSnapshot, EngineError> {
        let unavailable = |e: crate::read_model::StoreError| EngineError::SnapshotUnavailable(e.to_string());
        let products = self.repos.products.list(store_id).map_err(unavailable)?;
        let interactions = self.repos.interactions.list(store_id).map_err(unavailable)?;
        Ok(StoreSnapshot::from_records(store_id, self.now(), &products, &interactions))
    }
}
