use std::sync::Arc;

use crate::config::Config;
use crate::queue::LocalQueue;
use crate::storage::BlobStore;
use crate::store::StoreClient;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub store: StoreClient,
    pub blobs: BlobStore,
    pub queue: LocalQueue,
}
