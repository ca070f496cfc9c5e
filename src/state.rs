use std::sync::Arc;

use crate::database::Store;
use crate::imagehost::ImageHost;

/// Shared application state: the storage collaborator and the image host
/// client. Handlers are otherwise stateless; identity arrives per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub images: Arc<ImageHost>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, images: Arc<ImageHost>) -> Self {
        Self { store, images }
    }
}
