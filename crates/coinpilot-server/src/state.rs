use std::sync::Arc;

use crate::dispatch::RpcDispatcher;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RpcDispatcher>,
}

impl AppState {
    pub fn new(dispatcher: RpcDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}
