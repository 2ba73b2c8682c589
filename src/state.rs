use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    cache::QuizReader, config::Config, store::RecordStore, utils::cursor::CursorCipher,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub reader: Arc<QuizReader>,
    pub cipher: Arc<dyn CursorCipher>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<RecordStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<QuizReader> {
    fn from_ref(state: &AppState) -> Self {
        state.reader.clone()
    }
}

impl FromRef<AppState> for Arc<dyn CursorCipher> {
    fn from_ref(state: &AppState) -> Self {
        state.cipher.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
