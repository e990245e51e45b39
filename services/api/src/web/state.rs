//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use flashcards_core::ports::{
    CredentialVerifier, DatabaseService, FlashcardGenerator, SessionIssuer,
};
use flashcards_core::{GenerationService, Library, SharingManager, SubscriptionMachine};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub sessions: Arc<dyn SessionIssuer>,
    pub library: Library,
    pub sharing: SharingManager,
    pub subscriptions: SubscriptionMachine,
    pub generation: GenerationService,
}

impl AppState {
    /// Wires the core engines to one storage handle.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        credentials: Arc<dyn CredentialVerifier>,
        sessions: Arc<dyn SessionIssuer>,
        generator: Arc<dyn FlashcardGenerator>,
    ) -> Self {
        Self {
            generation: GenerationService::new(db.clone(), generator),
            library: Library::new(db.clone()),
            sharing: SharingManager::new(db.clone()),
            subscriptions: SubscriptionMachine::new(db.clone()),
            db,
            config,
            credentials,
            sessions,
        }
    }
}
