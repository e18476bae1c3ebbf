//! Shared harness for integration tests: one service per storage backend.

#![allow(dead_code)]

use std::sync::Arc;

use ties_core::event::MemorySink;
use ties_core::store::memory::MemoryStore;
use ties_core::store::sqlite::SqliteStore;
use ties_core::{
    ConversationRegistry, EventKind, EventNotifier, RelationshipGraph, RelationshipService,
    UserDirectory, UserId, VisibilityPolicy,
};

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

pub const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

pub trait Store: RelationshipGraph + ConversationRegistry + UserDirectory {}
impl<T: RelationshipGraph + ConversationRegistry + UserDirectory> Store for T {}

pub struct Harness {
    pub service: RelationshipService,
    pub store: Arc<dyn Store>,
    pub sink: Arc<MemorySink>,
}

impl Harness {
    pub fn new(backend: Backend, visibility: VisibilityPolicy) -> Self {
        let sink = Arc::new(MemorySink::new());
        let notifier = EventNotifier::new().with_sink(sink.clone());
        let (service, store): (RelationshipService, Arc<dyn Store>) = match backend {
            Backend::Memory => {
                let store = Arc::new(MemoryStore::new());
                (
                    RelationshipService::with_store(store.clone(), Arc::new(visibility), notifier),
                    store,
                )
            }
            Backend::Sqlite => {
                let store = Arc::new(SqliteStore::in_memory().expect("open sqlite store"));
                (
                    RelationshipService::with_store(store.clone(), Arc::new(visibility), notifier),
                    store,
                )
            }
        };
        Self {
            service,
            store,
            sink,
        }
    }

    /// Register and return `name`.
    pub fn user(&self, name: &str) -> UserId {
        let user = uid(name);
        self.service.register_user(&user).expect("register user");
        user
    }

    pub fn event_kinds(&self) -> Vec<EventKind> {
        self.sink.drain().into_iter().map(|event| event.kind).collect()
    }
}

pub fn uid(name: &str) -> UserId {
    UserId::parse(name).expect("valid identity")
}
