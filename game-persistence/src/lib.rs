pub mod codec;
pub mod connection;
pub mod entities;
pub mod repositories;
pub mod store;

pub use codec::CodecError;
pub use repositories::session_repository::{
    RepositoryConfig, SessionRepository, SnapshotOutcome, SESSIONS_ROOT,
};
pub use repositories::user_repository::{UserRepository, USERS_ROOT};
pub use store::memory::MemoryDocumentStore;
pub use store::sql::SqlDocumentStore;
pub use store::{DocumentStore, StoreError, Subscription};
