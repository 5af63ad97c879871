pub mod authors;
pub mod broker;
pub mod content;
pub mod error;
pub mod locks;
pub mod metrics;
pub mod remote;
pub mod rooms;
pub mod sessions;
pub mod store;

pub use authors::AuthorIdentityCache;
pub use broker::{ActivitySink, CollabBroker, DocumentCatalog, PermissionGate, UserDirectory};
pub use content::ContentServiceClient;
pub use error::BrokerError;
pub use self::metrics::{get_metrics, init_metrics};
pub use remote::etherpad::EtherpadClient;
pub use remote::{CollabRemote, RemoteError, RemoteOutcome, RenewalCheck};
pub use rooms::DocumentRoomCache;
pub use sessions::{
    Clock, FixedClock, PerUser, PerUserDocument, SessionCache, SessionScope, SystemClock,
};
pub use store::{CollabDb, CollabStore, MemoryStore};
