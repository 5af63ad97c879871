pub mod access;
pub mod health;
pub mod pad_events;
pub mod templates;

pub use access::create_collab_session;
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use pad_events::{pad_update, session_holder};
pub use templates::create_from_template;
