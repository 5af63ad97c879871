pub mod access;
pub mod author;
pub mod room;
pub mod session;

pub use access::{AccessDescriptor, Document, PadEdit, Permission, User};
pub use author::AuthorIdentity;
pub use room::{group_id_from_pad_id, DocumentRoom};
pub use session::{SessionKey, UserSession};
