/**
 * File categories and the MIME/extension tables
 *  used to classify uploads into them.
 */
pub mod category;
/**
 * Free-name selection for files that would
 *  otherwise collide with an existing entry.
 */
pub mod collision;
/**
 * Directory tree operations beneath the storage
 *  root: create, list, stat and delete.
 */
pub mod directory;
pub mod encoding;
pub mod error;
/**
 * Exclusive, atomic commit of staged uploads
 *  into their final location.
 */
pub mod finalize;
/**
 * On-disk layout of the store and the routing
 *  rules that pick a destination directory.
 */
pub mod layout;
/**
 * Response headers for serving stored files.
 */
pub mod negotiate;
/**
 * The `temp/` staging tree uploads stream into
 *  before they are committed.
 */
pub mod staging;
pub mod store;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::category::{Category, CategoryTable};
    pub use crate::directory::{Entry, EntryKind, StoredFile};
    pub use crate::error::{ErrorKind, StoreError};
    pub use crate::finalize::CommitMode;
    pub use crate::layout::Namespace;
    pub use crate::negotiate::{Disposition, NegotiatedHeaders};
    pub use crate::store::{PendingUpload, Store, StoreConfig, UploadRequest};
    pub use crate::version::build_info;
}
