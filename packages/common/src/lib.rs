pub mod key;
pub mod lock;
pub mod retry;

pub use key::{Category, DerivedKey};
pub use lock::{BlobLock, LockError, LockMode};
pub use retry::{RetryError, Transient, with_retry};
