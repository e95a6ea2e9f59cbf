pub mod error;
pub mod models;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{Result, StoreError};
pub use models::{Event, NewEvent, NotificationLog, ScrapeRun, Subscriber};
pub use store::{PgStore, Store};
