pub mod config;
pub mod types;
pub mod util;

pub use config::{Config, EmailProvider};
pub use types::*;
pub use util::{external_id, truncate_to_char_boundary};
