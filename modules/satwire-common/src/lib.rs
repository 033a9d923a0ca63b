pub mod config;
pub mod error;
pub mod types;
pub mod url;

pub use config::Config;
pub use error::SatwireError;
pub use types::*;
pub use url::{item_id, normalize_url, url_hash};
