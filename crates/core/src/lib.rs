pub mod config;
pub mod context;
pub mod record;

pub use config::Config;
pub use context::{ExecutionContext, SearchResult};
pub use record::JobRecord;
