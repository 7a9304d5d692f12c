pub mod audit;
pub mod config;
pub mod document;
pub mod export;
pub mod format;
pub mod merge;
pub mod paths;
pub mod record;
pub mod resolve;
pub mod store;
pub mod util;
