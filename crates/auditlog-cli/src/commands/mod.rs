pub mod dispatch;
pub mod export;
pub mod flush;
pub mod history;
pub mod log;
pub mod schema;
pub mod shared;
