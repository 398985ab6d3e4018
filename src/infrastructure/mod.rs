//! I/O collaborators the `domain`/`application` layers are wired against
//! via the narrow traits in `domain::ports`: SQLite-backed persistence,
//! a remote history HTTP source, a database candle source, and a news
//! blackout-window HTTP source. Nothing in `application` depends on this
//! module directly — only on the trait objects it implements.

pub mod artifacts;
pub mod database_source;
pub mod news_window;
pub mod remote_history;
pub mod sqlite_sink;

pub use database_source::DatabaseCandleSource;
pub use news_window::RemoteNewsWindowSource;
pub use remote_history::RemoteHistorySource;
pub use sqlite_sink::SqliteResultSink;
