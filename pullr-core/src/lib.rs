mod agg;
mod arena;
mod config;
mod kind;
mod series;
mod session;
mod summary;

pub use agg::Avg;
pub use arena::{Arena, TestReport, UrlStats};
pub use config::{
    Config, ConfigError, DEFAULT_CLIENTS, DEFAULT_RECV_LENGTH, DEFAULT_TIMEOUT_SECS, FileConfig,
    Overrides, Target, UrlCursor, split_url_list,
};
pub use kind::ErrorKind;
pub use series::Series;
pub use session::{
    EventSender, FIRST_CHUNK_LEN, RECV_BLOCK_SIZE, STATS_WINDOW_SIZE, Session, SessionEvent,
    SessionHandle, SessionId,
};
pub use summary::Summary;
