pub mod client;
pub mod error;
pub mod logging;
pub mod mock_client;
pub mod stream;

pub use client::{parse_next_offset, CompletionProbe, ConsoleClient, LogChunk, LogSource};
pub use error::FetchError;
pub use mock_client::MockLogSource;
pub use stream::split_log_lines;
