pub mod frontend;
pub mod r#loop;
pub mod mode;
pub mod poller;
pub mod update;

pub use poller::{FetchCursor, FetchState, NotifyOutcome, PollObserver, Poller};
pub use update::{ChannelObserver, ChannelSink, UiUpdate};
