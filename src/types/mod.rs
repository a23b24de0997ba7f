pub mod job;
pub mod log;

pub use job::{BuildingInfo, JobStatus};
pub use log::{LinePrefix, PrefixCode, ScopedStatus, SectionStatus, SectionType, StatusScope};
