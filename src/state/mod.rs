mod section;
mod transformer;
mod view;

pub use section::{
    FlushBatch, RenderOp, Section, SectionAttributes, SectionCursor, SectionId, SectionTree,
};
pub use transformer::{apply_op, LogTransformer, MultiplexingTransformer, RenderSink, Transform};
pub use view::{ConsoleView, ViewSection};
