pub mod ansi;
pub mod classifier;
pub mod line;

pub use ansi::StyledRun;
pub use line::{
    parse_log_line, render_basic, render_continuation, render_header, LineKind, ParsedLine,
    RenderedLine, Segment, StyledLine,
};
