use crate::console::RenderedLine;
use crate::runtime::poller::PollObserver;
use crate::state::{FlushBatch, RenderOp, RenderSink, SectionAttributes, SectionId};
use tokio::sync::mpsc;

/// Messages from the polling task to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    Flush(FlushBatch),
    Polled { lines: usize, next_offset: u64 },
    FetchFailed(String),
    Completed,
}

/// Render sink that forwards committed batches over the update channel. A
/// closed channel means the UI is gone, so sends are allowed to fail.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UiUpdate>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<UiUpdate>) -> Self {
        Self { tx }
    }

    fn send_op(&mut self, op: RenderOp) {
        self.commit(FlushBatch {
            continued: None,
            continuation: Vec::new(),
            appended: vec![op],
        });
    }
}

impl RenderSink for ChannelSink {
    fn append_section(&mut self, section: SectionId, after: Option<SectionId>) {
        self.send_op(RenderOp::AppendSection { section, after });
    }

    fn append_line(&mut self, section: SectionId, line: RenderedLine) {
        self.send_op(RenderOp::AppendLine { section, line });
    }

    fn set_section_open(&mut self, section: SectionId, open: bool) {
        self.send_op(RenderOp::SetOpen { section, open });
    }

    fn set_section_attributes(&mut self, section: SectionId, attributes: SectionAttributes) {
        self.send_op(RenderOp::SetAttributes {
            section,
            attributes,
        });
    }

    fn attach_fold_toggle(&mut self, section: SectionId) {
        self.send_op(RenderOp::AttachFoldToggle { section });
    }

    fn commit(&mut self, batch: FlushBatch) {
        let _ = self.tx.send(UiUpdate::Flush(batch));
    }
}

/// Reports job completion to the UI.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<UiUpdate>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<UiUpdate>) -> Self {
        Self { tx }
    }
}

impl PollObserver for ChannelObserver {
    fn on_complete(&self) {
        let _ = self.tx.send(UiUpdate::Completed);
    }
}
