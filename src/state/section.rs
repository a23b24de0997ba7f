use crate::console::classifier;
use crate::console::RenderedLine;
use crate::types::{PrefixCode, ScopedStatus, SectionStatus, SectionType};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(pub usize);

/// One foldable group of console lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub section_type: Option<SectionType>,
    pub status: Option<ScopedStatus>,
    pub errored: bool,
    pub multiline: bool,
    pub open: bool,
    pub lines: Vec<RenderedLine>,
}

impl Section {
    fn new(id: SectionId) -> Self {
        Self {
            id,
            section_type: None,
            status: None,
            errored: false,
            multiline: false,
            open: true,
            lines: Vec::new(),
        }
    }

    pub fn attributes(&self) -> SectionAttributes {
        SectionAttributes {
            section_type: self.section_type,
            status: self.status,
            errored: self.errored,
            multiline: self.multiline,
        }
    }

    /// Status for display: task and cancel sections that are still receiving
    /// lines report `running` until a terminal line arrives.
    pub fn display_status(&self) -> Option<SectionStatus> {
        match (self.status, self.section_type) {
            (Some(scoped), _) => Some(scoped.status),
            (None, Some(SectionType::Task | SectionType::Cancel)) if self.open => {
                Some(SectionStatus::Running)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionAttributes {
    pub section_type: Option<SectionType>,
    pub status: Option<ScopedStatus>,
    pub errored: bool,
    pub multiline: bool,
}

/// Structural change destined for a render sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    AppendSection {
        section: SectionId,
        after: Option<SectionId>,
    },
    AppendLine {
        section: SectionId,
        line: RenderedLine,
    },
    SetOpen {
        section: SectionId,
        open: bool,
    },
    SetAttributes {
        section: SectionId,
        attributes: SectionAttributes,
    },
    /// Emitted once per section, the first time it holds more than one line.
    AttachFoldToggle { section: SectionId },
}

impl RenderOp {
    pub fn section(&self) -> SectionId {
        match self {
            RenderOp::AppendSection { section, .. }
            | RenderOp::AppendLine { section, .. }
            | RenderOp::SetOpen { section, .. }
            | RenderOp::SetAttributes { section, .. }
            | RenderOp::AttachFoldToggle { section } => *section,
        }
    }
}

/// The operations produced by one `transform` call, split into the two
/// groups a sink applies in a single commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushBatch {
    /// Section that was open when the batch started.
    pub continued: Option<SectionId>,
    /// Changes to `continued`.
    pub continuation: Vec<RenderOp>,
    /// New sections and everything written into them.
    pub appended: Vec<RenderOp>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.continuation.is_empty() && self.appended.is_empty()
    }

    pub fn ops(&self) -> impl Iterator<Item = &RenderOp> {
        self.continuation.iter().chain(self.appended.iter())
    }
}

/// Append-only arena of sections. Ids are indices and are never reused.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SectionTree {
    sections: Vec<Section>,
    #[serde(skip)]
    pending: Vec<RenderOp>,
}

impl SectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn last(&self) -> Option<&Section> {
        self.sections.last()
    }

    /// Drains recorded operations, routing those aimed at `continued` into
    /// the continuation group. Relative order within each group is kept.
    pub fn take_flush(&mut self, continued: Option<SectionId>) -> FlushBatch {
        let (continuation, appended) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|op| Some(op.section()) == continued);
        FlushBatch {
            continued,
            continuation,
            appended,
        }
    }

    fn append_section(&mut self) -> SectionId {
        let id = SectionId(self.sections.len());
        let after = self.sections.last().map(|section| section.id);
        self.sections.push(Section::new(id));
        self.pending.push(RenderOp::AppendSection { section: id, after });
        id
    }

    fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0]
    }

    fn record_attributes(&mut self, id: SectionId) {
        let attributes = self.sections[id.0].attributes();
        self.pending.push(RenderOp::SetAttributes {
            section: id,
            attributes,
        });
    }
}

/// Handle on the section currently receiving lines.
///
/// A cursor only holds an id; all state lives in the [`SectionTree`]. Closing
/// consumes the cursor, so a closed section cannot be written again.
#[derive(Debug)]
pub struct SectionCursor {
    id: SectionId,
}

impl SectionCursor {
    /// Appends a fresh open section to `tree` and points a cursor at it.
    pub fn add_to(tree: &mut SectionTree) -> Self {
        Self {
            id: tree.append_section(),
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn has_type(&self, tree: &SectionTree) -> bool {
        self.section(tree).section_type.is_some()
    }

    pub fn section_type(&self, tree: &SectionTree) -> Option<SectionType> {
        self.section(tree).section_type
    }

    pub fn section<'t>(&self, tree: &'t SectionTree) -> &'t Section {
        &tree.sections[self.id.0]
    }

    /// Assigns the section type from the first prefixed line. Later calls are ignored.
    pub fn assign_type(&self, tree: &mut SectionTree, prefix: Option<PrefixCode>) {
        let section = tree.section_mut(self.id);
        if section.section_type.is_some() {
            return;
        }
        section.section_type = Some(classifier::classify_prefix(prefix));
        tree.record_attributes(self.id);
    }

    pub fn is_part_of_section(&self, tree: &SectionTree, prefix: Option<PrefixCode>) -> bool {
        self.section_type(tree)
            .is_some_and(|section_type| classifier::is_part_of_section(section_type, prefix))
    }

    pub fn detect_status(&self, tree: &mut SectionTree, prefix: Option<PrefixCode>) {
        let section = tree.section_mut(self.id);
        let before = section.attributes();

        if classifier::is_error_signal(prefix) {
            section.errored = true;
        }

        // a killed build leaves no task status line; infer it from the on-cancel task
        // starting while a task section is still open. Prep sections are left alone.
        if section.section_type == Some(SectionType::Task)
            && prefix == Some(PrefixCode::CancelTaskStart)
        {
            section.status = Some(ScopedStatus::task(SectionStatus::Cancelled));
            section.errored = true;
        }

        match prefix {
            Some(PrefixCode::Pass | PrefixCode::CancelTaskPass) => {
                section.status = Some(ScopedStatus::task(SectionStatus::Passed));
            }
            Some(PrefixCode::Fail | PrefixCode::CancelTaskFail) => {
                section.status = Some(ScopedStatus::task(SectionStatus::Failed));
            }
            Some(PrefixCode::JobPass) => {
                section.status = Some(ScopedStatus::job(SectionStatus::Passed));
            }
            Some(PrefixCode::JobFail) => {
                section.status = Some(ScopedStatus::job(SectionStatus::Failed));
            }
            _ => {}
        }

        if section.attributes() != before {
            tree.record_attributes(self.id);
        }
    }

    /// Flags the section as foldable. Only the first call signals the sink.
    pub fn mark_multiline(&self, tree: &mut SectionTree) {
        let section = tree.section_mut(self.id);
        if section.multiline {
            return;
        }
        section.multiline = true;
        tree.pending
            .push(RenderOp::AttachFoldToggle { section: self.id });
        tree.record_attributes(self.id);
    }

    pub fn write(&self, tree: &mut SectionTree, line: RenderedLine) {
        tree.section_mut(self.id).lines.push(line.clone());
        tree.pending.push(RenderOp::AppendLine {
            section: self.id,
            line,
        });
    }

    /// Closes this section (errored sections stay expanded) and starts an
    /// open sibling after it.
    pub fn close_and_start_new(self, tree: &mut SectionTree) -> SectionCursor {
        let section = tree.section_mut(self.id);
        if !section.errored {
            section.open = false;
            tree.pending.push(RenderOp::SetOpen {
                section: self.id,
                open: false,
            });
        }

        let section = &tree.sections[self.id.0];
        debug!(
            section = self.id.0,
            section_type = ?section.section_type,
            status = ?section.status,
            errored = section.errored,
            lines = section.lines.len(),
            "section closed"
        );

        SectionCursor::add_to(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{LineKind, StyledLine};

    fn fresh() -> (SectionTree, SectionCursor) {
        let mut tree = SectionTree::new();
        let cursor = SectionCursor::add_to(&mut tree);
        (tree, cursor)
    }

    fn line(ordinal: u64) -> RenderedLine {
        RenderedLine {
            ordinal,
            timestamp: String::new(),
            prefix: None,
            kind: LineKind::Basic,
            content: StyledLine::line_break(),
        }
    }

    #[test]
    fn test_assign_type_only_once() {
        let (mut tree, cursor) = fresh();
        assert!(!cursor.has_type(&tree));
        cursor.assign_type(&mut tree, Some(PrefixCode::TaskStart));
        cursor.assign_type(&mut tree, Some(PrefixCode::Info));
        assert_eq!(cursor.section_type(&tree), Some(SectionType::Task));
    }

    #[test]
    fn test_assign_type_defaults_to_info() {
        let (mut tree, cursor) = fresh();
        cursor.assign_type(&mut tree, None);
        assert_eq!(cursor.section_type(&tree), Some(SectionType::Info));
    }

    #[test]
    fn test_detect_status_failures() {
        for (prefix, scope_status) in [
            (PrefixCode::Fail, ScopedStatus::task(SectionStatus::Failed)),
            (PrefixCode::JobFail, ScopedStatus::job(SectionStatus::Failed)),
            (
                PrefixCode::CancelTaskFail,
                ScopedStatus::task(SectionStatus::Failed),
            ),
        ] {
            let (mut tree, cursor) = fresh();
            cursor.detect_status(&mut tree, Some(prefix));
            let section = cursor.section(&tree);
            assert!(section.errored, "{}", prefix.name());
            assert_eq!(section.status, Some(scope_status));
        }
    }

    #[test]
    fn test_detect_status_infers_cancellation_inside_task() {
        let (mut tree, cursor) = fresh();
        cursor.assign_type(&mut tree, Some(PrefixCode::TaskStart));
        cursor.detect_status(&mut tree, Some(PrefixCode::CancelTaskStart));
        let section = cursor.section(&tree);
        assert!(section.errored);
        assert_eq!(
            section.status,
            Some(ScopedStatus::task(SectionStatus::Cancelled))
        );
    }

    #[test]
    fn test_detect_status_does_not_infer_cancellation_inside_prep() {
        let (mut tree, cursor) = fresh();
        cursor.assign_type(&mut tree, Some(PrefixCode::Prep));
        cursor.detect_status(&mut tree, Some(PrefixCode::CancelTaskStart));
        let section = cursor.section(&tree);
        assert!(!section.errored);
        assert_eq!(section.status, None);
    }

    #[test]
    fn test_detect_status_successes() {
        for (prefix, expected) in [
            (PrefixCode::Pass, ScopedStatus::task(SectionStatus::Passed)),
            (PrefixCode::JobPass, ScopedStatus::job(SectionStatus::Passed)),
            (
                PrefixCode::CancelTaskPass,
                ScopedStatus::task(SectionStatus::Passed),
            ),
        ] {
            let (mut tree, cursor) = fresh();
            cursor.detect_status(&mut tree, Some(prefix));
            let section = cursor.section(&tree);
            assert!(!section.errored);
            assert_eq!(section.status, Some(expected));
        }
    }

    #[test]
    fn test_errored_is_never_cleared() {
        let (mut tree, cursor) = fresh();
        cursor.assign_type(&mut tree, Some(PrefixCode::TaskStart));
        cursor.detect_status(&mut tree, Some(PrefixCode::Fail));
        cursor.detect_status(&mut tree, Some(PrefixCode::Pass));
        cursor.detect_status(&mut tree, Some(PrefixCode::Out));
        let section = cursor.section(&tree);
        assert!(section.errored);
        assert_eq!(
            section.status,
            Some(ScopedStatus::task(SectionStatus::Passed))
        );
    }

    #[test]
    fn test_mark_multiline_signals_once() {
        let (mut tree, cursor) = fresh();
        cursor.write(&mut tree, line(1));
        for _ in 0..3 {
            cursor.mark_multiline(&mut tree);
        }
        let batch = tree.take_flush(Some(cursor.id()));
        let toggles = batch
            .ops()
            .filter(|op| matches!(op, RenderOp::AttachFoldToggle { .. }))
            .count();
        assert_eq!(toggles, 1);
        assert!(cursor.section(&tree).multiline);
    }

    #[test]
    fn test_close_collapses_clean_section_and_appends_open_sibling() {
        let (mut tree, cursor) = fresh();
        let old = cursor.id();
        let next = cursor.close_and_start_new(&mut tree);

        assert!(!tree.get(old).unwrap().open);
        assert!(next.section(&tree).open);
        assert_eq!(tree.sections()[0].id, old);
        assert_eq!(tree.sections()[1].id, next.id());
    }

    #[test]
    fn test_close_leaves_errored_section_expanded() {
        let (mut tree, cursor) = fresh();
        cursor.detect_status(&mut tree, Some(PrefixCode::Fail));
        let old = cursor.id();
        let _next = cursor.close_and_start_new(&mut tree);
        assert!(tree.get(old).unwrap().open);
    }

    #[test]
    fn test_take_flush_routes_ops_by_section() {
        let (mut tree, cursor) = fresh();
        let first = cursor.id();
        let _ = tree.take_flush(None);

        cursor.write(&mut tree, line(1));
        let next = cursor.close_and_start_new(&mut tree);
        next.write(&mut tree, line(2));

        let batch = tree.take_flush(Some(first));
        assert!(batch.continuation.iter().all(|op| op.section() == first));
        assert_eq!(batch.continuation.len(), 2);
        assert!(matches!(
            batch.appended[0],
            RenderOp::AppendSection { after: Some(after), .. } if after == first
        ));
        assert!(tree.take_flush(Some(next.id())).is_empty());
    }

    #[test]
    fn test_running_status_for_open_task() {
        let (mut tree, cursor) = fresh();
        cursor.assign_type(&mut tree, Some(PrefixCode::TaskStart));
        assert_eq!(
            cursor.section(&tree).display_status(),
            Some(SectionStatus::Running)
        );
        cursor.detect_status(&mut tree, Some(PrefixCode::Pass));
        assert_eq!(
            cursor.section(&tree).display_status(),
            Some(SectionStatus::Passed)
        );
    }
}
