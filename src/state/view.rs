use super::section::{FlushBatch, SectionAttributes, SectionId};
use super::transformer::{apply_op, RenderSink};
use crate::console::RenderedLine;
use crate::types::SectionStatus;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSection {
    pub id: SectionId,
    pub attributes: SectionAttributes,
    pub open: bool,
    pub has_toggle: bool,
    pub lines: Vec<RenderedLine>,
}

impl ViewSection {
    fn new(id: SectionId) -> Self {
        Self {
            id,
            attributes: SectionAttributes {
                section_type: None,
                status: None,
                errored: false,
                multiline: false,
            },
            open: true,
            has_toggle: false,
            lines: Vec::new(),
        }
    }

    /// Folded sections only show their first line.
    pub fn visible_lines(&self) -> &[RenderedLine] {
        if self.has_toggle && !self.open {
            &self.lines[..self.lines.len().min(1)]
        } else {
            &self.lines
        }
    }

    pub fn status(&self) -> Option<SectionStatus> {
        self.attributes.status.map(|scoped| scoped.status)
    }
}

/// In-memory render sink: the display-side copy of the section tree plus the
/// fold state the user controls.
#[derive(Debug, Default, Serialize)]
pub struct ConsoleView {
    sections: Vec<ViewSection>,
    #[serde(skip)]
    positions: HashMap<SectionId, usize>,
    commits: usize,
    collapsed: bool,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[ViewSection] {
        &self.sections
    }

    pub fn get(&self, id: SectionId) -> Option<&ViewSection> {
        self.positions.get(&id).map(|&pos| &self.sections[pos])
    }

    /// Number of batches applied so far.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn line_count(&self) -> usize {
        self.sections.iter().map(|section| section.lines.len()).sum()
    }

    /// True once any line has been classified, i.e. the log uses prefixed
    /// lines and folding controls make sense.
    pub fn has_foldable_sections(&self) -> bool {
        self.sections
            .iter()
            .any(|section| section.attributes.section_type.is_some())
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Flips one section. Sections without a fold toggle cannot be folded.
    pub fn toggle_section(&mut self, id: SectionId) -> bool {
        let Some(&pos) = self.positions.get(&id) else {
            return false;
        };
        let section = &mut self.sections[pos];
        if !section.has_toggle {
            return false;
        }
        section.open = !section.open;
        true
    }

    /// Collapses every typed section, or expands them all when already collapsed.
    /// Returns the new collapsed state.
    pub fn toggle_folding(&mut self) -> bool {
        if !self.has_foldable_sections() {
            return self.collapsed;
        }
        self.collapsed = !self.collapsed;
        let open = !self.collapsed;
        for section in &mut self.sections {
            if section.attributes.section_type.is_some() {
                section.open = open;
            }
        }
        self.collapsed
    }

    /// Every line that should currently be displayed, in order.
    pub fn visible_lines(&self) -> impl Iterator<Item = (&ViewSection, &RenderedLine)> {
        self.sections.iter().flat_map(|section| {
            section
                .visible_lines()
                .iter()
                .map(move |line| (section, line))
        })
    }

    fn section_mut(&mut self, id: SectionId) -> Option<&mut ViewSection> {
        let pos = *self.positions.get(&id)?;
        self.sections.get_mut(pos)
    }
}

impl RenderSink for ConsoleView {
    fn append_section(&mut self, section: SectionId, after: Option<SectionId>) {
        let pos = after
            .and_then(|after| self.positions.get(&after))
            .map_or(self.sections.len(), |&pos| pos + 1);
        self.sections.insert(pos, ViewSection::new(section));
        for (offset, shifted) in self.sections[pos..].iter().enumerate() {
            self.positions.insert(shifted.id, pos + offset);
        }
    }

    fn append_line(&mut self, section: SectionId, line: RenderedLine) {
        if let Some(target) = self.section_mut(section) {
            target.lines.push(line);
        }
    }

    fn set_section_open(&mut self, section: SectionId, open: bool) {
        if let Some(target) = self.section_mut(section) {
            target.open = open;
        }
    }

    fn set_section_attributes(&mut self, section: SectionId, attributes: SectionAttributes) {
        if let Some(target) = self.section_mut(section) {
            target.attributes = attributes;
        }
    }

    fn attach_fold_toggle(&mut self, section: SectionId) {
        if let Some(target) = self.section_mut(section) {
            target.has_toggle = true;
        }
    }

    fn commit(&mut self, batch: FlushBatch) {
        self.commits += 1;
        for op in batch.continuation.into_iter().chain(batch.appended) {
            apply_op(self, op);
        }
    }
}
