use super::section::{
    FlushBatch, RenderOp, SectionAttributes, SectionCursor, SectionId, SectionTree,
};
use crate::console::classifier::is_explicit_end_boundary;
use crate::console::{
    parse_log_line, render_basic, render_continuation, render_header, LineKind, ParsedLine,
    RenderedLine,
};
use crate::types::LinePrefix;
use tracing::debug;

/// Receiver of structural console changes. The transformer never reads back
/// from a sink.
pub trait RenderSink: Send {
    fn append_section(&mut self, section: SectionId, after: Option<SectionId>);
    fn append_line(&mut self, section: SectionId, line: RenderedLine);
    fn set_section_open(&mut self, section: SectionId, open: bool);
    fn set_section_attributes(&mut self, section: SectionId, attributes: SectionAttributes);
    fn attach_fold_toggle(&mut self, section: SectionId);

    /// Applies one batch as a unit: continuation first, then appended sections.
    fn commit(&mut self, batch: FlushBatch) {
        for op in batch.continuation.into_iter().chain(batch.appended) {
            apply_op(self, op);
        }
    }
}

pub fn apply_op<S: RenderSink + ?Sized>(sink: &mut S, op: RenderOp) {
    match op {
        RenderOp::AppendSection { section, after } => sink.append_section(section, after),
        RenderOp::AppendLine { section, line } => sink.append_line(section, line),
        RenderOp::SetOpen { section, open } => sink.set_section_open(section, open),
        RenderOp::SetAttributes {
            section,
            attributes,
        } => sink.set_section_attributes(section, attributes),
        RenderOp::AttachFoldToggle { section } => sink.attach_fold_toggle(section),
    }
}

/// Anything that consumes ordered batches of raw console lines.
pub trait Transform: Send {
    fn transform(&mut self, lines: &[String]);

    /// Processes work held back while deferred. No-op by default.
    fn dequeue(&mut self) {}
}

/// Builds the section tree from raw console lines, one batch at a time.
///
/// Batches must arrive in stream order and must not overlap. The section
/// open at the end of a batch is carried into the next one.
pub struct LogTransformer<S> {
    sink: S,
    tree: SectionTree,
    current: Option<SectionCursor>,
    line_number: u64,
    deferred: bool,
    queued: Vec<String>,
}

impl<S: RenderSink> LogTransformer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            tree: SectionTree::new(),
            current: None,
            line_number: 0,
            deferred: false,
            queued: Vec::new(),
        }
    }

    /// A transformer that holds incoming lines until [`LogTransformer::dequeue`].
    pub fn deferred(sink: S) -> Self {
        Self {
            deferred: true,
            ..Self::new(sink)
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn tree(&self) -> &SectionTree {
        &self.tree
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Number of lines consumed so far.
    pub fn line_count(&self) -> u64 {
        self.line_number
    }

    pub fn transform<L: AsRef<str>>(&mut self, lines: &[L]) {
        if self.deferred {
            self.queued
                .extend(lines.iter().map(|line| line.as_ref().to_string()));
            return;
        }
        self.process(lines);
    }

    /// Stops deferring and processes everything queued as a single batch.
    pub fn dequeue(&mut self) {
        self.deferred = false;
        let queued = std::mem::take(&mut self.queued);
        self.process(&queued);
    }

    fn process<L: AsRef<str>>(&mut self, lines: &[L]) {
        if lines.is_empty() {
            return;
        }

        let mut cursor = match self.current.take() {
            Some(cursor) => cursor,
            None => SectionCursor::add_to(&mut self.tree),
        };
        let continued = cursor.id();

        for raw in lines {
            self.line_number += 1;
            cursor = self.consume(cursor, parse_log_line(raw.as_ref()));
        }
        self.current = Some(cursor);

        let batch = self.tree.take_flush(Some(continued));
        debug!(
            lines = lines.len(),
            continuation_ops = batch.continuation.len(),
            appended_ops = batch.appended.len(),
            "flushing console batch"
        );
        self.sink.commit(batch);
    }

    fn consume(&mut self, cursor: SectionCursor, parsed: ParsedLine) -> SectionCursor {
        let tree = &mut self.tree;
        let ordinal = self.line_number;
        let ParsedLine {
            prefix,
            timestamp,
            content,
        } = parsed;

        let Some(prefix) = prefix else {
            cursor.write(
                tree,
                RenderedLine {
                    ordinal,
                    timestamp,
                    prefix: None,
                    kind: LineKind::Basic,
                    content: render_basic(&content),
                },
            );
            return cursor;
        };

        let code = prefix.code();
        let header = |prefix: LinePrefix, timestamp: String| RenderedLine {
            ordinal,
            timestamp,
            prefix: Some(prefix),
            kind: LineKind::Header,
            content: render_header(code, &content),
        };

        cursor.detect_status(tree, code);

        if !cursor.has_type(tree) {
            cursor.assign_type(tree, code);
            cursor.write(tree, header(prefix, timestamp));

            if is_explicit_end_boundary(code) {
                return cursor.close_and_start_new(tree);
            }
            cursor
        } else if cursor.is_part_of_section(tree, code) {
            cursor.mark_multiline(tree);
            cursor.write(
                tree,
                RenderedLine {
                    ordinal,
                    timestamp,
                    prefix: Some(prefix),
                    kind: LineKind::Continuation,
                    content: render_continuation(code, &content),
                },
            );

            if is_explicit_end_boundary(code) {
                return cursor.close_and_start_new(tree);
            }
            cursor
        } else {
            let next = cursor.close_and_start_new(tree);
            next.assign_type(tree, code);
            next.write(tree, header(prefix, timestamp));
            next
        }
    }
}

impl<S: RenderSink> Transform for LogTransformer<S> {
    fn transform(&mut self, lines: &[String]) {
        LogTransformer::transform(self, lines);
    }

    fn dequeue(&mut self) {
        LogTransformer::dequeue(self);
    }
}

struct NamedTransformer {
    name: String,
    inner: Box<dyn Transform>,
}

/// Feeds every batch to several transformers, e.g. one per console pane.
#[derive(Default)]
pub struct MultiplexingTransformer {
    transformers: Vec<NamedTransformer>,
}

impl MultiplexingTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, transformer: impl Transform + 'static) -> Self {
        self.push(name, transformer);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, transformer: impl Transform + 'static) {
        self.transformers.push(NamedTransformer {
            name: name.into(),
            inner: Box::new(transformer),
        });
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Dequeues the transformer called `name`, or all of them for `None`.
    pub fn dequeue_named(&mut self, name: Option<&str>) {
        for named in &mut self.transformers {
            if name.map_or(true, |wanted| named.name == wanted) {
                named.inner.dequeue();
            }
        }
    }
}

impl Transform for MultiplexingTransformer {
    fn transform(&mut self, lines: &[String]) {
        for named in &mut self.transformers {
            named.inner.transform(lines);
        }
    }

    fn dequeue(&mut self) {
        self.dequeue_named(None);
    }
}
