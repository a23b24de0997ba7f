use consolefold::api::MockLogSource;
use consolefold::runtime::{FetchState, NotifyOutcome, PollObserver, Poller};
use consolefold::state::{ConsoleView, LogTransformer, MultiplexingTransformer, RenderSink};
use consolefold::types::{SectionStatus, SectionType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const FIRST_FETCH: &str = "\
##|09:00:00.000 Job started on agent-7
pr|09:00:01.000 Start to prepare pipeline/12/build/1/compile
pr|09:00:02.000 Cleaning working directory
!!|09:00:03.000 [go] Task: ./gradlew build
&1|09:00:04.000 > Task :compileJava
";

const SECOND_FETCH: &str = "\
&2|09:00:05.000 warning: deprecated API
?0|09:00:06.000 [go] Task status: passed (1234 ms)
j0|09:00:07.000 [go] Current job status: passed
";

#[derive(Default)]
struct Counts {
    updates: AtomicUsize,
    completions: AtomicUsize,
}

impl PollObserver for Counts {
    fn on_update(&self) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_incremental_fetches_build_folded_console() {
    let source = MockLogSource::new()
        .with_chunk(FIRST_FETCH, 5)
        .with_chunk(SECOND_FETCH, 8);
    let counts = Arc::new(Counts::default());
    let poller =
        Poller::new(source.clone(), LogTransformer::new(ConsoleView::new())).with_observer(counts.clone());

    assert_eq!(
        poller.notify(false).await,
        NotifyOutcome::Updated {
            lines: 5,
            finished: false
        }
    );
    assert_eq!(
        poller.notify(true).await,
        NotifyOutcome::Updated {
            lines: 3,
            finished: true
        }
    );
    assert_eq!(poller.notify(true).await, NotifyOutcome::Skipped);
    assert_eq!(source.requested_offsets(), vec![0, 5]);
    assert_eq!(poller.cursor().state, FetchState::Finished);
    assert_eq!(counts.updates.load(Ordering::SeqCst), 2);
    assert_eq!(counts.completions.load(Ordering::SeqCst), 1);

    let transformer = poller.transformer().await;
    let view = transformer.sink();
    assert_eq!(view.commit_count(), 2);
    assert_eq!(view.line_count(), 8);

    let types: Vec<Option<SectionType>> = view
        .sections()
        .iter()
        .map(|section| section.attributes.section_type)
        .collect();
    assert_eq!(
        types,
        vec![
            Some(SectionType::Info),
            Some(SectionType::Prep),
            Some(SectionType::Task),
            Some(SectionType::Result),
            None,
        ]
    );

    let task = &view.sections()[2];
    assert_eq!(task.lines.len(), 4);
    assert_eq!(task.status(), Some(SectionStatus::Passed));
    assert!(task.has_toggle);
    assert!(!task.open);
    assert_eq!(task.visible_lines().len(), 1);

    let result = &view.sections()[3];
    assert_eq!(result.lines[0].content.code(), Some("passed"));
    assert!(view.has_foldable_sections());
}

#[tokio::test]
async fn test_equal_offset_updates_without_transforming() {
    let source = MockLogSource::new()
        .with_chunk("##|09:00:00.000 hello\n", 1)
        .with_chunk("", 1);
    let counts = Arc::new(Counts::default());
    let poller =
        Poller::new(source, LogTransformer::new(ConsoleView::new())).with_observer(counts.clone());

    poller.notify(false).await;
    let outcome = poller.notify(false).await;

    assert_eq!(
        outcome,
        NotifyOutcome::Updated {
            lines: 0,
            finished: false
        }
    );
    assert_eq!(counts.updates.load(Ordering::SeqCst), 2);
    assert_eq!(poller.transformer().await.sink().commit_count(), 1);
}

#[tokio::test]
async fn test_failed_fetch_is_retried_from_same_offset() {
    let source = MockLogSource::new()
        .with_failure(500)
        .with_chunk("##|09:00:00.000 recovered\n", 1);
    let poller = Poller::new(source.clone(), LogTransformer::new(ConsoleView::new()));

    assert!(matches!(poller.notify(false).await, NotifyOutcome::Failed(_)));
    assert_eq!(poller.cursor().next_offset, 0);
    assert!(matches!(
        poller.notify(false).await,
        NotifyOutcome::Updated { lines: 1, .. }
    ));
    assert_eq!(source.requested_offsets(), vec![0, 0]);
}

/// Sink shared with the test so a pane can be inspected while the
/// multiplexer owns its transformer.
#[derive(Clone, Default)]
struct SharedView(Arc<Mutex<ConsoleView>>);

impl RenderSink for SharedView {
    fn append_section(
        &mut self,
        section: consolefold::state::SectionId,
        after: Option<consolefold::state::SectionId>,
    ) {
        self.0.lock().unwrap().append_section(section, after);
    }

    fn append_line(
        &mut self,
        section: consolefold::state::SectionId,
        line: consolefold::console::RenderedLine,
    ) {
        self.0.lock().unwrap().append_line(section, line);
    }

    fn set_section_open(&mut self, section: consolefold::state::SectionId, open: bool) {
        self.0.lock().unwrap().set_section_open(section, open);
    }

    fn set_section_attributes(
        &mut self,
        section: consolefold::state::SectionId,
        attributes: consolefold::state::SectionAttributes,
    ) {
        self.0
            .lock()
            .unwrap()
            .set_section_attributes(section, attributes);
    }

    fn attach_fold_toggle(&mut self, section: consolefold::state::SectionId) {
        self.0.lock().unwrap().attach_fold_toggle(section);
    }

    fn commit(&mut self, batch: consolefold::state::FlushBatch) {
        self.0.lock().unwrap().commit(batch);
    }
}

#[tokio::test]
async fn test_deferred_pane_catches_up_on_dequeue() {
    let console = SharedView::default();
    let failures = SharedView::default();
    let multiplexer = MultiplexingTransformer::new()
        .with("console", LogTransformer::new(console.clone()))
        .with("failures", LogTransformer::deferred(failures.clone()));

    let source = MockLogSource::new().with_chunk(FIRST_FETCH, 5);
    let poller = Poller::new(source, multiplexer);
    poller.notify(false).await;

    assert_eq!(console.0.lock().unwrap().line_count(), 5);
    assert_eq!(failures.0.lock().unwrap().line_count(), 0);

    poller.transformer().await.dequeue_named(Some("failures"));

    let failures = failures.0.lock().unwrap();
    assert_eq!(failures.line_count(), 5);
    assert_eq!(failures.commit_count(), 1);
}
