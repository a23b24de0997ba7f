use crate::api::{CompletionProbe, ConsoleClient, LogSource};
use crate::config::Config;
use crate::runtime::frontend::{ScrollAction, UserInputEvent};
use crate::runtime::mode::RuntimeMode;
use crate::runtime::r#loop::Runtime;
use crate::runtime::{ChannelObserver, ChannelSink, NotifyOutcome, Poller, UiUpdate};
use crate::state::{ConsoleView, LogTransformer, RenderSink, SectionId};
use crate::ui::render::ConsoleRenderOptions;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const KEY_HINTS: &str =
    "q quit  t timestamps  c collapse all  n/p select  space fold  ↑↓ PgUp PgDn Home End";

struct ScrollState {
    offset: usize,
    auto_follow: bool,
    viewport_rows: usize,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            auto_follow: true,
            viewport_rows: 1,
        }
    }
}

#[derive(Debug, Default)]
struct PollStats {
    lines: usize,
    next_offset: u64,
    finished: bool,
    last_error: Option<String>,
}

/// UI state for the console viewer: the mirrored section tree plus scroll,
/// selection and display toggles.
pub struct ConsoleMode {
    view: ConsoleView,
    scroll: ScrollState,
    stats: PollStats,
    selected: Option<SectionId>,
    show_timestamps: bool,
    source_label: String,
    quit_requested: bool,
}

impl ConsoleMode {
    pub fn new(source_label: impl Into<String>, show_timestamps: bool) -> Self {
        Self {
            view: ConsoleView::new(),
            scroll: ScrollState::default(),
            stats: PollStats::default(),
            selected: None,
            show_timestamps,
            source_label: source_label.into(),
            quit_requested: false,
        }
    }

    pub fn view(&self) -> &ConsoleView {
        &self.view
    }

    pub fn is_finished(&self) -> bool {
        self.stats.finished
    }

    pub fn show_timestamps(&self) -> bool {
        self.show_timestamps
    }

    pub fn selected(&self) -> Option<SectionId> {
        self.selected
    }

    pub fn render_options(&self) -> ConsoleRenderOptions {
        ConsoleRenderOptions {
            show_timestamps: self.show_timestamps,
            selected: self.selected,
        }
    }

    pub fn status_line(&self) -> String {
        let state = if self.stats.finished {
            "finished"
        } else {
            "running"
        };
        let mut status = format!(
            "{}  {state}  lines:{} offset:{}",
            self.source_label,
            self.view.line_count(),
            self.stats.next_offset
        );
        if self.view.is_collapsed() {
            status.push_str("  [collapsed]");
        }
        if !self.scroll.auto_follow {
            status.push_str("  [scrolled]");
        }
        if let Some(error) = &self.stats.last_error {
            status.push_str(&format!("  [error] {error}"));
        }
        status
    }

    pub fn visible_line_count(&self) -> usize {
        self.view.visible_lines().count()
    }

    fn max_scroll_offset(&self) -> usize {
        self.visible_line_count()
            .saturating_sub(self.scroll.viewport_rows.max(1))
    }

    /// First visible row of the console pane.
    pub fn scroll_offset(&self) -> usize {
        if self.scroll.auto_follow {
            self.max_scroll_offset()
        } else {
            self.scroll.offset.min(self.max_scroll_offset())
        }
    }

    fn set_scroll_offset(&mut self, offset: usize) {
        let max = self.max_scroll_offset();
        self.scroll.offset = offset.min(max);
        self.scroll.auto_follow = self.scroll.offset >= max;
    }

    fn apply_scroll(&mut self, action: ScrollAction) {
        let current = self.scroll_offset();
        match action {
            ScrollAction::LineUp => self.set_scroll_offset(current.saturating_sub(1)),
            ScrollAction::LineDown => self.set_scroll_offset(current.saturating_add(1)),
            ScrollAction::PageUp(step) => {
                self.set_scroll_offset(current.saturating_sub(step.max(1)))
            }
            ScrollAction::PageDown(step) => {
                self.set_scroll_offset(current.saturating_add(step.max(1)))
            }
            ScrollAction::Home => {
                self.scroll.offset = 0;
                self.scroll.auto_follow = self.max_scroll_offset() == 0;
            }
            ScrollAction::End => {
                self.scroll.offset = self.max_scroll_offset();
                self.scroll.auto_follow = true;
            }
        }
    }

    fn foldable_sections(&self) -> Vec<SectionId> {
        self.view
            .sections()
            .iter()
            .filter(|section| section.has_toggle)
            .map(|section| section.id)
            .collect()
    }

    fn select_relative(&mut self, forward: bool) {
        let foldable = self.foldable_sections();
        if foldable.is_empty() {
            return;
        }

        let current = self
            .selected
            .and_then(|id| foldable.iter().position(|&candidate| candidate == id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => foldable.len() - 1,
            (Some(pos), true) => (pos + 1).min(foldable.len() - 1),
            (Some(pos), false) => pos.saturating_sub(1),
        };
        self.selected = Some(foldable[next]);
        self.reveal_selected();
    }

    /// Scrolls just enough to bring the selected section's first line into view.
    fn reveal_selected(&mut self) {
        let Some(selected) = self.selected else {
            return;
        };
        let Some(row) = self
            .view
            .visible_lines()
            .position(|(section, _)| section.id == selected)
        else {
            return;
        };

        let top = self.scroll_offset();
        let rows = self.scroll.viewport_rows.max(1);
        if row < top {
            self.set_scroll_offset(row);
        } else if row >= top + rows {
            self.set_scroll_offset(row + 1 - rows);
        }
    }

    fn toggle_selected(&mut self) {
        if let Some(id) = self.selected {
            let top = self.scroll_offset();
            let following = self.scroll.auto_follow;
            self.view.toggle_section(id);
            if !following {
                self.set_scroll_offset(top);
            }
        }
    }
}

impl RuntimeMode for ConsoleMode {
    fn on_update(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Flush(batch) => {
                let top = self.scroll_offset();
                self.view.commit(batch);
                if !self.scroll.auto_follow {
                    self.scroll.offset = top;
                }
            }
            UiUpdate::Polled { lines, next_offset } => {
                self.stats.lines += lines;
                self.stats.next_offset = next_offset;
                self.stats.last_error = None;
            }
            UiUpdate::FetchFailed(error) => {
                self.stats.last_error = Some(error);
            }
            UiUpdate::Completed => {
                self.stats.finished = true;
            }
        }
    }

    fn on_frontend_event(&mut self, event: UserInputEvent) {
        match event {
            UserInputEvent::Quit => self.quit_requested = true,
            UserInputEvent::ToggleTimestamps => self.show_timestamps = !self.show_timestamps,
            UserInputEvent::ToggleFolding => {
                self.view.toggle_folding();
                if !self.scroll.auto_follow {
                    let top = self.scroll.offset;
                    self.set_scroll_offset(top);
                }
            }
            UserInputEvent::ToggleSelected => self.toggle_selected(),
            UserInputEvent::SelectNext => self.select_relative(true),
            UserInputEvent::SelectPrevious => self.select_relative(false),
            UserInputEvent::Scroll(action) => self.apply_scroll(action),
            UserInputEvent::Viewport(rows) => self.scroll.viewport_rows = rows.max(1),
        }
    }

    fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

pub type ConsolePoller<S> = Poller<S, LogTransformer<ChannelSink>>;

/// Background loop that probes job completion and polls the console on a
/// fixed interval until the job finishes or the task is cancelled.
pub struct PollTask<S> {
    poller: Arc<ConsolePoller<S>>,
    interval: Duration,
    update_tx: mpsc::UnboundedSender<UiUpdate>,
    cancel: CancellationToken,
}

impl<S> PollTask<S>
where
    S: LogSource + CompletionProbe + 'static,
{
    pub fn new(source: S, config: &Config, update_tx: mpsc::UnboundedSender<UiUpdate>) -> Self {
        let transformer = LogTransformer::new(ChannelSink::new(update_tx.clone()));
        let poller = Poller::new(source, transformer)
            .with_chunk_size(config.chunk_size)
            .with_observer(Arc::new(ChannelObserver::new(update_tx.clone())));

        Self {
            poller: Arc::new(poller),
            interval: Duration::from_millis(config.poll_interval_ms),
            update_tx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn poller(&self) -> &Arc<ConsolePoller<S>> {
        &self.poller
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("console polling cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if self.poller.is_finished() {
                info!("job finished; console polling stopped");
                break;
            }

            // a slow fetch must not delay the next tick; the poller skips overlapping calls
            let poller = Arc::clone(&self.poller);
            let update_tx = self.update_tx.clone();
            tokio::spawn(async move {
                poll_once(&poller, &update_tx).await;
            });
        }
    }
}

/// One tick: ask whether the job has finished, then fetch and transform.
pub async fn poll_once<S>(
    poller: &ConsolePoller<S>,
    update_tx: &mpsc::UnboundedSender<UiUpdate>,
) -> NotifyOutcome
where
    S: LogSource + CompletionProbe,
{
    if poller.is_finished() {
        return NotifyOutcome::Skipped;
    }

    let completed = match poller.source().is_completed().await {
        Ok(completed) => completed,
        Err(error) => {
            warn!("job status check failed: {error}");
            false
        }
    };

    let outcome = poller.notify(completed).await;
    match &outcome {
        NotifyOutcome::Updated { lines, .. } => {
            let _ = update_tx.send(UiUpdate::Polled {
                lines: *lines,
                next_offset: poller.cursor().next_offset,
            });
        }
        NotifyOutcome::Failed(error) => {
            let _ = update_tx.send(UiUpdate::FetchFailed(error.clone()));
        }
        NotifyOutcome::Skipped => {}
    }
    outcome
}

pub fn build_runtime(config: &Config) -> Result<(Runtime<ConsoleMode>, PollTask<ConsoleClient>)> {
    let client = ConsoleClient::new(config)?;
    let (update_tx, update_rx) = mpsc::unbounded_channel::<UiUpdate>();

    let poll_task = PollTask::new(client, config, update_tx);
    let mode = ConsoleMode::new(config.console_url.clone(), config.show_timestamps);
    Ok((Runtime::new(mode, update_rx), poll_task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockLogSource;
    use crate::state::FlushBatch;

    fn test_config() -> Config {
        Config {
            console_url: "http://ci.local/console.log".to_string(),
            job_status_url: None,
            poll_interval_ms: 250,
            chunk_size: 1000,
            request_timeout_ms: 1000,
            show_timestamps: false,
        }
    }

    fn batch_for(lines: &[&str]) -> Vec<FlushBatch> {
        #[derive(Default)]
        struct Collect(Vec<FlushBatch>);

        impl RenderSink for Collect {
            fn append_section(&mut self, _: SectionId, _: Option<SectionId>) {}
            fn append_line(&mut self, _: SectionId, _: crate::console::RenderedLine) {}
            fn set_section_open(&mut self, _: SectionId, _: bool) {}
            fn set_section_attributes(&mut self, _: SectionId, _: crate::state::SectionAttributes) {}
            fn attach_fold_toggle(&mut self, _: SectionId) {}
            fn commit(&mut self, batch: FlushBatch) {
                self.0.push(batch);
            }
        }

        let mut transformer = LogTransformer::new(Collect::default());
        transformer.transform(lines);
        transformer.into_sink().0
    }

    fn mode_with(lines: &[&str], viewport: usize) -> ConsoleMode {
        let mut mode = ConsoleMode::new("ci", false);
        mode.on_frontend_event(UserInputEvent::Viewport(viewport));
        for batch in batch_for(lines) {
            mode.on_update(UiUpdate::Flush(batch));
        }
        mode
    }

    const BUILD: &[&str] = &[
        "##|10:00:00.000 Job started",
        "!!|10:00:01.000 [go] Task: make build",
        "&1|10:00:02.000 cc -c main.c",
        "&1|10:00:03.000 cc -o app main.o",
        "?1|10:00:04.000 [go] Task status: failed",
        "!!|10:00:05.000 [go] Task: make test",
        "&1|10:00:06.000 running 3 tests",
        "?0|10:00:07.000 [go] Task status: passed",
        "j1|10:00:08.000 [go] Current job status: failed",
    ];

    #[test]
    fn test_flush_updates_view_and_status_line() {
        let mut mode = mode_with(BUILD, 20);
        mode.on_update(UiUpdate::Polled {
            lines: 9,
            next_offset: 9,
        });
        mode.on_update(UiUpdate::Completed);

        assert_eq!(mode.view().line_count(), 9);
        assert!(mode.is_finished());
        assert_eq!(mode.status_line(), "ci  finished  lines:9 offset:9");
    }

    #[test]
    fn test_fetch_failure_is_shown_until_next_poll() {
        let mut mode = ConsoleMode::new("ci", false);
        mode.on_update(UiUpdate::FetchFailed("'ci' returned HTTP 503".to_string()));
        assert!(mode.status_line().ends_with("[error] 'ci' returned HTTP 503"));

        mode.on_update(UiUpdate::Polled {
            lines: 0,
            next_offset: 0,
        });
        assert!(!mode.status_line().contains("[error]"));
    }

    #[test]
    fn test_scroll_follows_tail_until_user_scrolls() {
        let mut mode = mode_with(BUILD, 2);
        // the failed task stays expanded: info, 4 task lines, folded test task, result
        assert_eq!(mode.visible_line_count(), 7);
        assert_eq!(mode.scroll_offset(), 5);

        mode.on_frontend_event(UserInputEvent::Scroll(ScrollAction::PageUp(3)));
        assert_eq!(mode.scroll_offset(), 2);
        assert!(mode.status_line().contains("[scrolled]"));

        mode.on_frontend_event(UserInputEvent::Scroll(ScrollAction::Home));
        assert_eq!(mode.scroll_offset(), 0);

        mode.on_frontend_event(UserInputEvent::Scroll(ScrollAction::End));
        assert_eq!(mode.scroll_offset(), 5);
        assert!(!mode.status_line().contains("[scrolled]"));
    }

    #[test]
    fn test_select_and_toggle_folded_section() {
        let mut mode = mode_with(BUILD, 20);
        let before = mode.visible_line_count();

        mode.on_frontend_event(UserInputEvent::SelectPrevious);
        let selected = mode.selected().unwrap();
        assert!(!mode.view().get(selected).unwrap().open);

        mode.on_frontend_event(UserInputEvent::ToggleSelected);
        assert!(mode.view().get(selected).unwrap().open);
        assert_eq!(mode.visible_line_count(), before + 2);

        mode.on_frontend_event(UserInputEvent::SelectPrevious);
        assert_ne!(mode.selected(), Some(selected));
        mode.on_frontend_event(UserInputEvent::SelectNext);
        assert_eq!(mode.selected(), Some(selected));
    }

    #[test]
    fn test_collapse_all_and_timestamps() {
        let mut mode = mode_with(BUILD, 20);

        mode.on_frontend_event(UserInputEvent::ToggleFolding);
        assert!(mode.view().is_collapsed());
        assert!(mode.status_line().contains("[collapsed]"));

        mode.on_frontend_event(UserInputEvent::ToggleTimestamps);
        assert!(mode.render_options().show_timestamps);

        mode.on_frontend_event(UserInputEvent::Quit);
        assert!(mode.quit_requested());
    }

    #[tokio::test]
    async fn test_poll_once_reports_lines_and_completion() {
        let source = MockLogSource::new().with_chunk("##|10:00:00.000 hello\n", 1);
        source.set_completed(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = PollTask::new(source, &test_config(), tx.clone());

        let outcome = poll_once(task.poller(), &tx).await;

        assert_eq!(
            outcome,
            NotifyOutcome::Updated {
                lines: 1,
                finished: true
            }
        );
        assert!(matches!(rx.try_recv(), Ok(UiUpdate::Flush(_))));
        assert_eq!(rx.try_recv().unwrap(), UiUpdate::Completed);
        assert_eq!(
            rx.try_recv().unwrap(),
            UiUpdate::Polled {
                lines: 1,
                next_offset: 1
            }
        );
        assert_eq!(poll_once(task.poller(), &tx).await, NotifyOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_poll_once_forwards_failures() {
        let source = MockLogSource::new().with_failure(502);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = PollTask::new(source, &test_config(), tx.clone());

        let outcome = poll_once(task.poller(), &tx).await;

        assert!(matches!(outcome, NotifyOutcome::Failed(_)));
        assert!(matches!(rx.try_recv(), Ok(UiUpdate::FetchFailed(message)) if message.contains("502")));
    }

    #[tokio::test]
    async fn test_poll_task_stops_after_completion() {
        let source = MockLogSource::new().with_chunk("##|10:00:00.000 done\n", 1);
        source.set_completed(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = PollTask::new(source, &test_config(), tx).with_interval(Duration::from_millis(5));
        let poller = Arc::clone(task.poller());

        tokio::time::timeout(Duration::from_secs(5), task.spawn())
            .await
            .expect("poll task should stop once the job finished")
            .unwrap();

        assert!(poller.is_finished());
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert!(updates.contains(&UiUpdate::Completed));
    }

    #[tokio::test]
    async fn test_poll_task_stops_on_cancel() {
        let source = MockLogSource::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let task =
            PollTask::new(source, &test_config(), tx).with_interval(Duration::from_millis(5));
        let cancel = task.cancel_token();
        let handle = task.spawn();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poll task should stop when cancelled")
            .unwrap();
    }
}
