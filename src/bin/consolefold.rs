use anyhow::Result;
use consolefold::api::logging::{init_tracing, LogTarget};
use consolefold::app::{build_runtime, ConsoleMode, KEY_HINTS};
use consolefold::config::Config;
use consolefold::runtime::frontend::{FrontendAdapter, ScrollAction, UserInputEvent};
use consolefold::terminal;
use consolefold::ui::layout::split_console_layout;
use consolefold::ui::render::{render_console, render_key_hints, render_status_line};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tracing::info;

const INPUT_POLL: Duration = Duration::from_millis(16);

fn map_key(key: KeyEvent, page_rows: usize) -> Option<UserInputEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => Some(UserInputEvent::Quit),
            _ => None,
        };
    }

    let page = page_rows.max(1);
    let event = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UserInputEvent::Quit,
        KeyCode::Char('t') => UserInputEvent::ToggleTimestamps,
        KeyCode::Char('c') => UserInputEvent::ToggleFolding,
        KeyCode::Char(' ') | KeyCode::Enter => UserInputEvent::ToggleSelected,
        KeyCode::Char('n') | KeyCode::Tab => UserInputEvent::SelectNext,
        KeyCode::Char('p') | KeyCode::BackTab => UserInputEvent::SelectPrevious,
        KeyCode::Up | KeyCode::Char('k') => UserInputEvent::Scroll(ScrollAction::LineUp),
        KeyCode::Down | KeyCode::Char('j') => UserInputEvent::Scroll(ScrollAction::LineDown),
        KeyCode::PageUp => UserInputEvent::Scroll(ScrollAction::PageUp(page)),
        KeyCode::PageDown => UserInputEvent::Scroll(ScrollAction::PageDown(page)),
        KeyCode::Home | KeyCode::Char('g') => UserInputEvent::Scroll(ScrollAction::Home),
        KeyCode::End | KeyCode::Char('G') => UserInputEvent::Scroll(ScrollAction::End),
        _ => return None,
    };
    Some(event)
}

struct ManagedTuiFrontend {
    terminal: terminal::TerminalType,
    console_rows: usize,
    reported_rows: Option<usize>,
    quit: bool,
}

impl ManagedTuiFrontend {
    fn new() -> Result<Self> {
        let terminal = terminal::setup()?;
        Ok(Self {
            terminal,
            console_rows: 1,
            reported_rows: None,
            quit: false,
        })
    }
}

impl Drop for ManagedTuiFrontend {
    fn drop(&mut self) {
        let _ = terminal::restore();
    }
}

impl FrontendAdapter<ConsoleMode> for ManagedTuiFrontend {
    fn poll_user_input(&mut self, _mode: &ConsoleMode) -> Option<UserInputEvent> {
        if self.reported_rows != Some(self.console_rows) {
            self.reported_rows = Some(self.console_rows);
            return Some(UserInputEvent::Viewport(self.console_rows));
        }

        let Ok(has_event) = event::poll(INPUT_POLL) else {
            self.quit = true;
            return None;
        };
        if !has_event {
            return None;
        }

        let Ok(ev) = event::read() else {
            self.quit = true;
            return None;
        };

        match ev {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                map_key(key, self.console_rows)
            }
            Event::Resize(_, height) => {
                // header and footer take one row each
                self.console_rows = height.saturating_sub(2).max(1) as usize;
                self.reported_rows = Some(self.console_rows);
                Some(UserInputEvent::Viewport(self.console_rows))
            }
            _ => None,
        }
    }

    fn render(&mut self, mode: &ConsoleMode) {
        let status = mode.status_line();
        let top = mode.scroll_offset();
        let options = mode.render_options();
        let mut console_rows = self.console_rows;

        let _ = self.terminal.draw(|frame| {
            let panes = split_console_layout(frame.area());
            console_rows = panes.console.height.max(1) as usize;

            render_status_line(frame, panes.header, &status);
            render_console(frame, panes.console, mode.view(), top, options);
            render_key_hints(frame, panes.footer, KEY_HINTS);
        });

        self.console_rows = console_rows;
    }

    fn should_quit(&self) -> bool {
        self.quit
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let target = init_tracing()?;
    if let LogTarget::File(path) = &target {
        info!(path = %path.display(), "logging to file");
    }
    info!(console_url = %config.console_url, "starting console viewer");

    let (mut runtime, poll_task) = build_runtime(&config)?;
    let cancel = poll_task.cancel_token();
    let poll_handle = poll_task.spawn();

    let mut frontend = ManagedTuiFrontend::new()?;
    runtime.run(&mut frontend).await;
    drop(frontend);

    cancel.cancel();
    let _ = poll_handle.await;
    Ok(())
}
