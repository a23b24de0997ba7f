use tokio::sync::mpsc;

use super::{frontend::FrontendAdapter, mode::RuntimeMode, update::UiUpdate};

pub struct Runtime<M: RuntimeMode> {
    pub mode: M,
    update_rx: mpsc::UnboundedReceiver<UiUpdate>,
}

impl<M: RuntimeMode> Runtime<M> {
    pub fn new(mode: M, update_rx: mpsc::UnboundedReceiver<UiUpdate>) -> Self {
        Self { mode, update_rx }
    }

    /// Drains pending updates into the mode without blocking. Returns how
    /// many were applied.
    pub fn drain_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.update_rx.try_recv() {
            self.mode.on_update(update);
            applied += 1;
        }
        applied
    }

    /// Runs until the frontend or the mode asks to quit. Frames are only
    /// redrawn after an update or an input event.
    pub async fn run<F: FrontendAdapter<M>>(&mut self, frontend: &mut F) {
        let mut dirty = true;
        loop {
            if self.drain_updates() > 0 {
                dirty = true;
            }
            if dirty {
                frontend.render(&self.mode);
                dirty = false;
            }

            if let Some(event) = frontend.poll_user_input(&self.mode) {
                self.mode.on_frontend_event(event);
                dirty = true;
            }

            if frontend.should_quit() || self.mode.quit_requested() {
                break;
            }
            tokio::task::yield_now().await;
        }
    }
}
