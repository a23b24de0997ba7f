use super::frontend::UserInputEvent;
use super::update::UiUpdate;

pub trait RuntimeMode {
    fn on_update(&mut self, update: UiUpdate);
    fn on_frontend_event(&mut self, event: UserInputEvent);
    fn quit_requested(&self) -> bool;
}
