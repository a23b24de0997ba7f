use super::mode::RuntimeMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollAction {
    LineUp,
    LineDown,
    PageUp(usize),
    PageDown(usize),
    Home,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserInputEvent {
    Quit,
    ToggleTimestamps,
    /// Collapse every foldable section, or expand them all again.
    ToggleFolding,
    ToggleSelected,
    SelectNext,
    SelectPrevious,
    Scroll(ScrollAction),
    /// The console pane now shows this many rows.
    Viewport(usize),
}

pub trait FrontendAdapter<M: RuntimeMode> {
    fn poll_user_input(&mut self, mode: &M) -> Option<UserInputEvent>;
    fn render(&mut self, mode: &M);
    fn should_quit(&self) -> bool;
}
