use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsoleLayout {
    pub header: Rect,
    pub console: Rect,
    pub footer: Rect,
}

pub fn split_console_layout(area: Rect) -> ConsoleLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    ConsoleLayout {
        header: chunks[0],
        console: chunks[1],
        footer: chunks[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_splits_into_three_panes() {
        let area = Rect::new(0, 0, 80, 20);
        let panes = split_console_layout(area);

        assert_eq!(panes.header.height, 1);
        assert_eq!(panes.console.height, 18);
        assert_eq!(panes.footer.height, 1);
        assert_eq!(panes.header.y, 0);
        assert_eq!(panes.console.y, 1);
        assert_eq!(panes.footer.y, 19);
    }

    #[test]
    fn layout_keeps_console_row_on_tiny_terminal() {
        let panes = split_console_layout(Rect::new(0, 0, 40, 3));

        assert_eq!(panes.console.height, 1);
        assert_eq!(panes.header.height, 1);
        assert_eq!(panes.footer.height, 1);
    }
}
