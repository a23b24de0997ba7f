use crate::console::{LineKind, RenderedLine, Segment};
use crate::state::{ConsoleView, SectionId, ViewSection};
use crate::types::SectionStatus;
use crate::ui::input_metrics::{display_width, truncate_line};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::Paragraph,
    Frame,
};

const FOLD_OPEN: &str = "▾ ";
const FOLD_CLOSED: &str = "▸ ";
const NO_FOLD: &str = "  ";
const TIMESTAMP_WIDTH: usize = 12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsoleRenderOptions {
    pub show_timestamps: bool,
    pub selected: Option<SectionId>,
}

fn status_color(section: &ViewSection) -> Option<Color> {
    if section.attributes.errored {
        return Some(Color::Red);
    }
    match section.status()? {
        SectionStatus::Running => Some(Color::Cyan),
        SectionStatus::Passed => Some(Color::Green),
        SectionStatus::Failed => Some(Color::Red),
        SectionStatus::Cancelled => Some(Color::Yellow),
    }
}

fn gutter(section: &ViewSection, line: &RenderedLine, selected: bool) -> Span<'static> {
    let first_line = section
        .lines
        .first()
        .is_some_and(|first| first.ordinal == line.ordinal);
    let marker = match (section.has_toggle && first_line, section.open) {
        (true, true) => FOLD_OPEN,
        (true, false) => FOLD_CLOSED,
        (false, _) => NO_FOLD,
    };

    let mut style = Style::default();
    if let Some(color) = status_color(section) {
        style = style.fg(color);
    }
    if selected && first_line {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(marker, style)
}

/// Builds one terminal row for a console line.
pub fn console_line(
    section: &ViewSection,
    line: &RenderedLine,
    options: ConsoleRenderOptions,
) -> Line<'static> {
    let mut spans = vec![gutter(
        section,
        line,
        options.selected == Some(section.id),
    )];

    if options.show_timestamps {
        spans.push(Span::styled(
            format!("{:>width$} ", line.timestamp, width = TIMESTAMP_WIDTH),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let header_style = match (line.kind, status_color(section)) {
        (LineKind::Header, Some(color)) => Style::default().fg(color),
        _ => Style::default(),
    };

    for segment in &line.content.segments {
        match segment {
            Segment::Text(run) => spans.push(Span::styled(
                run.text.clone(),
                header_style.patch(run.style),
            )),
            Segment::Code { text } => spans.push(Span::styled(
                text.clone(),
                header_style.add_modifier(Modifier::BOLD),
            )),
            Segment::Break => {}
        }
    }

    Line::from(spans)
}

/// The rows visible in a window of `rows` lines starting at `top`.
pub fn console_window(
    view: &ConsoleView,
    top: usize,
    rows: usize,
    options: ConsoleRenderOptions,
) -> Vec<Line<'static>> {
    view.visible_lines()
        .skip(top)
        .take(rows)
        .map(|(section, line)| console_line(section, line, options))
        .collect()
}

pub fn render_console(
    frame: &mut Frame<'_>,
    area: Rect,
    view: &ConsoleView,
    top: usize,
    options: ConsoleRenderOptions,
) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let lines = console_window(view, top, area.height as usize, options);
    frame.render_widget(Paragraph::new(Text::from(lines)), area);
}

pub fn render_status_line(frame: &mut Frame<'_>, area: Rect, status: &str) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let text = truncate_line(status, area.width as usize);
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

/// Key hints, right-aligned.
pub fn render_key_hints(frame: &mut Frame<'_>, area: Rect, hints: &str) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let width = area.width as usize;
    let text = truncate_line(hints, width);
    let padding = width.saturating_sub(display_width(&text));
    frame.render_widget(
        Paragraph::new(format!("{}{text}", " ".repeat(padding)))
            .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
