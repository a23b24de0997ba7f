//! Minimal SGR decoder: turns text with ANSI escape sequences into styled runs.
//!
//! Only "select graphic rendition" (`ESC [ ... m`) changes styling. Every other
//! CSI sequence, OSC strings and two-byte escapes are consumed and dropped so
//! they never leak into the rendered text.

use ratatui::style::{Color, Modifier, Style};
use serde::{Deserialize, Serialize};

const ESC: char = '\u{1b}';
const BEL: char = '\u{7}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub style: Style,
}

#[derive(Debug, Clone, Copy, Default)]
struct SgrState {
    fg: Option<Color>,
    bg: Option<Color>,
    modifiers: Modifier,
    // bold also brightens the basic foreground palette, as most terminals do
    bright: bool,
}

impl SgrState {
    fn style(&self) -> Style {
        let mut style = Style::default().add_modifier(self.modifiers);
        if let Some(fg) = self.fg {
            style = style.fg(fg);
        }
        if let Some(bg) = self.bg {
            style = style.bg(bg);
        }
        style
    }

    fn apply(&mut self, params: &str) {
        let codes: Vec<u16> = if params.is_empty() {
            vec![0]
        } else {
            params
                .split([';', ':'])
                .map(|part| part.parse::<u16>().unwrap_or(0))
                .collect()
        };

        let mut i = 0;
        while i < codes.len() {
            let code = codes[i];
            match code {
                0 => *self = SgrState::default(),
                1 => {
                    self.bright = true;
                    self.modifiers.insert(Modifier::BOLD);
                }
                2 => self.modifiers.insert(Modifier::DIM),
                3 => self.modifiers.insert(Modifier::ITALIC),
                4 => self.modifiers.insert(Modifier::UNDERLINED),
                5 => self.modifiers.insert(Modifier::SLOW_BLINK),
                6 => self.modifiers.insert(Modifier::RAPID_BLINK),
                7 => self.modifiers.insert(Modifier::REVERSED),
                8 => self.modifiers.insert(Modifier::HIDDEN),
                9 => self.modifiers.insert(Modifier::CROSSED_OUT),
                22 => {
                    self.bright = false;
                    self.modifiers.remove(Modifier::BOLD | Modifier::DIM);
                }
                23 => self.modifiers.remove(Modifier::ITALIC),
                24 => self.modifiers.remove(Modifier::UNDERLINED),
                25 => self
                    .modifiers
                    .remove(Modifier::SLOW_BLINK | Modifier::RAPID_BLINK),
                27 => self.modifiers.remove(Modifier::REVERSED),
                28 => self.modifiers.remove(Modifier::HIDDEN),
                29 => self.modifiers.remove(Modifier::CROSSED_OUT),
                30..=37 => self.fg = Some(palette(code - 30, self.bright)),
                38 => {
                    let (color, consumed) = extended_color(&codes[i + 1..]);
                    if color.is_some() {
                        self.fg = color;
                    }
                    i += consumed;
                }
                39 => self.fg = None,
                40..=47 => self.bg = Some(palette(code - 40, false)),
                48 => {
                    let (color, consumed) = extended_color(&codes[i + 1..]);
                    if color.is_some() {
                        self.bg = color;
                    }
                    i += consumed;
                }
                49 => self.bg = None,
                90..=97 => self.fg = Some(palette(code - 90, true)),
                100..=107 => self.bg = Some(palette(code - 100, true)),
                _ => {}
            }
            i += 1;
        }
    }
}

fn palette(index: u16, bright: bool) -> Color {
    match (index, bright) {
        (0, false) => Color::Black,
        (1, false) => Color::Red,
        (2, false) => Color::Green,
        (3, false) => Color::Yellow,
        (4, false) => Color::Blue,
        (5, false) => Color::Magenta,
        (6, false) => Color::Cyan,
        (7, false) => Color::Gray,
        (0, true) => Color::DarkGray,
        (1, true) => Color::LightRed,
        (2, true) => Color::LightGreen,
        (3, true) => Color::LightYellow,
        (4, true) => Color::LightBlue,
        (5, true) => Color::LightMagenta,
        (6, true) => Color::LightCyan,
        _ => Color::White,
    }
}

/// Parses the tail of a `38;...`/`48;...` sequence. Returns the color (if
/// well formed) and how many parameters were consumed.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest {
        [5, index, ..] => (u8::try_from(*index).ok().map(Color::Indexed), 2),
        [2, r, g, b, ..] => {
            let rgb = (u8::try_from(*r), u8::try_from(*g), u8::try_from(*b));
            match rgb {
                (Ok(r), Ok(g), Ok(b)) => (Some(Color::Rgb(r, g, b)), 4),
                _ => (None, 4),
            }
        }
        [5] => (None, 1),
        [2, ..] => (None, rest.len()),
        _ => (None, 0),
    }
}

struct RunBuilder {
    runs: Vec<StyledRun>,
    text: String,
    style: Style,
}

impl RunBuilder {
    fn restyle(&mut self, style: Style) {
        if style == self.style {
            return;
        }
        self.flush();
        self.style = style;
    }

    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        match self.runs.last_mut() {
            Some(last) if last.style == self.style => last.text.push_str(&text),
            _ => self.runs.push(StyledRun {
                text,
                style: self.style,
            }),
        }
    }
}

/// Decodes `input` into styled runs. Adjacent runs never share a style and
/// no run is empty.
pub fn decode(input: &str) -> Vec<StyledRun> {
    let mut state = SgrState::default();
    let mut builder = RunBuilder {
        runs: Vec::new(),
        text: String::new(),
        style: state.style(),
    };
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != ESC {
            builder.text.push(ch);
            continue;
        }

        match chars.next() {
            Some('[') => {
                let mut params = String::new();
                let mut final_byte = None;
                for next in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&next) {
                        final_byte = Some(next);
                        break;
                    }
                    params.push(next);
                }
                if final_byte == Some('m') {
                    state.apply(&params);
                    builder.restyle(state.style());
                }
            }
            Some(']') => {
                while let Some(next) = chars.next() {
                    if next == BEL {
                        break;
                    }
                    if next == ESC && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    builder.flush();
    builder.runs
}

/// Removes escape sequences, keeping only the visible text.
pub fn strip(input: &str) -> String {
    decode(input).into_iter().map(|run| run.text).collect()
}
