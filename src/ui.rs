use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, InputMode, MIN_INPUT_HEIGHT};
use crate::session::{self, Role, QUICK_QUESTIONS};

/// Colors for one theme. Dark is the default; `t` flips to the light set.
struct Palette {
    bg: Color,
    fg: Color,
    dim: Color,
    border: Color,
    user: Color,
    agent: Color,
    accent: Color,
    error: Color,
    match_fg: Color,
    match_bg: Color,
    current_bg: Color,
}

impl Palette {
    fn for_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                bg: Color::Black,
                fg: Color::White,
                dim: Color::DarkGray,
                border: Color::DarkGray,
                user: Color::Cyan,
                agent: Color::Yellow,
                accent: Color::Cyan,
                error: Color::Red,
                match_fg: Color::Black,
                match_bg: Color::Yellow,
                current_bg: Color::Magenta,
            }
        } else {
            Self {
                bg: Color::White,
                fg: Color::Black,
                dim: Color::Gray,
                border: Color::Gray,
                user: Color::Blue,
                agent: Color::Magenta,
                accent: Color::Blue,
                error: Color::Red,
                match_fg: Color::Black,
                match_bg: Color::LightYellow,
                current_bg: Color::LightMagenta,
            }
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let palette = Palette::for_mode(app.dark_mode);
    let area = frame.area();

    // Paint the theme background first
    frame.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        area,
    );

    let mut constraints = vec![Constraint::Length(1), Constraint::Min(0)];
    if app.session.last_error.is_some() {
        constraints.push(Constraint::Length(3));
    }
    if app.status.is_some() {
        constraints.push(Constraint::Length(1));
    }
    if app.show_search {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(app.input_height.max(MIN_INPUT_HEIGHT)));
    constraints.push(Constraint::Length(1));

    let chunks = Layout::vertical(constraints).split(area);
    let mut idx = 0;

    let header_area = chunks[idx];
    idx += 1;
    let chat_area = chunks[idx];
    idx += 1;
    let error_area = if app.session.last_error.is_some() {
        idx += 1;
        Some(chunks[idx - 1])
    } else {
        None
    };
    let status_area = if app.status.is_some() {
        idx += 1;
        Some(chunks[idx - 1])
    } else {
        None
    };
    let search_area = if app.show_search {
        idx += 1;
        Some(chunks[idx - 1])
    } else {
        None
    };
    let input_area = chunks[idx];
    idx += 1;
    let footer_area = chunks[idx];

    render_header(app, frame, header_area, &palette);
    render_chat(app, frame, chat_area, &palette);
    if let Some(rect) = error_area {
        render_error(app, frame, rect, &palette);
    }
    if let Some(rect) = status_area {
        render_status(app, frame, rect, &palette);
    }
    if let Some(rect) = search_area {
        render_search(app, frame, rect, &palette);
    }
    render_input(app, frame, input_area, &palette);
    render_footer(app, frame, footer_area, &palette);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let mut spans = vec![
        Span::styled(
            " Weather Chat ",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.dim),
        ),
    ];

    if app.session.pending {
        spans.push(Span::styled(
            "  [waiting for agent]",
            Style::default().fg(palette.dim),
        ));
    }
    if !app.chime.enabled {
        spans.push(Span::styled("  [muted]", Style::default().fg(palette.dim)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let match_count = app.session.search.results.len();
    let title = if app.session.search.query.is_empty() {
        " Chat ".to_string()
    } else if match_count == 1 {
        " Chat (1 match) ".to_string()
    } else {
        format!(" Chat ({} matches) ", match_count)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title(title);

    if app.session.messages.is_empty() && !app.session.pending {
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(
                "Hey Siri, What's the weather looking like today?",
                Style::default()
                    .fg(palette.dim)
                    .add_modifier(Modifier::ITALIC),
            )),
            Line::default(),
        ];
        for (i, (label, prompt)) in QUICK_QUESTIONS.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} ", i + 1),
                    Style::default()
                        .fg(palette.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("{label}: "), Style::default().fg(palette.fg)),
                Span::styled(prompt.to_string(), Style::default().fg(palette.dim)),
            ]));
        }

        let greeting = Paragraph::new(Text::from(lines))
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(greeting, area);
        return;
    }

    let chat = Paragraph::new(Text::from(transcript_lines(app, palette)))
        .block(block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn transcript_lines(app: &App, palette: &Palette) -> Vec<Line<'static>> {
    let query = app.session.search.query.clone();
    let current = app.session.current_match();
    let mut lines: Vec<Line<'static>> = Vec::new();

    for (i, message) in app.session.messages.iter().enumerate() {
        let is_match = app.session.search.results.contains(&i);
        let (speaker, color) = match message.role {
            Role::User => ("You", palette.user),
            Role::Agent => ("Weather Agent", palette.agent),
        };

        let mut header = vec![
            Span::styled(
                format!("[{}] ", message.timestamp.format("%H:%M")),
                Style::default().fg(palette.dim),
            ),
            Span::styled(
                format!("{speaker}:"),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ];
        if current == Some(i) {
            header.push(Span::styled(
                "  ◀ match",
                Style::default().fg(palette.accent),
            ));
        }
        lines.push(Line::from(header));

        let base = Style::default().fg(palette.fg);
        let mark = Style::default().fg(palette.match_fg).bg(if current == Some(i) {
            palette.current_bg
        } else {
            palette.match_bg
        });

        let mut in_code_block = false;
        for content_line in message.content.lines() {
            if message.role == Role::Agent && content_line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
                lines.push(Line::from(Span::styled(
                    content_line.to_string(),
                    Style::default().fg(palette.dim),
                )));
                continue;
            }

            if is_match && !query.is_empty() {
                lines.push(highlighted_line(content_line, &query, base, mark));
            } else if message.role == Role::Agent {
                if in_code_block {
                    lines.push(Line::from(Span::styled(
                        content_line.to_string(),
                        Style::default().fg(palette.accent),
                    )));
                } else {
                    lines.push(markup_line(content_line, palette));
                }
            } else {
                lines.push(Line::from(Span::styled(content_line.to_string(), base)));
            }
        }
        if message.content.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::default());
    }

    if app.session.pending {
        lines.push(Line::from(Span::styled(
            "Weather Agent:",
            Style::default()
                .fg(palette.agent)
                .add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("{}{}", app.session.latest_hint(), dots),
            Style::default()
                .fg(palette.dim)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// One content line with every occurrence of `query` marked.
fn highlighted_line(text: &str, query: &str, base: Style, mark: Style) -> Line<'static> {
    let ranges = session::highlight_ranges(text, query);
    if ranges.is_empty() {
        return Line::from(Span::styled(text.to_string(), base));
    }

    let mut spans = Vec::new();
    let mut pos = 0;
    for (start, end) in ranges {
        if start > pos {
            spans.push(Span::styled(text[pos..start].to_string(), base));
        }
        spans.push(Span::styled(text[start..end].to_string(), mark));
        pos = end;
    }
    if pos < text.len() {
        spans.push(Span::styled(text[pos..].to_string(), base));
    }

    Line::from(spans)
}

/// Style one line of agent text: `#` headings, `-`/`*` bullets, `**bold**`
/// and backtick code spans. Anything unclosed stays literal.
fn markup_line(text: &str, palette: &Palette) -> Line<'static> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('#') {
        let title = trimmed.trim_start_matches('#').trim_start();
        return Line::from(Span::styled(
            title.to_string(),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ));
    }

    let base = Style::default().fg(palette.fg);
    let code = Style::default().fg(palette.accent);

    let indent = &text[..text.len() - trimmed.len()];
    if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        let mut spans = vec![Span::styled(
            format!("{indent}• "),
            Style::default().fg(palette.dim),
        )];
        spans.extend(inline_spans(rest, base, code));
        return Line::from(spans);
    }

    Line::from(inline_spans(text, base, code))
}

/// Split inline text into plain, `**bold**` and backtick-code spans.
fn inline_spans(text: &str, base: Style, code: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = text;

    loop {
        match rest.find('`') {
            Some(start) => match rest[start + 1..].find('`') {
                Some(len) => {
                    if start > 0 {
                        spans.extend(bold_spans(&rest[..start], base));
                    }
                    let code_text = &rest[start + 1..start + 1 + len];
                    if !code_text.is_empty() {
                        spans.push(Span::styled(code_text.to_string(), code));
                    }
                    rest = &rest[start + 1 + len + 1..];
                }
                None => {
                    // No closing backtick; keep the rest literal
                    spans.extend(bold_spans(rest, base));
                    break;
                }
            },
            None => {
                if !rest.is_empty() {
                    spans.extend(bold_spans(rest, base));
                }
                break;
            }
        }
    }

    spans
}

fn bold_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        match rest[start + 2..].find("**") {
            Some(len) => {
                if start > 0 {
                    spans.push(Span::styled(rest[..start].to_string(), base));
                }
                let bold_text = &rest[start + 2..start + 2 + len];
                if !bold_text.is_empty() {
                    spans.push(Span::styled(
                        bold_text.to_string(),
                        base.add_modifier(Modifier::BOLD),
                    ));
                }
                rest = &rest[start + 2 + len + 2..];
            }
            None => break,
        }
    }
    if !rest.is_empty() {
        spans.push(Span::styled(rest.to_string(), base));
    }

    spans
}

fn render_error(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let message = app.session.last_error.clone().unwrap_or_default();
    let error = Paragraph::new(Line::from(vec![
        Span::styled(message, Style::default().fg(palette.error)),
        Span::styled("  (Esc to dismiss)", Style::default().fg(palette.dim)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.error))
            .title(" Error "),
    );
    frame.render_widget(error, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let status = app.status.clone().unwrap_or_default();
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!(" {status}"),
            Style::default().fg(palette.dim),
        )),
        area,
    );
}

fn render_search(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let search = &app.session.search;
    let counter = if search.query.is_empty() {
        String::new()
    } else if search.results.is_empty() {
        "no matches".to_string()
    } else {
        format!("{}/{}", search.cursor + 1, search.results.len())
    };

    let bar = Paragraph::new(Line::from(vec![
        Span::styled(search.query.clone(), Style::default().fg(palette.fg)),
        Span::styled(format!("  {counter}"), Style::default().fg(palette.dim)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent))
            .title(" Search "),
    );
    frame.render_widget(bar, area);

    let cursor_x = area.x + 1 + search.query.chars().count() as u16;
    frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(2)), area.y + 1));
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    app.input_width = area.width.saturating_sub(2);

    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing && !app.show_search {
        palette.accent
    } else {
        palette.border
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Ask about the weather ");

    let width = app.input_width.max(1) as usize;
    let visible_rows = area.height.saturating_sub(2).max(1);

    let rows = wrap_chars(&app.session.draft, width);
    let (cursor_row, cursor_col) = cursor_position(&app.session.draft, app.draft_cursor, width);

    // Keep the cursor row in view
    let scroll = cursor_row.saturating_sub(visible_rows - 1);

    let text: Vec<Line> = if app.session.draft.is_empty() {
        vec![Line::from(Span::styled(
            "Ask about the weather...",
            Style::default().fg(palette.dim),
        ))]
    } else {
        rows.into_iter()
            .map(|row| Line::from(Span::styled(row, Style::default().fg(palette.fg))))
            .collect()
    };

    let input = Paragraph::new(Text::from(text))
        .block(block)
        .scroll((scroll, 0));
    frame.render_widget(input, area);

    if editing && !app.show_search {
        frame.set_cursor_position((
            area.x + 1 + cursor_col,
            area.y + 1 + cursor_row.saturating_sub(scroll),
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let hint = if app.show_search {
        " type to search · Enter/Ctrl-n next · Ctrl-p prev · Esc close"
    } else {
        match app.input_mode {
            InputMode::Editing => " Enter send · Alt+Enter newline · Esc commands · Ctrl-C quit",
            InputMode::Normal => {
                " i edit · / search · 1-4 quick questions · e export · c clear · t theme · m sound · q quit"
            }
        }
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(palette.dim))),
        area,
    );
}

/// Char-exact wrapping for the input box; each logical line is cut into
/// `width`-char rows. `cursor_position` assumes this exact layout.
fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            rows.push(chunk.iter().collect());
        }
    }
    rows
}

/// Row and column of the caret inside the char-wrapped draft.
fn cursor_position(text: &str, cursor: usize, width: usize) -> (u16, u16) {
    let mut row: u16 = 0;
    let mut remaining = cursor;

    for line in text.split('\n') {
        let chars = line.chars().count();
        if remaining <= chars {
            row += (remaining / width) as u16;
            let col = (remaining % width) as u16;
            return (row, col);
        }
        row += crate::app::wrapped_line_count(line, width);
        remaining -= chars + 1;
    }

    (row, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn test_palette() -> Palette {
        Palette::for_mode(true)
    }

    #[test]
    fn test_markup_heading() {
        let palette = test_palette();
        let line = markup_line("## Today's Outlook", &palette);
        assert_eq!(plain_text(&line), "Today's Outlook");
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markup_bullet_gets_dot() {
        let palette = test_palette();
        let line = markup_line("- light rain", &palette);
        assert_eq!(plain_text(&line), "• light rain");
    }

    #[test]
    fn test_markup_bold_and_code_spans() {
        let palette = test_palette();
        let line = markup_line("High of **72** with `NNE` wind", &palette);
        assert_eq!(plain_text(&line), "High of 72 with NNE wind");

        let bold: Vec<_> = line
            .spans
            .iter()
            .filter(|s| s.style.add_modifier.contains(Modifier::BOLD))
            .collect();
        assert_eq!(bold.len(), 1);
        assert_eq!(bold[0].content.as_ref(), "72");
    }

    #[test]
    fn test_markup_unclosed_markers_stay_literal() {
        let palette = test_palette();
        let line = markup_line("a **dangling marker", &palette);
        assert_eq!(plain_text(&line), "a **dangling marker");

        let line = markup_line("odd `tick", &palette);
        assert_eq!(plain_text(&line), "odd `tick");
    }

    #[test]
    fn test_highlighted_line_marks_every_occurrence() {
        let base = Style::default();
        let mark = Style::default().bg(Color::Yellow);
        let line = highlighted_line("rain or no rain", "rain", base, mark);

        assert_eq!(plain_text(&line), "rain or no rain");
        let marked: Vec<_> = line
            .spans
            .iter()
            .filter(|s| s.style.bg == Some(Color::Yellow))
            .collect();
        assert_eq!(marked.len(), 2);
    }

    #[test]
    fn test_wrap_chars_cuts_exact_rows() {
        assert_eq!(wrap_chars("", 5), vec![String::new()]);
        assert_eq!(wrap_chars("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(wrap_chars("ab\ncd", 5), vec!["ab", "cd"]);
    }

    #[test]
    fn test_cursor_position_tracks_wraps_and_newlines() {
        // Within the first row
        assert_eq!(cursor_position("abcdef", 2, 4), (0, 2));
        // Wrapped onto the second row
        assert_eq!(cursor_position("abcdef", 5, 4), (1, 1));
        // After a newline
        assert_eq!(cursor_position("ab\ncd", 4, 10), (1, 1));
        // At the very end
        assert_eq!(cursor_position("ab\ncd", 5, 10), (1, 2));
    }
}
