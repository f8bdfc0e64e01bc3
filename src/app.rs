use anyhow::Result;
use ratatui::layout::Rect;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::agent::{AgentClient, AgentError};
use crate::config::Config;
use crate::export;
use crate::session::ChatSession;
use crate::sound::Chime;

/// Input box bounds in rows, borders included.
pub const MIN_INPUT_HEIGHT: u16 = 3;
pub const MAX_INPUT_HEIGHT: u16 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state
    pub session: ChatSession,
    pub draft_cursor: usize, // cursor position in session.draft, in chars
    pub request_task: Option<JoinHandle<Result<Option<String>, AgentError>>>,

    // Transcript viewport
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub chat_area: Option<Rect>, // for mouse hit-testing, updated during render

    // Input box sizing
    pub input_height: u16,
    pub input_width: u16, // inner width, updated during render

    // Search bar
    pub show_search: bool,

    // Presentation toggles
    pub dark_mode: bool,
    pub chime: Chime,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub status: Option<String>,

    pub client: AgentClient,
    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = AgentClient::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            session: ChatSession::new(),
            draft_cursor: 0,
            request_task: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            input_height: MIN_INPUT_HEIGHT,
            input_width: 0,

            show_search: false,

            dark_mode: config.dark_mode,
            chime: Chime::new(config.sound),
            animation_frame: 0,
            status: None,

            client,
            config,
        })
    }

    // Submit lifecycle

    /// Send the draft. Blank drafts and submits while a request is in
    /// flight fall through silently.
    pub fn submit(&mut self) {
        let Some(prompt) = self.session.begin_submit() else {
            return;
        };

        self.draft_cursor = 0;
        self.adjust_input_height(true);
        self.status = None;

        info!(chars = prompt.chars().count(), "sending prompt to weather agent");

        let client = self.client.clone();
        self.request_task = Some(tokio::spawn(async move { client.ask(&prompt).await }));

        self.scroll_chat_to_bottom();
    }

    /// Fold a finished request back into the session. Called from the main
    /// loop; does nothing while the task is still running.
    pub async fn poll_response(&mut self) {
        if !self
            .request_task
            .as_ref()
            .is_some_and(|task| task.is_finished())
        {
            return;
        }

        let Some(task) = self.request_task.take() else {
            return;
        };

        match task.await {
            Ok(outcome) => {
                match &outcome {
                    Ok(_) => self.chime.response_arrived(),
                    Err(e) => {
                        warn!(error = %e, "weather agent request failed");
                        self.chime.request_failed();
                    }
                }
                self.session.complete(outcome.map_err(|e| e.to_string()));
            }
            Err(join_error) => {
                // An abort comes from clear(); the session is already reset.
                if !join_error.is_cancelled() {
                    warn!(error = %join_error, "weather agent task panicked");
                    self.session
                        .complete(Err("Failed to fetch weather response.".to_string()));
                }
            }
        }

        self.scroll_chat_to_bottom();
    }

    /// Drop the whole conversation, aborting any request still in flight so
    /// a late reply cannot repopulate a cleared chat.
    pub fn clear(&mut self) {
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
        self.session.clear();
        self.chat_scroll = 0;
        self.show_search = false;
        self.status = None;
    }

    // Input sizing

    /// The one rule of the auto-growing input: content height clamped to
    /// the configured bounds.
    pub fn clamped_input_height(content: u16, min: u16, max: u16) -> u16 {
        content.max(min).min(max)
    }

    /// Recompute the input box height from the wrapped draft. `reset`
    /// collapses back to the minimum regardless of content (used right
    /// after a send). Also runs on terminal resize.
    pub fn adjust_input_height(&mut self, reset: bool) {
        if reset {
            self.input_height = MIN_INPUT_HEIGHT;
            return;
        }

        let width = self.input_width.max(1) as usize;
        let content_rows: u16 = self
            .session
            .draft
            .split('\n')
            .map(|line| wrapped_line_count(line, width))
            .sum();

        // +2 for the borders around the text rows
        self.input_height = Self::clamped_input_height(
            content_rows.saturating_add(2),
            MIN_INPUT_HEIGHT,
            MAX_INPUT_HEIGHT,
        );
    }

    // Transcript scrolling

    /// Rendered line count of the transcript at the current chat width,
    /// using the same wrap math as the renderer.
    pub fn transcript_line_count(&self) -> u16 {
        let width = self.chat_width.max(1) as usize;
        let mut total: u16 = 0;

        for message in &self.session.messages {
            total += 1; // header line
            for line in message.content.lines() {
                total += wrapped_line_count(line, width);
            }
            if message.content.is_empty() {
                total += 1;
            }
            total += 1; // blank line after message
        }

        if self.session.pending {
            total += 2; // header + hint line
        }

        total
    }

    fn max_chat_scroll(&self) -> u16 {
        self.transcript_line_count().saturating_sub(self.chat_height)
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll());
    }

    /// Scroll so the given message's header line is visible.
    pub fn scroll_to_message(&mut self, index: usize) {
        let width = self.chat_width.max(1) as usize;
        let mut start: u16 = 0;

        for message in self.session.messages.iter().take(index) {
            start += 1;
            for line in message.content.lines() {
                start += wrapped_line_count(line, width);
            }
            if message.content.is_empty() {
                start += 1;
            }
            start += 1;
        }

        self.chat_scroll = start.min(self.max_chat_scroll());
    }

    /// Jump the viewport to the match under the search cursor.
    pub fn scroll_to_current_match(&mut self) {
        if let Some(index) = self.session.current_match() {
            self.scroll_to_message(index);
        }
    }

    // Presentation

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.pending {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn toggle_theme(&mut self) {
        self.dark_mode = !self.dark_mode;
        self.config.dark_mode = self.dark_mode;
        let _ = self.config.save();
    }

    pub fn toggle_sound(&mut self) {
        self.chime.toggle();
        self.config.sound = self.chime.enabled;
        let _ = self.config.save();
        self.status = Some(if self.chime.enabled {
            "Sound on".to_string()
        } else {
            "Sound off".to_string()
        });
    }

    pub fn quick_question(&mut self, index: usize) {
        if self.session.apply_quick_question(index) {
            self.draft_cursor = self.session.draft.chars().count();
            self.input_mode = InputMode::Editing;
            self.adjust_input_height(false);
        }
    }

    pub fn export_transcript(&mut self) {
        if self.session.messages.is_empty() {
            self.status = Some("Nothing to export yet.".to_string());
            return;
        }

        match export::write_transcript(&self.session.messages, &export::default_export_dir()) {
            Ok(path) => {
                info!(path = %path.display(), "transcript exported");
                self.status = Some(format!("Exported to {}", path.display()));
            }
            Err(e) => {
                warn!(error = %e, "transcript export failed");
                self.status = Some(format!("Export failed: {e}"));
            }
        }
    }

    // Search bar

    pub fn open_search(&mut self) {
        self.show_search = true;
    }

    pub fn close_search(&mut self) {
        self.show_search = false;
        self.session.set_search_query(String::new());
    }
}

/// Rows a single unwrapped line occupies at `width`. Empty lines still
/// take a row.
pub fn wrapped_line_count(line: &str, width: usize) -> u16 {
    let chars = line.chars().count();
    if chars == 0 {
        1
    } else {
        ((chars + width - 1) / width) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use chrono::Local;

    fn test_app() -> App {
        let config = Config {
            endpoint: "http://127.0.0.1:9/agent".to_string(),
            sound: false,
            ..Config::default()
        };
        App::new(config).unwrap()
    }

    fn push_message(app: &mut App, role: Role, content: &str) {
        app.session.messages.push(crate::session::Message {
            role,
            content: content.to_string(),
            timestamp: Local::now(),
            loading_hint: None,
        });
    }

    #[test]
    fn test_clamped_input_height_bounds() {
        assert_eq!(App::clamped_input_height(500, 60, 200), 200);
        assert_eq!(App::clamped_input_height(10, 60, 200), 60);
        assert_eq!(App::clamped_input_height(120, 60, 200), 120);
        assert_eq!(App::clamped_input_height(60, 60, 200), 60);
        assert_eq!(App::clamped_input_height(200, 60, 200), 200);
    }

    #[test]
    fn test_wrapped_line_count() {
        assert_eq!(wrapped_line_count("", 10), 1);
        assert_eq!(wrapped_line_count("short", 10), 1);
        assert_eq!(wrapped_line_count("exactly ten", 11), 1);
        assert_eq!(wrapped_line_count("twelve chars", 6), 2);
        assert_eq!(wrapped_line_count("thirteen char", 6), 3);
    }

    #[test]
    fn test_input_height_grows_with_draft_and_resets() {
        let mut app = test_app();
        app.input_width = 10;

        app.adjust_input_height(false);
        assert_eq!(app.input_height, MIN_INPUT_HEIGHT);

        app.session.draft = "a line that definitely wraps across several rows".to_string();
        app.adjust_input_height(false);
        assert!(app.input_height > MIN_INPUT_HEIGHT);

        app.session.draft = "x".repeat(10_000);
        app.adjust_input_height(false);
        assert_eq!(app.input_height, MAX_INPUT_HEIGHT);

        // Reset collapses regardless of content
        app.adjust_input_height(true);
        assert_eq!(app.input_height, MIN_INPUT_HEIGHT);
    }

    #[test]
    fn test_transcript_line_count_includes_pending_indicator() {
        let mut app = test_app();
        app.chat_width = 80;
        push_message(&mut app, Role::User, "hello");

        // header + content + trailing blank
        assert_eq!(app.transcript_line_count(), 3);

        app.session.pending = true;
        assert_eq!(app.transcript_line_count(), 5);
    }

    #[test]
    fn test_scroll_to_message_lands_on_header() {
        let mut app = test_app();
        app.chat_width = 80;
        app.chat_height = 2;
        push_message(&mut app, Role::User, "one");
        push_message(&mut app, Role::Agent, "two");
        push_message(&mut app, Role::User, "three");

        app.scroll_to_message(2);
        assert_eq!(app.chat_scroll, 6);

        app.scroll_to_message(0);
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_scroll_clamps_at_bottom() {
        let mut app = test_app();
        app.chat_width = 80;
        app.chat_height = 2;
        push_message(&mut app, Role::User, "one");
        push_message(&mut app, Role::Agent, "two");

        app.scroll_chat_down(100);
        assert_eq!(app.chat_scroll, 4); // 6 lines - 2 visible

        app.scroll_chat_up(100);
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_quick_question_enters_editing_with_cursor_at_end() {
        let mut app = test_app();
        app.input_mode = InputMode::Normal;
        app.input_width = 80;

        app.quick_question(0);

        assert_eq!(app.session.draft, "What's the weather today?");
        assert_eq!(app.draft_cursor, app.session.draft.chars().count());
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn test_close_search_clears_query() {
        let mut app = test_app();
        push_message(&mut app, Role::User, "rainy");
        app.open_search();
        app.session.set_search_query("rain".to_string());
        assert_eq!(app.session.search.results, vec![0]);

        app.close_search();

        assert!(!app.show_search);
        assert!(app.session.search.query.is_empty());
        assert!(app.session.search.results.is_empty());
    }

    #[tokio::test]
    async fn test_clear_aborts_inflight_request() {
        let mut app = test_app();
        app.session.draft = "will it rain?".to_string();
        app.submit();
        assert!(app.session.pending);
        assert!(app.request_task.is_some());

        app.clear();

        assert!(app.request_task.is_none());
        assert!(!app.session.pending);
        assert!(app.session.messages.is_empty());

        // A late poll after clear must not resurrect anything.
        app.poll_response().await;
        assert!(app.session.messages.is_empty());
        assert!(app.session.last_error.is_none());
    }

    #[tokio::test]
    async fn test_submit_while_pending_spawns_nothing_new() {
        let mut app = test_app();
        app.session.draft = "first".to_string();
        app.submit();
        let first_task_live = app.request_task.is_some();

        app.session.draft = "second".to_string();
        app.submit();

        assert!(first_task_live);
        assert_eq!(app.session.messages.len(), 1);
        assert_eq!(app.session.draft, "second");

        app.clear();
    }
}
