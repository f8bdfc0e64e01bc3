use chrono::{DateTime, Local};
use regex::Regex;

/// Shown in place of an agent reply when the response body carried no text.
pub const NO_RESPONSE_FALLBACK: &str = "No response received.";

/// Canned prompts offered on the empty screen. Selecting one only fills the
/// draft; the user still has to send it.
pub const QUICK_QUESTIONS: [(&str, &str); 4] = [
    ("Today's Weather", "What's the weather today?"),
    ("Will it Rain?", "Will it rain today?"),
    ("Weekly Forecast", "What's the forecast for this week?"),
    ("Temperature", "What's the temperature right now?"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    /// Waiting label derived from the prompt; user messages only.
    pub loading_hint: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    /// Indices into `messages`, ascending.
    pub results: Vec<usize>,
    pub cursor: usize,
}

/// Conversation state for one run of the app. Holds the message log, the
/// single-request-in-flight flag, the last failure, the unsent draft, and
/// the derived search state. No I/O happens here; the event layer feeds
/// results back in through [`ChatSession::complete`].
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub pending: bool,
    pub last_error: Option<String>,
    pub draft: String,
    pub search: SearchState,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            pending: false,
            last_error: None,
            draft: String::new(),
            search: SearchState::default(),
        }
    }

    /// Start a submission from the current draft.
    ///
    /// Returns the prompt to send, or `None` when the draft is blank or a
    /// request is already in flight (both are silent no-ops). On success the
    /// user message is appended, the draft cleared, and the pending flag set;
    /// the caller owns actually dispatching the request.
    pub fn begin_submit(&mut self) -> Option<String> {
        if self.pending || self.draft.trim().is_empty() {
            return None;
        }

        let text = std::mem::take(&mut self.draft);
        self.messages.push(Message {
            role: Role::User,
            content: text.clone(),
            timestamp: Local::now(),
            loading_hint: Some(loading_hint(&text)),
        });
        self.pending = true;
        self.last_error = None;
        self.refresh_search();

        Some(text)
    }

    /// Feed the outcome of the in-flight request back into the session.
    ///
    /// `Ok(None)` means the agent answered but the body carried no usable
    /// text; the fallback line is shown as the reply. Failures only set
    /// `last_error` and never append a message.
    pub fn complete(&mut self, outcome: Result<Option<String>, String>) {
        match outcome {
            Ok(reply) => {
                self.messages.push(Message {
                    role: Role::Agent,
                    content: reply.unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string()),
                    timestamp: Local::now(),
                    loading_hint: None,
                });
            }
            Err(message) => {
                self.last_error = Some(message);
            }
        }
        self.pending = false;
        self.refresh_search();
    }

    /// Wipe the conversation: messages, search state, pending flag, and last
    /// error all reset together. The draft is left alone.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending = false;
        self.last_error = None;
        self.search = SearchState::default();
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Copy a canned prompt into the draft. Never submits.
    pub fn apply_quick_question(&mut self, index: usize) -> bool {
        match QUICK_QUESTIONS.get(index) {
            Some((_, prompt)) => {
                self.draft = prompt.to_string();
                true
            }
            None => false,
        }
    }

    /// Waiting label for the reply currently in flight.
    pub fn latest_hint(&self) -> &'static str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.loading_hint)
            .unwrap_or("Thinking")
    }

    // Search

    pub fn set_search_query(&mut self, query: String) {
        self.search.query = query;
        self.refresh_search();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search.query.push(c);
        self.refresh_search();
    }

    pub fn pop_search_char(&mut self) {
        self.search.query.pop();
        self.refresh_search();
    }

    /// Recompute match indices; runs whenever the query or the log changes.
    /// The cursor always snaps back to the first match.
    fn refresh_search(&mut self) {
        self.search.results.clear();
        self.search.cursor = 0;

        if self.search.query.is_empty() {
            return;
        }

        let needle = self.search.query.to_lowercase();
        for (i, message) in self.messages.iter().enumerate() {
            if message.content.to_lowercase().contains(&needle) {
                self.search.results.push(i);
            }
        }
    }

    pub fn search_next(&mut self) {
        let len = self.search.results.len();
        if len > 0 {
            self.search.cursor = (self.search.cursor + 1) % len;
        }
    }

    pub fn search_prev(&mut self) {
        let len = self.search.results.len();
        if len > 0 {
            self.search.cursor = (self.search.cursor + len - 1) % len;
        }
    }

    /// Message index of the match under the cursor, if any.
    pub fn current_match(&self) -> Option<usize> {
        self.search.results.get(self.search.cursor).copied()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the waiting label for a prompt. Case-insensitive, first rule wins.
/// Greetings are matched as whole words so "hi" does not fire inside
/// "humidity"; the weather rules are plain containment.
pub fn loading_hint(text: &str) -> &'static str {
    const GREETINGS: [&str; 6] = ["hi", "hello", "hey", "sup", "greetings", "howdy"];
    const WEATHER_WORDS: [&str; 7] =
        ["weather", "wind", "cloud", "sun", "storm", "sunny", "cloudy"];

    let lower = text.to_lowercase();

    if lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETINGS.contains(&word))
    {
        return "Thinking";
    }
    if lower.contains("rain") {
        return "Checking rain forecast";
    }
    if lower.contains("temperature") || lower.contains("temp") {
        return "Getting temperature";
    }
    if lower.contains("forecast") || lower.contains("week") {
        return "Fetching forecast";
    }
    if WEATHER_WORDS.iter().any(|w| lower.contains(w)) {
        return "Checking weather";
    }

    "Thinking"
}

/// Byte ranges of every case-insensitive occurrence of `query` in `content`,
/// non-overlapping, left to right. The query is taken literally; regex
/// metacharacters in it have no special meaning.
pub fn highlight_ranges(content: &str, query: &str) -> Vec<(usize, usize)> {
    if query.is_empty() {
        return Vec::new();
    }

    let pattern = format!("(?i){}", regex::escape(query));
    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(content).map(|m| (m.start(), m.end())).collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(session: &mut ChatSession, text: &str) -> Option<String> {
        session.draft = text.to_string();
        session.begin_submit()
    }

    #[test]
    fn test_submit_blank_draft_is_noop() {
        let mut session = ChatSession::new();

        assert_eq!(submitted(&mut session, ""), None);
        assert_eq!(submitted(&mut session, "   "), None);
        assert!(session.messages.is_empty());
        assert!(!session.pending);
    }

    #[test]
    fn test_submit_appends_one_user_message_and_sets_pending() {
        let mut session = ChatSession::new();
        session.last_error = Some("stale".to_string());

        let prompt = submitted(&mut session, "Will it rain?");

        assert_eq!(prompt.as_deref(), Some("Will it rain?"));
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].content, "Will it rain?");
        assert_eq!(
            session.messages[0].loading_hint,
            Some("Checking rain forecast")
        );
        assert!(session.pending);
        assert!(session.draft.is_empty());
        assert!(session.last_error.is_none());
    }

    #[test]
    fn test_submit_keeps_raw_untrimmed_content() {
        let mut session = ChatSession::new();

        submitted(&mut session, "  windy today?  ");

        assert_eq!(session.messages[0].content, "  windy today?  ");
    }

    #[test]
    fn test_submit_while_pending_is_noop() {
        let mut session = ChatSession::new();

        submitted(&mut session, "first");
        let second = submitted(&mut session, "second");

        assert_eq!(second, None);
        assert_eq!(session.messages.len(), 1);
        // The rejected draft is not consumed.
        assert_eq!(session.draft, "second");
    }

    #[test]
    fn test_complete_success_appends_agent_message() {
        let mut session = ChatSession::new();
        submitted(&mut session, "weather?");

        session.complete(Ok(Some("72°F and sunny".to_string())));

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].role, Role::Agent);
        assert_eq!(session.messages[1].content, "72°F and sunny");
        assert!(!session.pending);
    }

    #[test]
    fn test_complete_without_reply_uses_fallback_text() {
        let mut session = ChatSession::new();
        submitted(&mut session, "weather?");

        session.complete(Ok(None));

        assert_eq!(session.messages[1].content, NO_RESPONSE_FALLBACK);
    }

    #[test]
    fn test_complete_failure_sets_error_and_appends_nothing() {
        let mut session = ChatSession::new();
        submitted(&mut session, "weather?");

        session.complete(Err("Request failed with status 500".to_string()));

        assert_eq!(session.messages.len(), 1);
        assert_eq!(
            session.last_error.as_deref(),
            Some("Request failed with status 500")
        );
        assert!(!session.pending);
    }

    #[test]
    fn test_resubmit_after_failure_clears_error() {
        let mut session = ChatSession::new();
        submitted(&mut session, "weather?");
        session.complete(Err("boom".to_string()));

        submitted(&mut session, "try again");

        assert!(session.last_error.is_none());
        assert!(session.pending);
    }

    #[test]
    fn test_loading_hint_rules() {
        assert_eq!(loading_hint("hello there"), "Thinking");
        assert_eq!(loading_hint("HOWDY partner"), "Thinking");
        // "hi" only matches as a whole word.
        assert_eq!(loading_hint("is it humid?"), "Thinking");
        assert_eq!(loading_hint("will it rain tomorrow"), "Checking rain forecast");
        assert_eq!(loading_hint("what's the TEMP"), "Getting temperature");
        assert_eq!(loading_hint("temperature now?"), "Getting temperature");
        assert_eq!(loading_hint("forecast please"), "Fetching forecast");
        assert_eq!(loading_hint("how's this week looking"), "Fetching forecast");
        assert_eq!(loading_hint("cloudy or sunny?"), "Checking weather");
        assert_eq!(loading_hint("wind speed"), "Checking weather");
        assert_eq!(loading_hint("tell me a joke"), "Thinking");
        // First rule wins: a greeting outranks the rain keyword.
        assert_eq!(loading_hint("hi, will it rain?"), "Thinking");
        // Rain outranks the generic weather words.
        assert_eq!(loading_hint("rainy and windy"), "Checking rain forecast");
    }

    #[test]
    fn test_quick_question_fills_draft_without_submitting() {
        let mut session = ChatSession::new();

        assert!(session.apply_quick_question(1));

        assert_eq!(session.draft, "Will it rain today?");
        assert!(session.messages.is_empty());
        assert!(!session.pending);
        assert!(!session.apply_quick_question(4));
    }

    #[test]
    fn test_search_matches_case_insensitive_substring() {
        let mut session = ChatSession::new();
        submitted(&mut session, "It will rain today");
        session.complete(Ok(Some("Sunny all week".to_string())));

        session.set_search_query("rain".to_string());
        assert_eq!(session.search.results, vec![0]);

        session.set_search_query("SUNNY".to_string());
        assert_eq!(session.search.results, vec![1]);

        session.set_search_query(String::new());
        assert!(session.search.results.is_empty());
    }

    #[test]
    fn test_search_recomputes_when_messages_change() {
        let mut session = ChatSession::new();
        session.set_search_query("rain".to_string());
        assert!(session.search.results.is_empty());

        submitted(&mut session, "rain?");
        assert_eq!(session.search.results, vec![0]);

        session.complete(Ok(Some("Light rain expected".to_string())));
        assert_eq!(session.search.results, vec![0, 1]);
        assert_eq!(session.search.cursor, 0);
    }

    #[test]
    fn test_search_cursor_wraps_both_directions() {
        let mut session = ChatSession::new();
        submitted(&mut session, "rain one");
        session.complete(Ok(Some("rain two".to_string())));
        session.set_search_query("rain".to_string());

        assert_eq!(session.current_match(), Some(0));
        session.search_next();
        assert_eq!(session.current_match(), Some(1));
        session.search_next();
        assert_eq!(session.current_match(), Some(0));
        session.search_prev();
        assert_eq!(session.current_match(), Some(1));
    }

    #[test]
    fn test_search_navigation_with_no_results_is_noop() {
        let mut session = ChatSession::new();
        session.set_search_query("nothing".to_string());

        session.search_next();
        session.search_prev();

        assert_eq!(session.search.cursor, 0);
        assert_eq!(session.current_match(), None);
    }

    #[test]
    fn test_highlight_ranges_finds_every_occurrence() {
        let ranges = highlight_ranges("Rain, rain, go away", "rain");
        assert_eq!(ranges, vec![(0, 4), (6, 10)]);
    }

    #[test]
    fn test_highlight_ranges_treats_query_literally() {
        // A query full of regex metacharacters must not be interpreted.
        let ranges = highlight_ranges("is it 20.5*C or what?", "20.5*");
        assert_eq!(ranges, vec![(6, 11)]);

        let ranges = highlight_ranges("a.c abc", "a.c");
        assert_eq!(ranges, vec![(0, 3)]);
    }

    #[test]
    fn test_highlight_ranges_empty_query_matches_nothing() {
        assert!(highlight_ranges("anything", "").is_empty());
    }

    #[test]
    fn test_clear_resets_everything_but_the_draft() {
        let mut session = ChatSession::new();
        submitted(&mut session, "rain?");
        session.complete(Err("boom".to_string()));
        session.set_search_query("rain".to_string());
        session.draft = "half-typed".to_string();
        session.pending = true;

        session.clear();

        assert!(session.messages.is_empty());
        assert!(!session.pending);
        assert!(session.last_error.is_none());
        assert!(session.search.query.is_empty());
        assert!(session.search.results.is_empty());
        assert_eq!(session.search.cursor, 0);
        assert_eq!(session.draft, "half-typed");
    }

    #[test]
    fn test_latest_hint_tracks_most_recent_user_message() {
        let mut session = ChatSession::new();
        assert_eq!(session.latest_hint(), "Thinking");

        submitted(&mut session, "forecast?");
        assert_eq!(session.latest_hint(), "Fetching forecast");

        session.complete(Ok(Some("Fine all week".to_string())));
        submitted(&mut session, "temp?");
        assert_eq!(session.latest_hint(), "Getting temperature");
    }
}
