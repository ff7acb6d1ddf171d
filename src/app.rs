use tokio::task::JoinHandle;
use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::client::AcpClient;
use crate::config::SelectionStore;
use crate::selector::AgentSelector;

/// A chat transcript entry. Immutable once appended; the whole log is cleared
/// when the active agent changes.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state
    pub messages: Vec<Message>,
    pub selected_agent: String,

    // Input buffer (cursor is a char index, not a byte index)
    pub input: String,
    pub cursor: usize,

    // Transcript viewport, updated during render for wrap calculations
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // At most one run in flight; Some while Sending, None while Idle
    pub send_task: Option<JoinHandle<Result<String>>>,

    // Animation state (0-2 for ellipsis animation)
    pub animation_frame: u8,

    pub selector: AgentSelector,
    pub client: AcpClient,
    store: Box<dyn SelectionStore>,
}

impl App {
    /// Build the app and adopt a previously persisted agent selection.
    ///
    /// `preselect` (from the command line) wins over the stored value. Both
    /// are passive restores: neither clears the (empty) message log nor
    /// writes the store.
    pub fn new(client: AcpClient, store: Box<dyn SelectionStore>, preselect: Option<String>) -> Self {
        let selected_agent = preselect
            .filter(|a| !a.is_empty())
            .or_else(|| store.get())
            .unwrap_or_default();
        if !selected_agent.is_empty() {
            info!(agent = %selected_agent, "restored agent selection");
        }

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            messages: Vec::new(),
            selected_agent,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            send_task: None,

            animation_frame: 0,

            selector: AgentSelector::new(),
            client,
            store,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.send_task.is_some()
    }

    /// Start a send: append the user message and hand the text back for the
    /// caller to spawn the run with.
    ///
    /// Guarded: returns `None` without touching any state when the trimmed
    /// input is empty, no agent is selected, or a send is already in flight.
    pub fn begin_send(&mut self) -> Option<String> {
        if self.input.trim().is_empty() || self.selected_agent.is_empty() || self.is_sending() {
            return None;
        }

        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.push_message(Role::User, text.clone());
        Some(text)
    }

    /// Resolve the outstanding send. Success appends the agent reply, failure
    /// appends a system notice; either way the session returns to idle and
    /// stays usable.
    pub fn finish_send(&mut self, result: Result<String>) {
        match result {
            Ok(reply) => self.push_message(Role::Agent, reply),
            Err(err) => {
                warn!("run failed: {}", err);
                self.push_message(Role::System, format!("Error: {}. Please try again.", err));
            }
        }
    }

    /// Reap the send task once it has finished. A panicked task is folded
    /// into the failure path so the session never gets stuck in Sending.
    pub async fn poll_send(&mut self) {
        let finished = self
            .send_task
            .as_ref()
            .map(|t| t.is_finished())
            .unwrap_or(false);
        if finished {
            if let Some(task) = self.send_task.take() {
                let result = match task.await {
                    Ok(result) => result,
                    Err(err) => Err(anyhow!("run task failed: {}", err)),
                };
                self.finish_send(result);
            }
        }
    }

    /// Apply a picker confirmation: persist the choice and start a fresh
    /// conversation. Only user-driven changes come through here.
    pub fn apply_selection(&mut self, name: String) {
        info!(agent = %name, "agent selected");
        if let Err(err) = self.store.set(&name) {
            warn!("failed to persist agent selection: {}", err);
        }
        self.selected_agent = name;
        self.messages.clear();
        self.chat_scroll = 0;
    }

    fn push_message(&mut self, role: Role, content: String) {
        self.messages.push(Message { role, content });
        self.scroll_chat_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll the transcript so the newest entry (and the in-flight
    /// indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Role line ("You:" / agent name)
            for line in msg.content.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_sending() {
            total_lines += 2; // Role line + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;

    fn test_app(store: MemoryStore, preselect: Option<&str>) -> App {
        App::new(
            AcpClient::new("http://127.0.0.1:9"),
            Box::new(store),
            preselect.map(|a| a.to_string()),
        )
    }

    fn app_with_agent() -> App {
        test_app(MemoryStore::with_agent("Echo_Agent"), None)
    }

    #[test]
    fn begin_send_appends_exactly_one_user_message() {
        let mut app = app_with_agent();
        app.input = "  hello there  ".to_string();

        let text = app.begin_send();

        assert_eq!(text.as_deref(), Some("  hello there  "));
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, Role::User);
        // The raw text is appended, not the trimmed form
        assert_eq!(app.messages[0].content, "  hello there  ");
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn begin_send_rejects_empty_and_whitespace_input() {
        let mut app = app_with_agent();

        for input in ["", "   ", "\n\t "] {
            app.input = input.to_string();
            assert_eq!(app.begin_send(), None);
            assert!(app.messages.is_empty());
        }
        // Rejected sends leave the buffer alone
        assert_eq!(app.input, "\n\t ");
    }

    #[test]
    fn begin_send_requires_a_selected_agent() {
        let mut app = test_app(MemoryStore::default(), None);
        app.input = "hello".to_string();

        assert_eq!(app.begin_send(), None);
        assert!(app.messages.is_empty());
        assert_eq!(app.input, "hello");
    }

    #[tokio::test]
    async fn begin_send_is_blocked_while_a_send_is_outstanding() {
        let mut app = app_with_agent();
        app.send_task = Some(tokio::spawn(async { Ok(String::new()) }));
        app.input = "hello".to_string();

        assert_eq!(app.begin_send(), None);
        assert!(app.messages.is_empty());
    }

    #[test]
    fn successful_send_appends_exactly_one_agent_reply() {
        let mut app = app_with_agent();
        app.input = "hello".to_string();
        app.begin_send();

        app.finish_send(Ok("hi".to_string()));

        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].role, Role::Agent);
        assert_eq!(app.messages[1].content, "hi");
    }

    #[test]
    fn failed_send_appends_a_system_notice_with_the_error() {
        let mut app = app_with_agent();
        app.input = "hello".to_string();
        app.begin_send();

        app.finish_send(Err(anyhow!("run request failed with status: 500")));

        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].role, Role::System);
        assert!(app.messages[1].content.starts_with("Error: "));
        assert!(app.messages[1].content.contains("500"));
        assert!(app.messages[1].content.ends_with("Please try again."));
    }

    #[tokio::test]
    async fn poll_send_returns_to_idle_after_completion() {
        let mut app = app_with_agent();
        app.send_task = Some(tokio::spawn(async { Ok("hi".to_string()) }));

        // Wait for the task to finish, then reap it
        while app.is_sending() {
            app.poll_send().await;
            tokio::task::yield_now().await;
        }

        assert!(!app.is_sending());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, Role::Agent);
    }

    #[test]
    fn apply_selection_clears_the_log_and_persists_the_name() {
        let store = MemoryStore::default();
        let mut app = test_app(store.clone(), None);
        app.messages.push(Message {
            role: Role::User,
            content: "old conversation".to_string(),
        });

        app.apply_selection("foo".to_string());

        assert_eq!(app.selected_agent, "foo");
        assert!(app.messages.is_empty());
        assert_eq!(store.value().as_deref(), Some("foo"));
    }

    #[test]
    fn startup_restores_the_persisted_selection() {
        let app = test_app(MemoryStore::with_agent("Echo_Agent"), None);
        assert_eq!(app.selected_agent, "Echo_Agent");
    }

    #[test]
    fn cli_preselect_wins_over_the_stored_value() {
        let app = test_app(MemoryStore::with_agent("Echo_Agent"), Some("Other_Agent"));
        assert_eq!(app.selected_agent, "Other_Agent");
    }

    #[test]
    fn no_stored_selection_means_no_agent() {
        let app = test_app(MemoryStore::default(), None);
        assert!(app.selected_agent.is_empty());
    }

    #[test]
    fn new_message_scrolls_the_transcript_to_the_newest_entry() {
        let mut app = app_with_agent();
        app.chat_height = 4;
        app.chat_width = 50;

        for i in 0..5 {
            app.input = format!("message {}", i);
            app.begin_send();
            app.finish_send(Ok(format!("reply {}", i)));
        }

        // 10 messages at 3 lines each against a 4-line viewport
        assert_eq!(app.chat_scroll, 30 - 4);
    }
}
