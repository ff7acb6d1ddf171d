use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::client::AcpClient;

/// Emitted when the user confirms a new agent in the picker. The app owns the
/// message log, so clearing it on a change happens there, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanged(pub String);

/// Agent discovery state and the picker overlay driven by it.
///
/// The list is fetched once at startup. A failed fetch is terminal: the picker
/// shows the error with no retry, and restarting the program is the only
/// recovery path.
pub struct AgentSelector {
    pub agents: Vec<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub visible: bool,
    pub list_state: ListState,
    fetch_task: Option<JoinHandle<Result<Vec<String>>>>,
}

impl AgentSelector {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            loading: true,
            error: None,
            visible: false,
            list_state: ListState::default(),
            fetch_task: None,
        }
    }

    /// Spawn the one-shot discovery request. Called once after startup.
    pub fn start_fetch(&mut self, client: AcpClient) {
        self.fetch_task = Some(tokio::spawn(async move { client.list_agents().await }));
    }

    /// Reap the discovery task once it has finished. No-op while it is still
    /// running or after it has already been consumed.
    pub async fn poll_fetch(&mut self) {
        let finished = self
            .fetch_task
            .as_ref()
            .map(|t| t.is_finished())
            .unwrap_or(false);
        if finished {
            if let Some(task) = self.fetch_task.take() {
                let result = match task.await {
                    Ok(result) => result,
                    Err(err) => Err(anyhow!("agent discovery task failed: {}", err)),
                };
                self.finish_fetch(result);
            }
        }
    }

    pub fn finish_fetch(&mut self, result: Result<Vec<String>>) {
        self.loading = false;
        match result {
            Ok(agents) => {
                info!(count = agents.len(), "agent list loaded");
                if !agents.is_empty() {
                    self.list_state.select(Some(0));
                }
                self.agents = agents;
            }
            Err(err) => {
                warn!("agent discovery failed: {}", err);
                self.error = Some(err.to_string());
            }
        }
    }

    /// Open the picker with the active agent highlighted.
    pub fn open(&mut self, current: &str) {
        self.visible = true;
        if let Some(idx) = self.agents.iter().position(|a| a == current) {
            self.list_state.select(Some(idx));
        }
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    pub fn nav_down(&mut self) {
        let len = self.agents.len();
        if len > 0 {
            let i = self.list_state.selected().unwrap_or(0);
            self.list_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn nav_up(&mut self) {
        let i = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(i.saturating_sub(1)));
    }

    /// Confirm the highlighted agent and close the picker. Returns `None`
    /// while the list is still loading or discovery has failed.
    pub fn confirm(&mut self) -> Option<SelectionChanged> {
        if self.loading || self.error.is_some() {
            return None;
        }
        let name = self
            .list_state
            .selected()
            .and_then(|i| self.agents.get(i))?
            .clone();
        self.visible = false;
        Some(SelectionChanged(name))
    }
}
