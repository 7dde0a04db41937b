//! Processing sub-state: thinking indicator, tool calls, and a bounded log.
//!
//! The log keeps the newest `limit` entries; older ones are dropped from
//! the front as new entries arrive.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use superai_protocol::{new_id, timestamp_now};

pub const DEFAULT_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub level: LogLevel,
    pub message: String,
    pub source: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStage {
    Analyzing,
    Planning,
    Executing,
    Responding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub status: ToolStatus,
    pub error: Option<String>,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thinking {
    pub text: String,
    pub stage: Option<ThinkingStage>,
    pub progress: u8,
}

#[derive(Debug, Clone)]
pub struct ProcessingState {
    thinking: Option<Thinking>,
    tools: Vec<ToolCall>,
    active_tool: Option<String>,
    step: Option<String>,
    error: Option<String>,
    logs: VecDeque<LogEntry>,
    log_limit: usize,
    active_filters: Vec<LogLevel>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_LIMIT)
    }
}

impl ProcessingState {
    pub fn new(log_limit: usize) -> Self {
        Self {
            thinking: None,
            tools: Vec::new(),
            active_tool: None,
            step: None,
            error: None,
            logs: VecDeque::new(),
            log_limit: log_limit.max(1),
            active_filters: vec![LogLevel::Info, LogLevel::Warning, LogLevel::Error],
        }
    }

    // -- Thinking -------------------------------------------------------------

    pub fn start_thinking(&mut self, text: impl Into<String>, stage: ThinkingStage) {
        self.thinking = Some(Thinking {
            text: text.into(),
            stage: Some(stage),
            progress: 0,
        });
        self.add_log(LogLevel::Info, format!("Thinking started: {:?}", stage), None);
    }

    /// Ignored unless thinking is in progress. Progress is clamped to 100.
    pub fn update_thinking(
        &mut self,
        text: impl Into<String>,
        progress: Option<u8>,
        stage: Option<ThinkingStage>,
    ) {
        if let Some(thinking) = self.thinking.as_mut() {
            thinking.text = text.into();
            if let Some(p) = progress {
                thinking.progress = p.min(100);
            }
            if stage.is_some() {
                thinking.stage = stage;
            }
        }
    }

    pub fn complete_thinking(&mut self) {
        if self.thinking.take().is_some() {
            self.add_log(LogLevel::Info, "Thinking complete", None);
        }
    }

    pub fn thinking(&self) -> Option<&Thinking> {
        self.thinking.as_ref()
    }

    // -- Tools ----------------------------------------------------------------

    pub fn add_tool(&mut self, name: impl Into<String>, display_name: Option<String>) -> String {
        let name = name.into();
        let tool = ToolCall {
            id: new_id(),
            display_name: display_name.unwrap_or_else(|| name.clone()),
            name,
            status: ToolStatus::Pending,
            error: None,
            started_at: None,
            duration_ms: None,
        };
        let id = tool.id.clone();
        self.add_log(
            LogLevel::Info,
            format!("Tool queued: {}", tool.display_name),
            Some("tools"),
        );
        self.tools.push(tool);
        id
    }

    /// Move a tool to a new status. Unknown ids and repeated statuses are no-ops.
    pub fn set_tool_status(&mut self, tool_id: &str, status: ToolStatus, error: Option<String>) {
        let Some(tool) = self.tools.iter_mut().find(|t| t.id == tool_id) else {
            return;
        };
        if tool.status == status {
            return;
        }
        tool.status = status;

        let (level, message) = match status {
            ToolStatus::Pending => return,
            ToolStatus::Running => {
                tool.started_at = Some(Instant::now());
                self.active_tool = Some(tool_id.to_string());
                (LogLevel::Info, format!("Tool running: {}", tool.display_name))
            }
            ToolStatus::Completed => {
                tool.duration_ms = tool.started_at.map(|t| t.elapsed().as_millis() as u64);
                (
                    LogLevel::Success,
                    format!("Tool finished: {}", tool.display_name),
                )
            }
            ToolStatus::Error => {
                tool.duration_ms = tool.started_at.map(|t| t.elapsed().as_millis() as u64);
                tool.error = error;
                (
                    LogLevel::Error,
                    format!(
                        "Tool failed: {} - {}",
                        tool.display_name,
                        tool.error.as_deref().unwrap_or("unknown error")
                    ),
                )
            }
        };
        if matches!(status, ToolStatus::Completed | ToolStatus::Error)
            && self.active_tool.as_deref() == Some(tool_id)
        {
            self.active_tool = None;
        }
        self.add_log(level, message, Some("tools"));
    }

    pub fn remove_tool(&mut self, tool_id: &str) {
        if let Some(idx) = self.tools.iter().position(|t| t.id == tool_id) {
            let tool = self.tools.remove(idx);
            if self.active_tool.as_deref() == Some(tool_id) {
                self.active_tool = None;
            }
            self.add_log(
                LogLevel::Info,
                format!("Tool removed: {}", tool.display_name),
                Some("tools"),
            );
        }
    }

    pub fn clear_tools(&mut self) {
        self.tools.clear();
        self.active_tool = None;
    }

    pub fn tools(&self) -> &[ToolCall] {
        &self.tools
    }

    pub fn active_tool(&self) -> Option<&str> {
        self.active_tool.as_deref()
    }

    /// Completed tools as a rounded percentage of all tools.
    pub fn tools_progress(&self) -> u8 {
        if self.tools.is_empty() {
            return 0;
        }
        let completed = self.tools_with_status(ToolStatus::Completed).count();
        let pct = (completed as f64 / self.tools.len() as f64) * 100.0;
        pct.round().min(100.0) as u8
    }

    pub fn tools_with_status(&self, status: ToolStatus) -> impl Iterator<Item = &ToolCall> {
        self.tools.iter().filter(move |t| t.status == status)
    }

    // -- Processing -----------------------------------------------------------

    pub fn start_processing(&mut self, step: impl Into<String>) {
        let step = step.into();
        self.add_log(LogLevel::Info, format!("Processing: {}", step), None);
        self.step = Some(step);
        self.error = None;
    }

    pub fn complete_processing(&mut self) {
        self.complete_thinking();
        self.step = None;
        self.error = None;
        self.add_log(LogLevel::Info, "Processing complete", None);
    }

    pub fn fail_processing(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.thinking = None;
        self.step = None;
        self.add_log(LogLevel::Error, format!("Processing failed: {}", error), None);
        self.error = Some(error);
    }

    /// The reply was abandoned; not an error.
    pub fn cancel_processing(&mut self) {
        self.thinking = None;
        self.step = None;
        self.add_log(LogLevel::Warning, "Processing cancelled", None);
    }

    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.step.is_some()
            || self.thinking.is_some()
            || self.tools.iter().any(|t| t.status == ToolStatus::Running)
    }

    /// Clear thinking, tools, and processing state. Logs are kept.
    pub fn reset(&mut self) {
        self.thinking = None;
        self.clear_tools();
        self.step = None;
        self.error = None;
        self.add_log(LogLevel::Info, "Processing state reset", None);
    }

    // -- Logs -----------------------------------------------------------------

    pub fn add_log(&mut self, level: LogLevel, message: impl Into<String>, source: Option<&str>) {
        self.logs.push_back(LogEntry {
            id: new_id(),
            level,
            message: message.into(),
            source: source.map(String::from),
            timestamp: timestamp_now(),
        });
        while self.logs.len() > self.log_limit {
            self.logs.pop_front();
        }
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
        self.add_log(LogLevel::Info, "Logs cleared", None);
    }

    pub fn toggle_filter(&mut self, level: LogLevel) {
        if let Some(idx) = self.active_filters.iter().position(|l| *l == level) {
            self.active_filters.remove(idx);
        } else {
            self.active_filters.push(level);
        }
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }

    pub fn filtered_logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs
            .iter()
            .filter(|l| self.active_filters.contains(&l.level))
    }

    pub fn log_len(&self) -> usize {
        self.logs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded_and_keeps_newest() {
        let mut state = ProcessingState::new(100);
        for i in 0..250 {
            state.add_log(LogLevel::Debug, format!("line {i}"), None);
        }
        assert_eq!(state.log_len(), 100);
        assert_eq!(state.logs().next().unwrap().message, "line 150");
        assert_eq!(state.logs().last().unwrap().message, "line 249");
    }

    #[test]
    fn filters_hide_debug_by_default() {
        let mut state = ProcessingState::new(10);
        state.add_log(LogLevel::Debug, "noisy", None);
        state.add_log(LogLevel::Warning, "careful", None);
        assert_eq!(state.filtered_logs().count(), 1);

        state.toggle_filter(LogLevel::Debug);
        assert_eq!(state.filtered_logs().count(), 2);
        state.toggle_filter(LogLevel::Warning);
        assert_eq!(state.filtered_logs().next().unwrap().message, "noisy");
    }

    #[test]
    fn tool_progress_tracks_completions() {
        let mut state = ProcessingState::default();
        let search = state.add_tool("web_search", Some("Web search".into()));
        let pdf = state.add_tool("pdf_render", None);
        let mail = state.add_tool("send_mail", None);
        assert_eq!(state.tools_progress(), 0);

        state.set_tool_status(&search, ToolStatus::Running, None);
        assert_eq!(state.active_tool(), Some(search.as_str()));
        assert!(state.is_active());

        state.set_tool_status(&search, ToolStatus::Completed, None);
        assert_eq!(state.active_tool(), None);
        assert_eq!(state.tools_progress(), 33);

        state.set_tool_status(&pdf, ToolStatus::Running, None);
        state.set_tool_status(&pdf, ToolStatus::Error, Some("timeout".into()));
        assert_eq!(state.tools_with_status(ToolStatus::Error).count(), 1);
        assert!(state
            .logs()
            .any(|l| l.level == LogLevel::Error && l.message.contains("timeout")));

        state.remove_tool(&mail);
        assert_eq!(state.tools().len(), 2);
        assert_eq!(state.tools_progress(), 50);
    }

    #[test]
    fn tool_progress_counts_current_statuses() {
        let mut state = ProcessingState::default();
        let a = state.add_tool("a", None);
        let b = state.add_tool("b", None);

        state.set_tool_status(&a, ToolStatus::Completed, None);
        state.set_tool_status(&a, ToolStatus::Running, None);
        state.set_tool_status(&a, ToolStatus::Completed, None);
        assert_eq!(state.tools_progress(), 50);

        state.set_tool_status(&b, ToolStatus::Running, None);
        state.remove_tool(&a);
        assert_eq!(state.tools_progress(), 0);
        assert_eq!(state.active_tool(), Some(b.as_str()));
    }

    #[test]
    fn thinking_progress_is_clamped_and_requires_start() {
        let mut state = ProcessingState::default();
        state.update_thinking("ignored", Some(50), None);
        assert!(state.thinking().is_none());

        state.start_thinking("reading", ThinkingStage::Analyzing);
        state.update_thinking("planning", Some(250), Some(ThinkingStage::Planning));
        let thinking = state.thinking().unwrap();
        assert_eq!(thinking.progress, 100);
        assert_eq!(thinking.stage, Some(ThinkingStage::Planning));

        state.complete_processing();
        assert!(state.thinking().is_none());
        assert!(!state.is_active());
    }

    #[test]
    fn failure_records_error_until_next_start() {
        let mut state = ProcessingState::default();
        state.start_processing("streaming reply");
        state.fail_processing("connection reset");
        assert_eq!(state.error(), Some("connection reset"));
        assert!(!state.is_active());

        state.start_processing("retry");
        assert_eq!(state.error(), None);
        assert_eq!(state.step(), Some("retry"));
    }
}
