//! Transcript model for session evaluation.
//!
//! A transcript is the ordered record of everything that happened in one
//! agent session: user and agent messages plus tool invocations. The gate
//! never mutates it; checkers and the classifier read structural features
//! (file writes, test commands, questions) out of it.

use serde::{Deserialize, Serialize};

/// Who produced a message entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human operator driving the session.
    User,
    /// The autonomous agent.
    Agent,
}

/// One entry in a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// A conversational message.
    Message { role: Role, text: String },
    /// A tool invocation with its raw input and, when captured, its output.
    ToolCall {
        tool: String,
        input: serde_json::Value,
        #[serde(default)]
        output: Option<String>,
    },
}

/// A single item from a task-list tool snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: String,
}

impl TodoItem {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }
}

/// File extensions treated as source code for classification purposes.
const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "cc", "cpp", "h", "hpp", "rb", "php",
    "swift", "kt", "scala", "sh", "sql",
];

/// File extensions treated as documentation or configuration.
const DOC_CONFIG_EXTENSIONS: &[&str] = &[
    "md", "txt", "rst", "adoc", "yaml", "yml", "toml", "json", "ini", "cfg", "conf",
];

/// Test runner invocations recognized in shell commands.
const TEST_COMMANDS: &[&str] = &[
    "cargo test",
    "pytest",
    "npm test",
    "npm run test",
    "yarn test",
    "go test",
    "make test",
    "mvn test",
    "rspec",
    "phpunit",
];

fn is_write_tool(tool: &str) -> bool {
    let t = tool.to_ascii_lowercase();
    t.contains("write") || t.contains("edit") || t.contains("create_file") || t == "notebookedit"
}

fn is_read_tool(tool: &str) -> bool {
    let t = tool.to_ascii_lowercase();
    matches!(t.as_str(), "read" | "grep" | "glob" | "ls" | "search" | "fetch" | "webfetch")
        || t.contains("read_file")
        || t.contains("list_dir")
}

fn is_command_tool(tool: &str) -> bool {
    let t = tool.to_ascii_lowercase();
    matches!(t.as_str(), "bash" | "shell" | "terminal") || t.contains("run_command") || t.contains("execute")
}

fn is_todo_tool(tool: &str) -> bool {
    tool.to_ascii_lowercase().contains("todo")
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    path.rsplit('.')
        .next()
        .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
}

impl TranscriptEntry {
    /// The file path targeted by a write/edit tool call, if any.
    pub fn written_path(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool, input, .. } if is_write_tool(tool) => input
                .get("file_path")
                .or_else(|| input.get("path"))
                .and_then(serde_json::Value::as_str),
            _ => None,
        }
    }

    /// The content written by a write/edit tool call, if any.
    pub fn written_content(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool, input, .. } if is_write_tool(tool) => input
                .get("content")
                .or_else(|| input.get("new_string"))
                .and_then(serde_json::Value::as_str),
            _ => None,
        }
    }

    /// The shell command run by a command tool call, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool, input, .. } if is_command_tool(tool) => {
                input.get("command").and_then(serde_json::Value::as_str)
            }
            _ => None,
        }
    }

    /// The task-list snapshot carried by a todo tool call, if any.
    pub fn todo_items(&self) -> Option<Vec<TodoItem>> {
        match self {
            Self::ToolCall { tool, input, .. } if is_todo_tool(tool) => input
                .get("todos")
                .or_else(|| input.get("items"))
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            _ => None,
        }
    }

    /// Whether this entry is a read-only (exploratory) tool call.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ToolCall { tool, .. } if is_read_tool(tool))
    }

    /// All human-visible text of this entry, for keyword scans.
    pub fn text(&self) -> String {
        match self {
            Self::Message { text, .. } => text.clone(),
            Self::ToolCall { input, output, .. } => {
                let mut s = input.to_string();
                if let Some(out) = output {
                    s.push('\n');
                    s.push_str(out);
                }
                s
            }
        }
    }
}

/// An immutable session transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(entries: Vec<TranscriptEntry>) -> Self {
        Self { entries }
    }

    /// Parse a JSONL transcript. Malformed lines are skipped, not fatal.
    pub fn from_jsonl(raw: &str) -> Self {
        let entries = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping malformed transcript line");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries at or past `watermark` (the delta since the last block).
    pub fn slice_from(&self, watermark: usize) -> &[TranscriptEntry] {
        let start = watermark.min(self.entries.len());
        &self.entries[start..]
    }

    /// Paths of all file writes.
    pub fn written_paths(&self) -> Vec<&str> {
        self.entries.iter().filter_map(TranscriptEntry::written_path).collect()
    }

    /// Paths of writes to source-code files.
    pub fn code_writes(&self) -> Vec<&str> {
        self.written_paths()
            .into_iter()
            .filter(|p| has_extension(p, CODE_EXTENSIONS))
            .collect()
    }

    /// Paths of writes to documentation or configuration files.
    pub fn doc_config_writes(&self) -> Vec<&str> {
        self.written_paths()
            .into_iter()
            .filter(|p| has_extension(p, DOC_CONFIG_EXTENSIONS))
            .collect()
    }

    /// Number of read-only tool calls.
    pub fn read_only_ops(&self) -> usize {
        self.entries.iter().filter(|e| e.is_read_only()).count()
    }

    /// All shell commands run during the session.
    pub fn commands(&self) -> Vec<&str> {
        self.entries.iter().filter_map(TranscriptEntry::command).collect()
    }

    /// Shell commands that invoke a known test runner.
    pub fn test_commands(&self) -> Vec<&str> {
        self.commands()
            .into_iter()
            .filter(|c| TEST_COMMANDS.iter().any(|t| c.contains(t)))
            .collect()
    }

    /// Shell commands that touch version control.
    pub fn vcs_commands(&self) -> Vec<&str> {
        self.commands()
            .into_iter()
            .filter(|c| {
                let c = c.trim_start();
                c.starts_with("git ") || c.starts_with("gh ") || c.starts_with("hg ")
            })
            .collect()
    }

    /// Whether any PR-level operation happened (gh pr create, push, etc).
    pub fn has_pr_operations(&self) -> bool {
        self.vcs_commands()
            .iter()
            .any(|c| c.contains("gh pr") || c.contains("push") || c.contains("merge-request"))
    }

    /// The most recent task-list snapshot, if any tool call carried one.
    pub fn latest_todo_snapshot(&self) -> Option<Vec<TodoItem>> {
        self.entries.iter().rev().find_map(TranscriptEntry::todo_items)
    }

    /// Messages sent by the user, in order.
    pub fn user_messages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Message { role: Role::User, text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Messages sent by the agent, in order.
    pub fn agent_messages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Message { role: Role::Agent, text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Fraction of the initiating user messages that contain a question mark.
    ///
    /// Looks at the first three user messages only; later questions are
    /// usually follow-ups, not the session's intent.
    pub fn initial_question_density(&self) -> f64 {
        let initial: Vec<&str> = self.user_messages().into_iter().take(3).collect();
        if initial.is_empty() {
            return 0.0;
        }
        let with_question = initial.iter().filter(|m| m.contains('?')).count();
        with_question as f64 / initial.len() as f64
    }

    /// All entry text joined, for keyword presence scans.
    pub fn joined_text(&self) -> String {
        self.entries.iter().map(TranscriptEntry::text).collect::<Vec<_>>().join("\n")
    }
}
