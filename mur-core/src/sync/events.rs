//! Canonical hook events and per-tool translation tables
//!
//! The core names events canonically; each target adapter carries a static
//! table translating them to its tool's native names. An event missing
//! from a table is unsupported on that target: it is silently omitted from
//! the written hooks and reported in the sync result.

/// Canonical hook events the learning layer can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalEvent {
    /// The user submitted a prompt
    UserPromptSubmit,
    /// The assistant finished responding
    Stop,
    /// A tool is about to run
    BeforeTool,
    /// A tool finished running
    AfterTool,
    /// A session began
    SessionStart,
    /// A session ended
    SessionEnd,
}

impl CanonicalEvent {
    /// Every canonical event, in declaration order.
    pub const ALL: [CanonicalEvent; 6] = [
        CanonicalEvent::UserPromptSubmit,
        CanonicalEvent::Stop,
        CanonicalEvent::BeforeTool,
        CanonicalEvent::AfterTool,
        CanonicalEvent::SessionStart,
        CanonicalEvent::SessionEnd,
    ];

    /// Canonical kebab-case name, used in hook commands.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalEvent::UserPromptSubmit => "user-prompt-submit",
            CanonicalEvent::Stop => "stop",
            CanonicalEvent::BeforeTool => "before-tool",
            CanonicalEvent::AfterTool => "after-tool",
            CanonicalEvent::SessionStart => "session-start",
            CanonicalEvent::SessionEnd => "session-end",
        }
    }
}

impl std::fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static translation table: canonical event to a tool's native name.
pub type EventTable = &'static [(CanonicalEvent, &'static str)];

/// Translation table for Claude-style tools (full event support).
pub const CLAUDE_EVENTS: EventTable = &[
    (CanonicalEvent::UserPromptSubmit, "UserPromptSubmit"),
    (CanonicalEvent::Stop, "Stop"),
    (CanonicalEvent::BeforeTool, "PreToolUse"),
    (CanonicalEvent::AfterTool, "PostToolUse"),
    (CanonicalEvent::SessionStart, "SessionStart"),
    (CanonicalEvent::SessionEnd, "SessionEnd"),
];

/// Translation table for tools that only observe the conversation.
pub const PROMPT_ONLY_EVENTS: EventTable = &[
    (CanonicalEvent::UserPromptSubmit, "onPrompt"),
    (CanonicalEvent::Stop, "onResponse"),
];

/// Look up an event in a table.
#[must_use]
pub fn translate(table: EventTable, event: CanonicalEvent) -> Option<&'static str> {
    table
        .iter()
        .find(|(canonical, _)| *canonical == event)
        .map(|(_, native)| *native)
}
