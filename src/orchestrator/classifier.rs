// ABOUTME: Task classifier mapping a task description to the backend that should run it.
// ABOUTME: Pure, ordered rule table; the first rule that returns a backend wins.

use super::types::{Backend, TaskDescription};

// =============================================================================
// Keyword Lists
// =============================================================================

/// Substrings of `task_type` that mark a task as needing the durable engine.
const COMPLEX_TYPE_KEYWORDS: &[&str] = &[
    "migration",
    "refactor",
    "analyze",
    "audit",
    "generate",
    "workflow",
    "agent",
    "validation",
];

/// Tags that mark a task as needing the durable engine.
const COMPLEX_TAGS: &[&str] = &["stateful", "complex", "long-running", "critical", "ai", "ia"];

/// Retry budgets above this go to the durable engine.
const MAX_QUEUE_ATTEMPTS: u32 = 3;

// =============================================================================
// Rule Table
// =============================================================================

/// One classification rule. `decide` returns `None` to defer to the next rule.
pub struct Rule {
    pub name: &'static str,
    pub decide: fn(&TaskDescription) -> Option<Backend>,
}

/// Rules in precedence order. Explicit complexity is checked before the
/// automation target, so `is_complex` has the final say whenever it is set.
pub const RULES: &[Rule] = &[
    Rule {
        name: "explicit_complexity",
        decide: explicit_complexity,
    },
    Rule {
        name: "automation_target",
        decide: automation_target,
    },
    Rule {
        name: "complex_type_keyword",
        decide: complex_type_keyword,
    },
    Rule {
        name: "retry_budget",
        decide: retry_budget,
    },
    Rule {
        name: "complex_tag",
        decide: complex_tag,
    },
];

/// Name reported when no rule matched and the task falls through to the queue.
pub const DEFAULT_RULE: &str = "default";

fn explicit_complexity(task: &TaskDescription) -> Option<Backend> {
    task.is_complex
        .map(|complex| if complex { Backend::Durable } else { Backend::Queue })
}

fn automation_target(task: &TaskDescription) -> Option<Backend> {
    task.automation_target().map(|_| Backend::Automation)
}

fn complex_type_keyword(task: &TaskDescription) -> Option<Backend> {
    let type_lower = task.task_type.to_lowercase();
    COMPLEX_TYPE_KEYWORDS
        .iter()
        .any(|kw| type_lower.contains(kw))
        .then_some(Backend::Durable)
}

fn retry_budget(task: &TaskDescription) -> Option<Backend> {
    task.retry_policy
        .as_ref()
        .filter(|policy| policy.max_attempts > MAX_QUEUE_ATTEMPTS)
        .map(|_| Backend::Durable)
}

fn complex_tag(task: &TaskDescription) -> Option<Backend> {
    task.tags
        .iter()
        .any(|tag| {
            let tag = tag.trim();
            COMPLEX_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t))
        })
        .then_some(Backend::Durable)
}

// =============================================================================
// Task Classification
// =============================================================================

/// Backend choice plus the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub backend: Backend,
    pub rule: &'static str,
}

/// Classify a task and report which rule decided it.
pub fn explain(task: &TaskDescription) -> Classification {
    RULES
        .iter()
        .find_map(|rule| {
            (rule.decide)(task).map(|backend| Classification {
                backend,
                rule: rule.name,
            })
        })
        .unwrap_or(Classification {
            backend: Backend::Queue,
            rule: DEFAULT_RULE,
        })
}

/// Classify a task into the backend that should run it.
///
/// Rules are applied in priority order:
/// 1. Explicit `is_complex` (true → Durable, false → Queue)
/// 2. Non-empty automation workflow id → Automation
/// 3. Complex keyword in `task_type` → Durable
/// 4. More than 3 retry attempts → Durable
/// 5. Complex tag → Durable
/// 6. Queue (default)
pub fn classify(task: &TaskDescription) -> Backend {
    explain(task).backend
}
