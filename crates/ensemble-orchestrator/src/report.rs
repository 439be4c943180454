use crate::types::{FailureKind, TaskCategory, TaskResult};
use std::fmt::Write;

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Remediation lines shown with a failed task.
pub fn remediation_hints(category: TaskCategory, kind: FailureKind) -> Vec<String> {
    match kind {
        FailureKind::Busy => vec!["Wait for the current task to finish, then resubmit".to_string()],
        FailureKind::Timeout => {
            let mut hints = vec![
                format!("{category} tasks can take longer than the configured deadline"),
                "Try a simpler query".to_string(),
                "Check network connectivity".to_string(),
                "Retry later".to_string(),
            ];
            if category == TaskCategory::Complex {
                hints.push("Split the task into several simpler ones".to_string());
            }
            hints
        }
        FailureKind::CoordinatorFault => {
            let mut hints = vec![
                "Check network connectivity".to_string(),
                "Retry later".to_string(),
            ];
            if category == TaskCategory::Complex {
                hints.push("Split the task into several simpler ones".to_string());
            }
            hints
        }
    }
}

/// Operator-facing summary of a finished task.
pub fn render_result(result: &TaskResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");

    match (&result.final_text, &result.failure) {
        (Some(text), None) if result.success => {
            let _ = writeln!(out, "Final result");
            let _ = writeln!(out, "{RULE}");
            let _ = writeln!(out, "Elapsed:   {:.1}s", result.elapsed_seconds);
            let _ = writeln!(out, "Responses: {}", result.response_count);
            let _ = writeln!(out, "Category:  {}", result.category);
            let _ = writeln!(out, "{THIN_RULE}");
            let _ = writeln!(out, "{text}");
        }
        (_, Some(failure)) => {
            let heading = match failure.kind {
                FailureKind::Timeout => "Task timed out",
                FailureKind::CoordinatorFault => "Task failed",
                FailureKind::Busy => "Task rejected",
            };
            let _ = writeln!(out, "{heading} ({:.1}s, {})", result.elapsed_seconds, failure.phase);
            let _ = writeln!(out, "{RULE}");
            let _ = writeln!(out, "{}", failure.message);
            if !failure.hints.is_empty() {
                let _ = writeln!(out, "\nSuggestions:");
                for hint in &failure.hints {
                    let _ = writeln!(out, "  - {hint}");
                }
            }
        }
        _ => {
            let _ = writeln!(
                out,
                "Task finished without a result ({:.1}s)",
                result.elapsed_seconds
            );
        }
    }

    let _ = write!(out, "{RULE}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureInfo, FailurePhase};
    use uuid::Uuid;

    fn result(success: bool) -> TaskResult {
        TaskResult {
            task_id: Uuid::new_v4(),
            success,
            elapsed_seconds: 12.34,
            response_count: 3,
            category: TaskCategory::Complex,
            final_text: success.then(|| "OK".to_string()),
            failure: (!success).then(|| FailureInfo {
                kind: FailureKind::Timeout,
                phase: FailurePhase::FinalResult,
                message: "Timed out after 30s: final result".to_string(),
                hints: remediation_hints(TaskCategory::Complex, FailureKind::Timeout),
            }),
        }
    }

    #[test]
    fn test_complex_hints_suggest_split() {
        let hints = remediation_hints(TaskCategory::Complex, FailureKind::Timeout);
        assert!(hints.iter().any(|h| h.contains("Split")));
        let hints = remediation_hints(TaskCategory::Simple, FailureKind::Timeout);
        assert!(!hints.iter().any(|h| h.contains("Split")));
        assert!(hints[0].starts_with("simple"));
    }

    #[test]
    fn test_render_success() {
        let text = render_result(&result(true));
        assert!(text.contains("Elapsed:   12.3s"));
        assert!(text.contains("Responses: 3"));
        assert!(text.contains("Category:  complex"));
        assert!(text.contains("OK"));
    }

    #[test]
    fn test_render_failure() {
        let text = render_result(&result(false));
        assert!(text.contains("Task timed out (12.3s, final_result)"));
        assert!(text.contains("  - Split the task into several simpler ones"));
    }
}
