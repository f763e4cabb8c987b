//! Wire protocol
//!
//! Two channels, both UTF-8 text:
//!
//! - Discovery (UDP, connectionless): request payload is the literal
//!   token `DISCOVER`; response payload is the literal token
//!   `WORKER_AVAILABLE`. Any other payload is ignored.
//! - Task dispatch (TCP stream): one line per message.
//!
//! ```text
//! Coordinator                        Worker
//!     |                                |
//!     |---- "<id> <left> <right>\n" -->|
//!     |                                |
//!     |<------- "<id> <value>\n" ------|
//! ```
//!
//! Result lines are newline-terminated by our worker; the trailing
//! newline is not required on the wire, so a final unterminated line at
//! EOF still parses.

use std::fmt;
use thiserror::Error;

/// Discovery probe payload (coordinator → broadcast)
pub const DISCOVER: &str = "DISCOVER";

/// Discovery acknowledgement payload (worker → coordinator)
pub const WORKER_AVAILABLE: &str = "WORKER_AVAILABLE";

/// Malformed wire payload
///
/// Carried as a typed error so the drop-vs-crash policy stays with the
/// caller: both loops log and drop, neither crashes.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected {expected} fields, got {got}: {line:?}")]
    FieldCount {
        expected: usize,
        got: usize,
        line: String,
    },
    #[error("bad task id in {0:?}")]
    TaskId(String),
    #[error("bad numeric field in {0:?}")]
    Number(String),
    #[error("empty interval in {0:?}")]
    EmptyInterval(String),
}

/// Task assignment record (coordinator → worker)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskAssignment {
    pub task_id: usize,
    pub left: f64,
    pub right: f64,
}

impl fmt::Display for TaskAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.task_id, self.left, self.right)
    }
}

/// Result record (worker → coordinator)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskResult {
    pub task_id: usize,
    pub value: f64,
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.task_id, self.value)
    }
}

/// Parse a task assignment line `"<taskId> <left> <right>"`
pub fn parse_assignment(line: &str) -> Result<TaskAssignment, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(ParseError::FieldCount {
            expected: 3,
            got: fields.len(),
            line: line.to_string(),
        });
    }

    let task_id = fields[0]
        .parse::<usize>()
        .map_err(|_| ParseError::TaskId(line.to_string()))?;
    let left = parse_f64(fields[1], line)?;
    let right = parse_f64(fields[2], line)?;

    if left >= right {
        return Err(ParseError::EmptyInterval(line.to_string()));
    }

    Ok(TaskAssignment {
        task_id,
        left,
        right,
    })
}

/// Parse a result line `"<taskId> <value>"`
pub fn parse_result(line: &str) -> Result<TaskResult, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(ParseError::FieldCount {
            expected: 2,
            got: fields.len(),
            line: line.to_string(),
        });
    }

    let task_id = fields[0]
        .parse::<usize>()
        .map_err(|_| ParseError::TaskId(line.to_string()))?;
    let value = parse_f64(fields[1], line)?;

    Ok(TaskResult { task_id, value })
}

fn parse_f64(field: &str, line: &str) -> Result<f64, ParseError> {
    let value = field
        .parse::<f64>()
        .map_err(|_| ParseError::Number(line.to_string()))?;
    if !value.is_finite() {
        return Err(ParseError::Number(line.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_round_trip() {
        let assignment = TaskAssignment {
            task_id: 42,
            left: 0.25,
            right: 0.5,
        };
        let line = assignment.to_string();
        assert_eq!(parse_assignment(&line).unwrap(), assignment);
    }

    #[test]
    fn test_result_round_trip() {
        let result = TaskResult {
            task_id: 7,
            value: 0.03125,
        };
        assert_eq!(parse_result(&result.to_string()).unwrap(), result);
    }

    #[test]
    fn test_parse_assignment_tolerates_trailing_newline() {
        let parsed = parse_assignment("3 0.75 1\n").unwrap();
        assert_eq!(parsed.task_id, 3);
        assert_eq!(parsed.left, 0.75);
        assert_eq!(parsed.right, 1.0);
    }

    #[test]
    fn test_parse_result_without_newline() {
        // The trailing newline is optional on the wire
        let parsed = parse_result("0 0.333333").unwrap();
        assert_eq!(parsed.task_id, 0);
    }

    #[test]
    fn test_parse_assignment_rejects_malformed() {
        assert!(parse_assignment("").is_err());
        assert!(parse_assignment("1 2").is_err());
        assert!(parse_assignment("x 0.0 1.0").is_err());
        assert!(parse_assignment("1 zero 1.0").is_err());
        assert!(parse_assignment("-1 0.0 1.0").is_err());
        assert!(parse_assignment("1 0.0 1.0 extra").is_err());
    }

    #[test]
    fn test_parse_assignment_rejects_empty_interval() {
        assert_eq!(
            parse_assignment("1 1.0 1.0").unwrap_err(),
            ParseError::EmptyInterval("1 1.0 1.0".to_string())
        );
        assert!(parse_assignment("1 2.0 1.0").is_err());
    }

    #[test]
    fn test_parse_result_rejects_malformed() {
        assert!(parse_result("just-noise").is_err());
        assert!(parse_result("1").is_err());
        assert!(parse_result("1 NaN").is_err());
        assert!(parse_result("1 inf").is_err());
    }

    #[test]
    fn test_discovery_tokens() {
        // Wire constants; matched byte-for-byte by both sides
        assert_eq!(DISCOVER, "DISCOVER");
        assert_eq!(WORKER_AVAILABLE, "WORKER_AVAILABLE");
    }
}
