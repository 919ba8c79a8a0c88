use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{qualify, Thread, DIDEX_PROBLEM_REPORT};
use crate::error::ProblemReportCode;

/// Notifies the peer that a protocol message was rejected and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemReport {
    #[serde(rename = "@type")]
    pub message_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    #[serde(rename = "problem-code", skip_serializing_if = "Option::is_none")]
    pub problem_code: Option<ProblemReportCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<String>,
}

impl ProblemReport {
    pub fn new(problem_code: Option<ProblemReportCode>, explain: Option<String>) -> Self {
        Self {
            message_type: qualify(DIDEX_PROBLEM_REPORT),
            id: Uuid::new_v4().to_string(),
            thread: None,
            problem_code,
            explain,
        }
    }

    pub fn assign_thread_from(&mut self, thread: Option<&Thread>, message_id: &str) {
        self.thread = Some(Thread::from_message(thread, message_id));
    }
}
