//! Input forms for the send-message and post-task dialogs.

use wws_comms_protocol::{CommsSendRequest, CommsTaskRequest};

const FIELD_COUNT: usize = 3;

/// Three text fields with one focused at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Fields {
    values: [String; FIELD_COUNT],
    focused: usize,
}

impl Fields {
    fn next(&mut self) {
        self.focused = (self.focused + 1) % FIELD_COUNT;
    }

    fn prev(&mut self) {
        self.focused = (self.focused + FIELD_COUNT - 1) % FIELD_COUNT;
    }

    fn push(&mut self, c: char) {
        self.values[self.focused].push(c);
    }

    fn pop(&mut self) {
        self.values[self.focused].pop();
    }

    fn as_strs(&self) -> [&str; FIELD_COUNT] {
        [&self.values[0], &self.values[1], &self.values[2]]
    }
}

/// Dialog state for `POST /api/comms/send`. All three fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendForm {
    fields: Fields,
}

impl SendForm {
    pub const LABELS: [&'static str; FIELD_COUNT] =
        ["From (agent ID):", "To (agent ID):", "Message:"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> usize {
        self.fields.focused
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields.values.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> [&str; FIELD_COUNT] {
        self.fields.as_strs()
    }

    pub fn next_field(&mut self) {
        self.fields.next();
    }

    pub fn prev_field(&mut self) {
        self.fields.prev();
    }

    pub fn push(&mut self, c: char) {
        self.fields.push(c);
    }

    pub fn backspace(&mut self) {
        self.fields.pop();
    }

    /// The request to send, or `None` while any field is blank.
    pub fn submit(&self) -> Option<CommsSendRequest> {
        let [from, to, message] = &self.fields.values;
        if [from, to, message].iter().any(|v| v.trim().is_empty()) {
            return None;
        }
        Some(CommsSendRequest {
            from_agent_id: from.trim().to_string(),
            to_agent_id: to.trim().to_string(),
            message: message.clone(),
        })
    }
}

/// Dialog state for `POST /api/comms/task`. Only the title is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    fields: Fields,
}

impl TaskForm {
    pub const LABELS: [&'static str; FIELD_COUNT] = [
        "Title:",
        "Description:",
        "Assign to (agent ID, optional):",
    ];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> usize {
        self.fields.focused
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields.values.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> [&str; FIELD_COUNT] {
        self.fields.as_strs()
    }

    pub fn next_field(&mut self) {
        self.fields.next();
    }

    pub fn prev_field(&mut self) {
        self.fields.prev();
    }

    pub fn push(&mut self, c: char) {
        self.fields.push(c);
    }

    pub fn backspace(&mut self) {
        self.fields.pop();
    }

    /// The task to post, or `None` while the title is blank. A blank
    /// assignee leaves the task unassigned.
    pub fn submit(&self) -> Option<CommsTaskRequest> {
        let [title, description, assignee] = &self.fields.values;
        if title.trim().is_empty() {
            return None;
        }
        let assignee = assignee.trim();
        Some(CommsTaskRequest {
            title: title.trim().to_string(),
            description: description.clone(),
            assigned_to: (!assignee.is_empty()).then(|| assignee.to_string()),
        })
    }
}
