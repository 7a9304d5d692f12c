pub mod apply;
pub mod export;
pub mod repair;
pub mod status;
pub mod verify;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

#[cfg(test)]
mod tests {
    use super::CommandReport;

    #[test]
    fn issue_marks_report_failed_and_merge_keeps_failure() {
        let mut outer = CommandReport::new("apply");
        outer.detail("records_applied=1");
        let mut inner = CommandReport::new("export");
        inner.issue("pandoc missing");

        outer.merge(inner);
        assert!(!outer.ok);
        assert_eq!(outer.details, vec!["records_applied=1"]);
        assert_eq!(outer.issues, vec!["pandoc missing"]);
    }
}
