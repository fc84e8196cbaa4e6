//! Resolved test triggers and the trigger request body

use crate::api::{Test, TestPayload, TriggerPayload};
use crate::config::{resolve_test_overrides, ExecutionRule, OverrideSet};

/// A test paired with its fully resolved overrides
#[derive(Debug, Clone, PartialEq)]
pub struct TestTrigger {
    pub test: Test,
    pub overrides: OverrideSet,
}

impl TestTrigger {
    pub fn new(test: Test, global: &OverrideSet, test_overrides: &OverrideSet) -> Self {
        Self {
            test,
            overrides: resolve_test_overrides(global, test_overrides),
        }
    }

    pub fn public_id(&self) -> &str {
        &self.test.public_id
    }

    /// Override rule, then the rule configured on the test, then blocking
    pub fn execution_rule(&self) -> ExecutionRule {
        self.overrides
            .execution_rule
            .or_else(|| self.test.execution_rule())
            .unwrap_or_default()
    }

    /// Overrides as sent to the API
    fn payload(&self) -> TestPayload {
        let mut overrides = self.overrides.clone();
        // The batch deadline is enforced locally
        overrides.polling_timeout = None;
        if let Some(path) = overrides.mobile_application_version_file_path.take() {
            tracing::warn!(
                public_id = self.public_id(),
                path = %path,
                "mobileApplicationVersionFilePath is not supported, application upload skipped"
            );
        }
        TestPayload {
            public_id: self.test.public_id.clone(),
            overrides,
        }
    }
}

/// Build the trigger request for every trigger not skipped
pub fn build_trigger_payload(triggers: &[TestTrigger]) -> TriggerPayload {
    TriggerPayload {
        tests: triggers
            .iter()
            .filter(|trigger| trigger.execution_rule() != ExecutionRule::Skipped)
            .map(TestTrigger::payload)
            .collect(),
    }
}
