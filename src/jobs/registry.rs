use crate::jobs::{JobHandler, PipelineError};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of job handlers by kind
#[derive(Default, Clone)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler for a specific kind
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    /// The handler for `kind`, or `UnsupportedJobType`.
    pub fn handler_for(&self, kind: &str) -> Result<Arc<dyn JobHandler>, PipelineError> {
        self.handlers
            .get(kind)
            .cloned()
            .ok_or_else(|| PipelineError::UnsupportedJobType(kind.to_string()))
    }

    /// Get all registered job kinds
    pub fn registered_kinds(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ErrorKind, Job};
    use async_trait::async_trait;

    struct TestJobHandler;

    #[async_trait]
    impl JobHandler for TestJobHandler {
        async fn run(&self, _job: &Job) -> Result<(), PipelineError> {
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "test_job"
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = JobRegistry::new();
        registry.register(TestJobHandler);

        assert_eq!(registry.registered_kinds(), vec!["test_job"]);
    }

    #[test]
    fn test_handler_lookup() {
        let mut registry = JobRegistry::new();
        registry.register(TestJobHandler);

        assert!(registry.handler_for("test_job").is_ok());

        match registry.handler_for("unknown_job") {
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::UnsupportedJobType);
                assert_eq!(err.to_string(), "Unsupported job type: unknown_job");
            }
            Ok(_) => panic!("unknown kinds must not resolve"),
        }
    }
}
