//! # Actor Lifecycle
//!
//! Both workflow machines run as lightweight actors: a tokio task owning its
//! state, fed through channels. This trait gives them a common name and
//! lifecycle hooks without pulling in an actor framework.

use crate::error::Result;

pub trait WorkflowActor: Send + 'static {
    /// Actor name for logging
    fn name(&self) -> &'static str;

    /// Called once before the actor processes its first message
    fn started(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once after the actor's loop has exited
    fn stopped(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        started: bool,
    }

    impl WorkflowActor for Probe {
        fn name(&self) -> &'static str {
            "Probe"
        }

        fn started(&mut self) -> Result<()> {
            self.started = true;
            Ok(())
        }
    }

    #[test]
    fn test_default_hooks_succeed() {
        let mut probe = Probe { started: false };
        probe.started().unwrap();
        assert!(probe.started);
        assert!(probe.stopped().is_ok());
        assert_eq!(probe.name(), "Probe");
    }
}
