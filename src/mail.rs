//! Verification code delivery.
//!
//! The production backend would hand codes to a mail provider; the trait
//! keeps that seam open while the default implementation only logs that a
//! delivery happened. Code plaintext never appears in log output.

use async_trait::async_trait;
use tracing::info;

use crate::Result;

/// Delivers one-time verification codes to users.
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send(&self, email: &str, code: &str) -> Result<()>;
}

/// Development sender: records the delivery without revealing the code.
#[derive(Debug, Default, Clone)]
pub struct TracingSender;

#[async_trait]
impl CodeSender for TracingSender {
    async fn send(&self, email: &str, _code: &str) -> Result<()> {
        info!(email, "verification code dispatched");
        Ok(())
    }
}

pub mod testing {
    //! Test doubles for code delivery, shared by unit and API tests.

    use std::sync::Mutex;

    use super::*;
    use crate::StratusError;

    /// Captures every (email, code) pair it is asked to send.
    #[derive(Debug, Default)]
    pub struct CapturingSender {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl CapturingSender {
        pub fn last_code(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, c)| c.clone())
        }
    }

    #[async_trait]
    impl CodeSender for CapturingSender {
        async fn send(&self, email: &str, code: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    /// Always fails, for exercising delivery-failure paths.
    #[derive(Debug, Default)]
    pub struct FailingSender;

    #[async_trait]
    impl CodeSender for FailingSender {
        async fn send(&self, _email: &str, _code: &str) -> Result<()> {
            Err(StratusError::Internal("mail delivery failed".to_string()))
        }
    }
}
