//! Mock emulator for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::emulator::{BootImage, BootReceipt, Emulator, EmulatorError};

/// Mock implementation of the Emulator trait.
///
/// Records every booted image and can be told to reject the next boot.
#[derive(Debug, Clone, Default)]
pub struct MockEmulator {
    booted: Arc<RwLock<Vec<BootImage>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next boot fail with `reason`.
    pub async fn reject_next(&self, reason: impl Into<String>) {
        *self.next_error.write().await = Some(reason.into());
    }

    /// Images booted so far.
    pub async fn booted(&self) -> Vec<BootImage> {
        self.booted.read().await.clone()
    }
}

#[async_trait]
impl Emulator for MockEmulator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn boot(&self, image: BootImage) -> Result<BootReceipt, EmulatorError> {
        if let Some(reason) = self.next_error.write().await.take() {
            return Err(EmulatorError::Rejected(reason));
        }

        let bytes = image.data.len() as u64;
        self.booted.write().await.push(image);
        Ok(BootReceipt {
            location: None,
            bytes,
        })
    }
}
