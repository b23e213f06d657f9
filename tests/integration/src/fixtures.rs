//! Test fixtures and data generators
//!
//! Provides reusable test data for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};

use ephemera_core::ByteStream;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Channel name and password pair
#[derive(Debug, Clone)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

impl Credentials {
    /// Fresh name, unique across tests and runs sharing a Redis instance
    pub fn unique() -> Self {
        let run = uuid::Uuid::new_v4().simple().to_string();
        Self {
            name: format!("test-channel-{}-{}", &run[..8], unique_suffix()),
            password: "TestPass123!".to_string(),
        }
    }

    pub fn lobby() -> Self {
        Self {
            name: "lobby".to_string(),
            password: "pw1".to_string(),
        }
    }

    pub fn wrong_password(&self) -> String {
        format!("{}-wrong", self.password)
    }
}

/// Small PNG-looking payload
pub const PHOTO_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";

/// Wrap static bytes as an upload stream
pub fn upload(data: &'static [u8]) -> ByteStream {
    Box::pin(data)
}
