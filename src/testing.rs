//! In-memory backend for tests

use std::cell::RefCell;
use std::collections::HashMap;

use crate::api::HttpFetch;
use crate::error::{PvrError, Result};

pub const BASE_URL: &str = "http://backend:7777";

/// Canned responses keyed by full URL. Unknown URLs fail like an unreachable
/// host; every request is recorded.
#[derive(Default)]
pub struct MockFetcher {
    responses: RefCell<HashMap<String, String>>,
    requests: RefCell<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: &str, body: &str) -> Self {
        self.set(path, body);
        self
    }

    pub fn set(&self, path: &str, body: &str) {
        self.responses
            .borrow_mut()
            .insert(format!("{}{}", BASE_URL, path), body.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.responses
            .borrow_mut()
            .remove(&format!("{}{}", BASE_URL, path));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        let url = format!("{}{}", BASE_URL, path);
        self.requests.borrow().iter().filter(|r| **r == url).count()
    }
}

impl HttpFetch for MockFetcher {
    fn get(&self, url: &str) -> Result<String> {
        self.requests.borrow_mut().push(url.to_string());
        match self.responses.borrow().get(url) {
            Some(body) if body.is_empty() => Err(PvrError::EmptyResponse(url.to_string())),
            Some(body) => Ok(body.clone()),
            None => Err(PvrError::Transport(format!("connection refused: {}", url))),
        }
    }
}
