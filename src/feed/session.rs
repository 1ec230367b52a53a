use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Cookies captured from the price feed.
///
/// Shared by every request to the same feed regardless of asset. Entries are
/// merged by name and never removed.
#[derive(Debug, Default)]
pub struct SessionCookies {
    jar: Mutex<BTreeMap<String, String>>,
}

impl SessionCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `cookies` into the store, replacing values of existing names.
    pub fn merge<I>(&self, cookies: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        jar.extend(cookies);
    }

    /// Value for a `Cookie` request header, or `None` when nothing is stored.
    pub fn header_value(&self) -> Option<String> {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        if jar.is_empty() {
            return None;
        }
        let pairs: Vec<String> = jar
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }
}
