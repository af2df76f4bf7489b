use std::str::FromStr;

use super::error::TypeError;

pub type FormData = Vec<(String, String)>;

/// Decoded query string; keys may repeat (`?tags=lunch&tags=dinner`).
#[derive(Debug, Clone, Default)]
pub struct QueryForm {
    inner: FormData,
}

impl QueryForm {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) if value.trim().is_empty() => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(&format!("'{key}' must be a number"))),
            None => Ok(None),
        }
    }

    /// `1` / `true` switch a flag on, anything else leaves it off.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(
            self.get_str(key).map(|v| v.trim().to_lowercase()).as_deref(),
            Some("1") | Some("true")
        )
    }
}
