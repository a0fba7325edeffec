use super::CRLF;
use crate::error::{Error, Result};

/// Ordered header multimap.
///
/// Keeps insertion order and original key spelling for output;
/// lookups ignore ASCII case. Repeated keys are all retained. Keys
/// and values never contain CR or LF, so every header serializes to
/// exactly one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        check_key(&key)?;
        if value.contains(['\r', '\n']) {
            return Err(Error::Cpim(format!("Line break in {key} value: {value:?}")));
        }
        self.entries.push((key, value));
        Ok(())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.push(key, value)?;
        Ok(self)
    }

    /// First value stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Every value stored under `name`, in insertion order.
    pub fn get_all<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a CRLF-separated header block (no trailing blank line).
    /// Continuation lines are unfolded into the previous value.
    pub fn parse(block: &str) -> Result<Self> {
        let mut headers = Self::new();
        for line in block.split(CRLF).filter(|l| !l.is_empty()) {
            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = headers.entries.last_mut() else {
                    return Err(Error::Cpim(format!("Continuation without header: {line:?}")));
                };
                value.push(' ');
                value.push_str(line.trim_start_matches([' ', '\t']));
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                return Err(Error::Cpim(format!("Malformed header line: {line:?}")));
            };
            check_key(key)?;
            let value = value.strip_prefix([' ', '\t']).unwrap_or(value);
            headers.entries.push((key.to_string(), value.to_string()));
        }
        Ok(headers)
    }

    /// Append `key: value` CRLF lines in insertion order.
    pub fn write_to(&self, out: &mut String) {
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(CRLF);
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c.is_control() || c == ':') {
        return Err(Error::Cpim(format!("Malformed header name: {key:?}")));
    }
    Ok(())
}
