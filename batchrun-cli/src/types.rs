//! Common types used across CLI modules

/// Notebook parameter given as `key=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    /// Parse a `key=value` argument
    ///
    /// Only the first `=` separates key from value, so values may contain `=`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let (key, value) = input
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", input))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(format!("parameter key cannot be empty in '{}'", input));
        }

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
