use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TICKER_LEN: usize = 16;

/// Exchange ticker symbol, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(value: &str) -> Result<Self, String> {
        let normalized = value.trim().to_uppercase();
        if normalized.is_empty() {
            return Err("empty ticker symbol".to_string());
        }
        if normalized.len() > MAX_TICKER_LEN {
            return Err(format!(
                "ticker symbol too long (max {MAX_TICKER_LEN}): {value}"
            ));
        }
        // Index and FX symbols on the chart API use ^ and = (e.g. ^GSPC, EURUSD=X).
        if let Some(ch) = normalized
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '^' | '=')))
        {
            return Err(format!("invalid character '{ch}' in ticker symbol: {value}"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}
