//! Target environment and its base URL.

use std::fmt;
use std::str::FromStr;

pub const CIE_URL: &str = "https://wwwcie.ups.com";
pub const PRODUCTION_URL: &str = "https://onlinetools.ups.com";

/// Which UPS deployment requests are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Customer integration environment.
    #[default]
    Test,
    Production,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Test => CIE_URL,
            Environment::Production => PRODUCTION_URL,
        }
    }

    /// Token endpoint for this environment.
    pub fn token_url(self) -> String {
        format!("{}/security/v1/oauth/token", self.base_url())
    }
}

impl FromStr for Environment {
    type Err = String;

    /// Case-insensitive; an empty value selects the test environment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "test" | "cie" | "sandbox" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment '{}' (expected 'test' or 'production')",
                other
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_test() {
        assert_eq!(Environment::default().base_url(), CIE_URL);
    }

    #[test]
    fn parses_production_case_insensitively() {
        assert_eq!("PRODUCTION".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("test".parse::<Environment>(), Ok(Environment::Test));
        assert_eq!("".parse::<Environment>(), Ok(Environment::Test));
    }

    #[test]
    fn rejects_unknown_environment() {
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn token_url_is_under_base() {
        assert_eq!(
            Environment::Production.token_url(),
            "https://onlinetools.ups.com/security/v1/oauth/token"
        );
    }
}
