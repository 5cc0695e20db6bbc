use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_round_trips_through_as_str() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let parsed: LogLevel =
                parse_level(level.as_str()).expect("level should parse");
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn environment_only_accepts_full_lowercase_names() {
        use serde::de::IntoDeserializer;
        let parse = |s: &str| -> Result<Environment, serde::de::value::Error> {
            Environment::deserialize(s.into_deserializer())
        };

        assert_eq!(parse("production").unwrap(), Environment::Production);
        assert_eq!(parse("development").unwrap(), Environment::Development);
        assert!(parse("prod").is_err());
        assert!(parse("staging").is_err());
    }

    /// Deserializes a bare lowercase identifier through serde's value deserializer.
    fn parse_level(s: &str) -> Result<LogLevel, serde::de::value::Error> {
        use serde::de::IntoDeserializer;
        LogLevel::deserialize(s.into_deserializer())
    }
}
