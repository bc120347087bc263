//! Log output formats selectable for `spired`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How `spired` renders its `tracing` events on stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event, the default for supervised runs.
    #[default]
    Json,
    /// Terse single-line text for interactive use.
    Compact,
}

/// Error returned when `--log-format` or `SPIRE_LOG_FORMAT` names no known format.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("Compact", LogFormat::Compact)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().expect("format"), expected);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
