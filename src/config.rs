//! Environment-driven configuration for room limits.

/// Environment variable for the maximum participants per room.
pub const ENV_MAX_PARTICIPANTS: &str = "CALLROOM_MAX_PARTICIPANTS";
/// Environment variable for the advisory minimum participants per call.
pub const ENV_MIN_PARTICIPANTS: &str = "CALLROOM_MIN_PARTICIPANTS";

const DEFAULT_MAX_PARTICIPANTS: usize = 10;
const DEFAULT_MIN_PARTICIPANTS: usize = 2;

/// Room limits consumed from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum participants per room; joins beyond this fail with ROOM_FULL.
    pub max_participants_per_room: usize,
    /// Minimum participants for a viable call. Advisory only: clients may
    /// surface it in their UI, the registry never enforces it.
    pub min_participants: usize,
}

impl Config {
    /// Read configuration from the process environment, falling back to
    /// defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let config = Self {
            max_participants_per_room: parse_limit(
                std::env::var(ENV_MAX_PARTICIPANTS).ok(),
                DEFAULT_MAX_PARTICIPANTS,
            ),
            min_participants: parse_limit(
                std::env::var(ENV_MIN_PARTICIPANTS).ok(),
                DEFAULT_MIN_PARTICIPANTS,
            ),
        };
        tracing::info!(
            "Room limits: max {} participants per room, min {} for a viable call",
            config.max_participants_per_room,
            config.min_participants
        );
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_participants_per_room: DEFAULT_MAX_PARTICIPANTS,
            min_participants: DEFAULT_MIN_PARTICIPANTS,
        }
    }
}

/// Parse a positive limit from an environment value, falling back to the
/// default for missing, non-numeric, or zero values.
fn parse_limit(value: Option<String>, default: usize) -> usize {
    match value.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<usize>() {
            Ok(parsed) if parsed > 0 => parsed,
            _ => {
                tracing::warn!("Invalid limit value '{}', using default {}", raw, default);
                default
            }
        },
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit_with_missing_value() {
        let result = parse_limit(None, 10);

        assert_eq!(result, 10);
    }

    #[test]
    fn test_parse_limit_with_valid_value() {
        let result = parse_limit(Some("25".to_string()), 10);

        assert_eq!(result, 25);
    }

    #[test]
    fn test_parse_limit_with_surrounding_whitespace() {
        let result = parse_limit(Some(" 4 ".to_string()), 10);

        assert_eq!(result, 4);
    }

    #[test]
    fn test_parse_limit_with_non_numeric_value() {
        let result = parse_limit(Some("lots".to_string()), 10);

        assert_eq!(result, 10);
    }

    #[test]
    fn test_parse_limit_with_zero_falls_back_to_default() {
        // A zero-capacity room could never be joined; treat it as misconfiguration.
        let result = parse_limit(Some("0".to_string()), 10);

        assert_eq!(result, 10);
    }

    #[test]
    fn test_parse_limit_with_empty_value() {
        let result = parse_limit(Some("".to_string()), 2);

        assert_eq!(result, 2);
    }

    #[test]
    fn test_default_config_matches_documented_limits() {
        let config = Config::default();

        assert_eq!(config.max_participants_per_room, 10);
        assert_eq!(config.min_participants, 2);
    }
}
