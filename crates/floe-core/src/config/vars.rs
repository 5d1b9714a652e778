//! Environment variable interpolation for config files.
//!
//! Credentials usually arrive through the environment, so config text is
//! expanded before YAML parsing. Supported forms:
//! - `$VAR` or `${VAR}` - the variable's value, error if unset
//! - `${VAR:-default}` - default when VAR is unset or empty
//! - `${VAR-default}` - default only when VAR is unset
//! - `$$` - a literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{ ([A-Za-z_][A-Za-z0-9_]*) (?: (:?-) ([^}]*) )? \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every problem found, so users see all missing variables at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| expand(caps, &mut errors))
        .into_owned();

    InterpolationResult { text, errors }
}

fn expand(caps: &Captures, errors: &mut Vec<String>) -> String {
    let whole = &caps[0];
    if whole == "$$" {
        return "$".to_string();
    }

    let Some(name) = caps.get(1).or_else(|| caps.get(4)).map(|m| m.as_str()) else {
        return whole.to_string();
    };
    let operator = caps.get(2).map(|m| m.as_str());
    let default = caps.get(3).map(|m| m.as_str());

    match env::var(name) {
        Ok(value) if value.contains(['\n', '\r']) => {
            errors.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            whole.to_string()
        }
        Ok(value) if value.is_empty() && operator == Some(":-") => {
            default.unwrap_or_default().to_string()
        }
        Ok(value) => value,
        Err(_) => match default {
            Some(default) => default.to_string(),
            None => {
                errors.push(format!("environment variable '{name}' is not set"));
                whole.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names; the process environment is shared.
    fn set(key: &str, value: Option<&str>) {
        // SAFETY: every test touches distinct variables.
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    #[test]
    fn test_plain_and_braced() {
        set("FLOE_TEST_USER", Some("root"));
        let result = interpolate("user: $FLOE_TEST_USER / ${FLOE_TEST_USER}");
        assert!(result.is_ok());
        assert_eq!(result.text, "user: root / root");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        set("FLOE_TEST_MISSING_A", None);
        set("FLOE_TEST_MISSING_B", None);
        let result = interpolate("a: $FLOE_TEST_MISSING_A\nb: ${FLOE_TEST_MISSING_B}");
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("FLOE_TEST_MISSING_A"));
        assert!(result.errors[1].contains("not set"));
    }

    #[test]
    fn test_defaults() {
        set("FLOE_TEST_UNSET", None);
        set("FLOE_TEST_EMPTY", Some(""));

        assert_eq!(interpolate("${FLOE_TEST_UNSET:-ns}").text, "ns");
        assert_eq!(interpolate("${FLOE_TEST_UNSET-ns}").text, "ns");
        assert_eq!(interpolate("${FLOE_TEST_EMPTY:-ns}").text, "ns");
        assert_eq!(interpolate("[${FLOE_TEST_EMPTY-ns}]").text, "[]");
    }

    #[test]
    fn test_newlines_rejected() {
        set("FLOE_TEST_MULTILINE", Some("a\nb"));
        let result = interpolate("password: $FLOE_TEST_MULTILINE");
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("newlines"));
    }

    #[test]
    fn test_escape_sequence() {
        let result = interpolate("password: p$$ss");
        assert!(result.is_ok());
        assert_eq!(result.text, "password: p$ss");
    }
}
