use serde_json::Value;
use std::io::{self, Read};

/// Read JSON or YAML from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive).
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // JSON is valid YAML, but JSON errors read better for JSON input
    let value: Value = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        serde_yaml::from_str(trimmed)?
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_and_yaml() {
        let json = parse_piped(r#"{"category": "401"}"#).unwrap().unwrap();
        assert_eq!(json["category"], "401");

        let yaml = parse_piped("category: \"401\"\nfiscal_power: 7\n")
            .unwrap()
            .unwrap();
        assert_eq!(yaml["category"], "401");
        assert_eq!(yaml["fiscal_power"], 7);
    }

    #[test]
    fn test_blank_input_is_none() {
        assert!(parse_piped("  \n").unwrap().is_none());
    }
}
