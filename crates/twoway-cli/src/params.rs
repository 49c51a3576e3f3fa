//! JSON parameter files
//!
//! ```json
//! {
//!   "pmb": { "memberName": "S", "ids": [1, 2] },
//!   "$types": { "memberId": "bigint" },
//!   "memberId": null
//! }
//! ```

use anyhow::{Context, bail};
use std::path::Path;
use std::str::FromStr;
use twoway_core::{Value, ValueType};
use twoway_templates::Parameters;

/// Key holding declared argument types
pub const TYPES_KEY: &str = "$types";

/// Parse a JSON document into template parameters
pub fn parse_params(json: &str) -> anyhow::Result<Parameters> {
    let document: serde_json::Value =
        serde_json::from_str(json).context("parameters are not valid JSON")?;
    let serde_json::Value::Object(entries) = document else {
        bail!("parameters must be a JSON object keyed by argument name");
    };

    let mut params = Parameters::new();
    for (name, value) in entries {
        if name != TYPES_KEY {
            params = params.with(name, Value::from(value));
            continue;
        }
        let serde_json::Value::Object(types) = value else {
            bail!("'{TYPES_KEY}' must map argument names to type names");
        };
        for (arg, type_name) in types {
            let Some(type_name) = type_name.as_str() else {
                bail!("declared type of '{arg}' must be a string");
            };
            let value_type = ValueType::from_str(type_name)
                .with_context(|| format!("declared type of '{arg}'"))?;
            params = params.with_type(arg, value_type);
        }
    }
    Ok(params)
}

/// Read parameters from a file
pub fn load_params(path: &Path) -> anyhow::Result<Parameters> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read parameters from {}", path.display()))?;
    parse_params(&json).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_params_with_types() {
        let params = parse_params(indoc! {r#"
            {
              "pmb": { "memberName": "S", "ids": [1, 2] },
              "$types": { "memberId": "bigint" },
              "memberId": null
            }
        "#})
        .unwrap();

        assert_eq!(params.args.len(), 2);
        assert_eq!(params.args.get("memberId"), Some(&Value::Null));
        assert_eq!(params.types.get("memberId"), Some(&ValueType::BigInt));
        let Some(Value::Map(pmb)) = params.args.get("pmb") else {
            panic!("pmb should be a map");
        };
        assert_eq!(pmb.get("ids"), Some(&Value::from(vec![1i64, 2])));
    }

    #[test]
    fn test_parse_params_rejects_bad_documents() {
        assert!(parse_params("[1, 2]").is_err());
        assert!(parse_params(r#"{"$types": {"a": "uuid"}}"#).is_err());
        assert!(parse_params(r#"{"$types": ["a"]}"#).is_err());
        assert!(parse_params("{").is_err());
    }

    #[test]
    fn test_load_params_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"pmb": {{"id": 3}}}}"#).unwrap();

        let params = load_params(file.path()).unwrap();
        assert!(params.args.contains_key("pmb"));
    }
}
