//! Parser configuration.
//!
//! Everything here has a default so a config file only names what it changes:
//!
//! ```json
//! { "parameters": [{ "name": "x", "type": "double" }], "static_type": "Math" }
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::Result;

/// One entry of the delegate signature used when the text has no `x =>` prefix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl ParameterSpec {
    pub fn new(name: &str, ty: &str) -> Self {
        ParameterSpec {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    pub parameters: Vec<ParameterSpec>,
    /// Result type the body is converted to; inferred from the body when absent.
    pub return_type: Option<String>,
    /// Parameter whose members may be used unqualified.
    pub default_receiver: Option<String>,
    /// Type whose static members may be used unqualified (`Math`).
    pub static_type: Option<String>,
    /// Namespace prefixes accepted in front of type names.
    pub namespaces: Vec<String>,
    /// Retry member lookup ignoring case when the exact spelling is not found.
    pub ignore_case: bool,
    /// Type given to lambda parameters written without one.
    pub default_parameter_type: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            parameters: Vec::new(),
            return_type: None,
            default_receiver: None,
            static_type: None,
            namespaces: Vec::new(),
            ignore_case: false,
            default_parameter_type: "double".to_string(),
        }
    }
}

impl ParserOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        let options: ParserOptions = serde_json::from_str(text)?;

        info!("Loaded parser options with {} parameters", options.parameters.len());

        Ok(options)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_parameter(mut self, name: &str, ty: &str) -> Self {
        self.parameters.push(ParameterSpec::new(name, ty));
        self
    }

    pub fn with_static_type(mut self, ty: &str) -> Self {
        self.static_type = Some(ty.to_string());
        self
    }

    pub fn with_return_type(mut self, ty: &str) -> Self {
        self.return_type = Some(ty.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options = ParserOptions::from_json(r#"{ "parameters": [{ "name": "n", "type": "int" }] }"#).unwrap();
        assert_eq!(options.parameters, vec![ParameterSpec::new("n", "int")]);
        assert_eq!(options.default_parameter_type, "double");
        assert!(!options.ignore_case);
    }
}
