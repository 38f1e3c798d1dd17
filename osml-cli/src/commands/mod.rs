pub mod eval;
pub mod render;
pub mod tokens;

use std::path::Path;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use osml_engine::Value;

/// Load a JSON data document, or an empty map when none is given
pub fn load_data(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::map(Vec::<(String, Value)>::new()));
    };
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read data file: {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Invalid JSON in data file: {}", path.display()))?;
    Ok(Value::from(json))
}
