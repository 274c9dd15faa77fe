use blockharvest_core::{Config, Paths};
use serde_json::Value;

/// Show the effective configuration as pretty-printed JSON.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    println!();
    println!("📋 Current Configuration");
    if paths.config_file().exists() {
        println!("  File: {}", paths.config_file().display());
    } else {
        println!("  File: {} (not created, showing defaults)", paths.config_file().display());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Write a default config file.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let path = Paths::new().config_file();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    Config::default().save(&path)?;
    println!("✓ Wrote default config: {}", path.display());
    Ok(())
}

pub async fn path() -> anyhow::Result<()> {
    println!("{}", Paths::new().config_file().display());
    Ok(())
}

/// Get a config value by dot-separated key path.
pub async fn get(key: &str) -> anyhow::Result<()> {
    let config = Config::load_or_default(&Paths::new())?;
    let json = serde_json::to_value(&config)?;

    match resolve_json_path(&json, key) {
        Some(Value::String(s)) => println!("{}", s),
        Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        None => anyhow::bail!("Key '{}' not found in config", key),
    }
    Ok(())
}

/// Set a config value by dot-separated key path.
pub async fn set(key: &str, value: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let updated = apply_setting(&config, key, value)?;
    updated.save(&paths.config_file())?;
    println!("✓ Set {} = {}", key, value);
    Ok(())
}

/// `config` with `key` set to `value` (JSON if it parses, a string otherwise).
fn apply_setting(config: &Config, key: &str, value: &str) -> anyhow::Result<Config> {
    let mut json = serde_json::to_value(config)?;
    if resolve_json_path(&json, key).is_none() {
        anyhow::bail!("Unknown config key '{}'", key);
    }
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    set_json_path(&mut json, key, parsed);
    let updated: Config = serde_json::from_value(json)?;
    updated.validate()?;
    Ok(updated)
}

fn resolve_json_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json;
    for part in path.split('.') {
        current = current
            .get(to_camel_case(part))
            .or_else(|| current.get(part))?;
    }
    Some(current.clone())
}

fn set_json_path(json: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        let camel = to_camel_case(part);
        let key = if current.get(&camel).is_some() {
            camel
        } else {
            part.to_string()
        };
        if i == parts.len() - 1 {
            current[&key] = value;
            return;
        }
        current = &mut current[&key];
    }
}

/// `ready_marker_ms` -> `readyMarkerMs`
fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut upper = false;
    for ch in s.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            result.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            result.push(ch);
        }
    }
    result
}
