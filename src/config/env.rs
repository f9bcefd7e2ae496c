use std::env;
use std::fmt::Display;
use std::str::FromStr;

use super::utils::{non_empty, parse_bool};

/// Read an environment variable, treating empty values as unset
pub fn env_var(name: &str) -> Option<String> {
    non_empty(env::var(name).ok())
}

/// Read and parse an environment variable
///
/// # Errors
/// Returns an error naming the variable when the value does not parse
pub fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {e}").into()),
        None => Ok(None),
    }
}

/// Read a boolean environment variable (`true/false`, `1/0`, `yes/no`, `on/off`)
pub fn parse_env_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_var(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid boolean for {name}: {raw}").into()),
        None => Ok(None),
    }
}

/// First variable that is set, in order
pub fn first_env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env_var(name))
}
