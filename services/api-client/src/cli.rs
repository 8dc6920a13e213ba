//! Command-line arguments

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hostel-api")]
#[command(about = "Hostel admin API client with transparent session renewal")]
pub struct Args {
    /// TOML config file (default: hostel-api.toml)
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Log in and persist the session
    Login {
        /// JSON credentials, e.g. '{"email":"...","password":"..."}'
        #[arg(value_parser = parse_json)]
        body: Value,
    },
    /// Clear the session
    Logout,
    /// Send a request and print the response body
    Request {
        /// GET, POST, PUT, PATCH or DELETE
        #[arg(value_parser = parse_method)]
        method: Method,
        /// Path relative to the API base URL, starting with '/'
        #[arg(value_parser = parse_path)]
        path: String,
        /// Optional JSON body
        #[arg(value_parser = parse_json)]
        body: Option<Value>,
    },
}

fn parse_method(raw: &str) -> Result<Method, String> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(format!("unsupported method {raw:?}")),
    }
}

fn parse_path(raw: &str) -> Result<String, String> {
    if raw.starts_with('/') {
        Ok(raw.to_string())
    } else {
        Err(format!("path must start with '/', got: {raw}"))
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {e}"))
}
