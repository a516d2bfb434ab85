//! Build script for fastloop-runtime
//!
//! Generates `OUT_DIR/fl_merged_config.rs` with the compile-time defaults
//! for `RuntimeConfig`. When `FL_CONFIG_RS` names a file, any
//! `pub const NAME: TYPE = VALUE;` lines in it replace the matching
//! defaults. Unknown names are reported as build warnings and ignored.

use std::env;
use std::fs;
use std::path::Path;

/// (name, type, default)
const PARAMS: &[(&str, &str, &str)] = &[
    ("POOL_INIT_BLOCKS", "usize", "128"),
    ("POOL_MAX_INCREMENT", "usize", "1024"),
    ("QUEUE_INIT_NODES", "usize", "128"),
    ("QUEUE_MAX_INCREMENT", "usize", "1024"),
    ("BACKOFF_PAUSE_MAX", "u32", "32"),
    ("BACKOFF_YIELD_MAX", "u32", "8"),
    ("BACKOFF_SLEEP_MAX_MS", "u64", "512"),
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest = Path::new(&out_dir).join("fl_merged_config.rs");

    let mut values: Vec<String> = PARAMS.iter().map(|p| p.2.to_string()).collect();

    println!("cargo:rerun-if-env-changed=FL_CONFIG_RS");
    let user = env::var("FL_CONFIG_RS").ok();
    if let Some(path) = &user {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(text) => {
                merge(&text, &mut values);
                println!("cargo:warning=Using custom config: {}", path);
            }
            Err(e) => println!("cargo:warning=Failed to read FL_CONFIG_RS ({}): {}", path, e),
        }
    }

    fs::write(&dest, render(&values, user.is_some())).expect("Failed to write merged config");
}

/// Overwrite `values` with every recognised constant found in `text`
fn merge(text: &str, values: &mut [String]) {
    for (name, value) in text.lines().filter_map(parse_const) {
        match PARAMS.iter().position(|p| p.0 == name) {
            Some(i) => values[i] = value,
            None => println!("cargo:warning=Unknown config parameter: {}", name),
        }
    }
}

/// `pub const NAME: TYPE = VALUE;` -> (NAME, VALUE)
fn parse_const(line: &str) -> Option<(String, String)> {
    let rest = line.trim().strip_prefix("pub const ")?;
    let (name, rest) = rest.split_once(':')?;
    let (_, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';').trim();
    Some((name.trim().to_string(), value.to_string()))
}

fn render(values: &[String], custom: bool) -> String {
    let mut out = String::from("// Generated by build.rs\n");
    if custom {
        out.push_str("// Defaults merged with FL_CONFIG_RS\n");
    }
    out.push('\n');
    for ((name, ty, _), value) in PARAMS.iter().zip(values) {
        out.push_str(&format!("pub const {}: {} = {};\n", name, ty, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_const() {
        assert_eq!(
            parse_const("pub const POOL_INIT_BLOCKS: usize = 256;"),
            Some(("POOL_INIT_BLOCKS".into(), "256".into()))
        );
        assert_eq!(
            parse_const("  pub const QUEUE_MAX_INCREMENT : usize = 4 * 1024;"),
            Some(("QUEUE_MAX_INCREMENT".into(), "4 * 1024".into()))
        );
        assert_eq!(parse_const("// pub const X: u32 = 1;"), None);
    }

    #[test]
    fn test_merge_keeps_unlisted_defaults() {
        let mut values: Vec<String> = PARAMS.iter().map(|p| p.2.to_string()).collect();
        merge("pub const BACKOFF_SLEEP_MAX_MS: u64 = 64;\n", &mut values);
        assert_eq!(values[6], "64");
        assert_eq!(values[0], "128");
    }
}
