//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in the chat crates MUST NOT use blocking I/O. A
//! blocked executor thread stalls reply delivery for every session on it.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::io`, async `reqwest`,
//! not `std::fs`, `std::net`, `reqwest::blocking`.
//!
//! Blocking calls in plain (non-async) functions are accepted: configuration
//! is loaded that way before any session starts.

use std::fs;
use std::path::Path;

use architectural_enforcement::{workspace_root, PRODUCTION_SOURCE_DIRS};

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O calls found in async production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n❌ FORBIDDEN in async code:");
        eprintln!("  - std::fs::read(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream, std::net::TcpListener");
        eprintln!("  - std::io::stdin(), std::io::stdout()");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (config loading)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// The scan must actually see the crates it guards
#[test]
fn test_production_sources_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_SOURCE_DIRS {
        assert!(root.join(dir).is_dir(), "missing source directory {dir}");
    }
}

/// Find all blocking I/O calls in production code
fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();
    let root = workspace_root();

    for dir in PRODUCTION_SOURCE_DIRS {
        check_directory(&root.join(dir), &mut violations);
    }

    violations
}

fn check_directory(path: &Path, violations: &mut Vec<String>) {
    if !path.exists() {
        return;
    }

    for entry in walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            check_file(entry.path(), violations);
        }
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    let lines: Vec<&str> = content.lines().collect();
    let tests_start = test_module_start(&lines);

    for (idx, line) in lines.iter().enumerate() {
        if tests_start.is_some_and(|start| idx >= start) {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        let Some(kind) = blocking_call(code_part) else {
            continue;
        };

        if enclosing_fn_is_async(&lines, idx) == Some(true) {
            violations.push(format!(
                "{}:{} - {kind}: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }
}

/// Classify a line of code as a blocking call, if it is one
fn blocking_call(code: &str) -> Option<&'static str> {
    if code.contains("std::fs::") {
        Some("Blocking file I/O")
    } else if code.contains("std::net::") {
        Some("Blocking network I/O")
    } else if code.contains("reqwest::blocking") {
        Some("Blocking HTTP client")
    } else if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
        Some("Blocking stdin/stdout")
    } else {
        None
    }
}

/// Index of the first line of the `#[cfg(test)]` module, if any
fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|line| line.trim() == "#[cfg(test)]")
}

/// Whether a trimmed line opens a function; `Some(true)` for async ones
fn fn_signature(line: &str) -> Option<bool> {
    let mut rest = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    if rest.starts_with("async fn ") {
        Some(true)
    } else if rest.starts_with("fn ") {
        Some(false)
    } else {
        None
    }
}

/// Whether the function enclosing `current_idx` is async
///
/// Scans backwards to the nearest function signature. Returns `None` at
/// module level. An `async move` block inside a plain function counts as
/// async.
fn enclosing_fn_is_async(lines: &[&str], current_idx: usize) -> Option<bool> {
    for i in (0..=current_idx).rev() {
        let line = lines[i];
        if i != current_idx && line.contains("async move {") {
            return Some(true);
        }
        if let Some(is_async) = fn_signature(line) {
            return Some(is_async);
        }
        let trimmed = line.trim();
        if trimmed.starts_with("impl") || trimmed.starts_with("mod ") {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "    pub async fn connect(&self) -> Result<(), TransportError> {",
            "        let contents = std::fs::read_to_string(\"file.txt\")?;",
            "    }",
        ];
        assert_eq!(enclosing_fn_is_async(&code, 1), Some(true));
        assert_eq!(blocking_call(code[1]), Some("Blocking file I/O"));
    }

    #[test]
    fn test_non_async_function_detection() {
        let code = vec![
            "pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F)",
            "where",
            "    F: Fn(&str) -> Option<String>,",
            "{",
            "    let contents = std::fs::read_to_string(path)?;",
            "}",
        ];
        assert_eq!(enclosing_fn_is_async(&code, 4), Some(false));
    }

    #[test]
    fn test_async_block_in_sync_function() {
        let code = vec![
            "    pub fn submit(&mut self, text: &str) {",
            "        tokio::spawn(async move {",
            "            let stream = std::net::TcpStream::connect(addr);",
            "        });",
            "    }",
        ];
        assert_eq!(enclosing_fn_is_async(&code, 2), Some(true));
    }

    #[test]
    fn test_test_module_skipped() {
        let code = vec!["fn real() {}", "#[cfg(test)]", "mod tests {"];
        assert_eq!(test_module_start(&code), Some(1));
    }

    #[test]
    fn test_tokio_io_not_flagged() {
        assert_eq!(blocking_call("let listener = TcpListener::bind(addr).await?;"), None);
        assert_eq!(blocking_call("tokio::fs::read_to_string(path).await"), None);
    }
}
