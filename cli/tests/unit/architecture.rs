//! Structural tests for layer boundaries.
//!
//! These scan the source tree so a stray import or print shows up as a test
//! failure instead of a slow erosion of the layering.

use std::path::{Path, PathBuf};

fn src(sub: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(sub)
}

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Track brace depth and report whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().starts_with("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Production lines of every file under `dir` that match `forbidden`,
/// formatted as `path:line: text`. Comments and test modules are skipped.
fn violations(dir: &Path, forbidden: impl Fn(&Path, &str) -> bool) -> Vec<String> {
    let mut found = Vec::new();
    for file in collect_rs_files(dir) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();

        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || trimmed.starts_with("//") {
                continue;
            }
            if forbidden(&file, line) {
                found.push(format!("{rel}:{}: {trimmed}", i + 1));
            }
        }
    }
    found
}

fn assert_none(found: &[String], rule: &str) {
    assert!(found.is_empty(), "{rule}:\n{}", found.join("\n"));
}

// ── Domain ────────────────────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let found = violations(&src("domain"), |_, line| {
        [
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio",
            "std::fs",
            "std::process",
            "TcpStream",
            "TcpListener",
        ]
        .iter()
        .any(|needle| line.contains(needle))
    });
    assert_none(&found, "domain/ must stay free of I/O and outer layers");
}

// ── Application ───────────────────────────────────────────────────────────────

#[test]
fn application_has_no_infra_or_output_imports() {
    let found = violations(&src("application"), |_, line| {
        line.contains("crate::infra") || line.contains("crate::output")
    });
    assert_none(&found, "application/ must not import from infra/ or output/");
}

#[test]
fn application_has_no_blocking_io() {
    let found = violations(&src("application"), |_, line| {
        line.contains("std::fs")
            || line.contains("std::process::Command")
            || line.contains("std::net::TcpStream")
    });
    assert_none(&found, "application/ must not use blocking I/O");
}

#[test]
fn core_services_coordinate_without_locks() {
    let core = ["relay.rs", "tunnel.rs", "parallel.rs", "readiness.rs"];
    let found = violations(&src("application").join("services"), |file, line| {
        let is_core = file
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| core.contains(&n));
        is_core && (line.contains("Mutex") || line.contains("RwLock"))
    });
    assert_none(&found, "core services must use channels and tokens, not locks");
}

#[test]
fn application_never_prints() {
    let found = violations(&src("application"), |_, line| {
        line.contains("println!") || line.contains("eprintln!")
    });
    assert_none(&found, "application/ must report through ProgressReporter or tracing");
}

// ── Infra ─────────────────────────────────────────────────────────────────────

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let found = violations(&src("infra"), |_, line| {
        line.contains("crate::commands") || line.contains("crate::output")
    });
    assert_none(&found, "infra/ must not import from commands/ or output/");
}

#[test]
fn infra_has_no_print_macros() {
    let found = violations(&src("infra"), |_, line| {
        line.contains("println!") || line.contains("eprintln!")
    });
    assert_none(&found, "infra/ must log through tracing, not print");
}

#[test]
fn processes_are_spawned_only_in_infra() {
    let found = violations(&src(""), |file, line| {
        let in_infra = file.components().any(|c| c.as_os_str() == "infra");
        !in_infra && line.contains("Command::new(")
    });
    assert_none(&found, "only infra/ may spawn processes");
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[test]
fn commands_use_standardized_confirmation() {
    let found = violations(&src("commands"), |_, line| {
        line.contains("Confirm::new()") || line.contains("stdin().lock()")
    });
    assert_none(&found, "commands must prompt through app.confirm()");
}

#[test]
fn command_handlers_accept_app_context() {
    let mut missing = Vec::new();
    for file in collect_rs_files(&src("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        if content.contains("pub async fn run(")
            && !content.contains("pub async fn run(app: &AppContext")
        {
            missing.push(file.display().to_string());
        }
    }
    assert_none(&missing, "async command handlers must take `app: &AppContext` first");
}
