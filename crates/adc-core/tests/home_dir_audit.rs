//! Every crate must resolve the home directory through `home::get_home_dir()`
//! so `ADC_HOME` is honored everywhere, including tests.

use std::fs;
use std::path::{Path, PathBuf};

const FORBIDDEN: [&str; 2] = ["dirs::home_dir()", "dirs::config_dir()"];

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

fn violations_in(path: &Path) -> Vec<String> {
    if path.ends_with("home.rs") || path.ends_with("home_dir_audit.rs") {
        return Vec::new();
    }
    let content = fs::read_to_string(path).unwrap();
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .flat_map(|(idx, line)| {
            FORBIDDEN
                .iter()
                .filter(move |pattern| line.contains(*pattern))
                .map(move |pattern| format!("{}:{}: raw `{pattern}`", path.display(), idx + 1))
        })
        .collect()
}

#[test]
fn audit_no_raw_home_dir_calls() {
    let crates_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf();

    let mut files = Vec::new();
    rust_files(&crates_dir, &mut files);
    assert!(!files.is_empty(), "no Rust files under {}", crates_dir.display());

    let violations: Vec<String> = files.iter().flat_map(|f| violations_in(f)).collect();
    assert!(
        violations.is_empty(),
        "use agent_deploy_core::home::get_home_dir() instead:\n{}",
        violations.join("\n")
    );
}
