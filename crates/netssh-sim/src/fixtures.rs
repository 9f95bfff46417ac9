//! Canned-output lookup (§4.8): `<root>/namespace/<ns>/<device>/<cmd>.txt`,
//! tried exact first, then with spaces substituted to `_`. Content is
//! CRLF-normalized with a guaranteed trailing CRLF.

use std::path::{Path, PathBuf};

fn candidate_paths(root: &Path, namespace: &str, device: &str, command: &str) -> [PathBuf; 2] {
    let dir = root.join("namespace").join(namespace).join(device);
    let exact = dir.join(format!("{}.txt", command));
    let underscored = dir.join(format!("{}.txt", command.replace(' ', "_")));
    [exact, underscored]
}

/// Returns the fixture content for `command`, normalized to CRLF line
/// endings with a trailing CRLF, or `None` if no matching file exists.
pub fn lookup(root: &Path, namespace: &str, device: &str, command: &str) -> Option<String> {
    for path in candidate_paths(root, namespace, device, command) {
        if let Ok(raw) = std::fs::read_to_string(&path) {
            return Some(normalize_crlf(&raw));
        }
    }
    None
}

fn normalize_crlf(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                out.push_str("\r\n");
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' => out.push_str("\r\n"),
            other => out.push(other),
        }
    }
    if !out.ends_with("\r\n") {
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(root: &Path, ns: &str, device: &str, file: &str, content: &str) {
        let dir = root.join("namespace").join(ns).join(device);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn finds_exact_match_and_normalizes_trailing_crlf() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "default",
            "huawei-s-01",
            "show_version.txt",
            "VRP (R) software, Version 5.170\n",
        );
        let out = lookup(dir.path(), "default", "huawei-s-01", "show_version").unwrap();
        assert_eq!(out, "VRP (R) software, Version 5.170\r\n");
    }

    #[test]
    fn falls_back_to_underscored_filename() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "default", "cisco-ios-01", "dir_flash.txt", "12345 bytes free\n");
        let out = lookup(dir.path(), "default", "cisco-ios-01", "dir flash").unwrap();
        assert_eq!(out, "12345 bytes free\r\n");
    }

    #[test]
    fn returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(lookup(dir.path(), "default", "huawei-s-01", "sleep_forever").is_none());
    }
}
