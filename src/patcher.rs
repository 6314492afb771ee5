//! C9 — File Patcher: path-safety gate, content match, hash-based stale
//! detection, backup, and atomic write. Grounded in
//! `cosmos::diff::{backup_file, apply_diff_to_file}` for the backup/apply
//! shape and `cosmos::safe_apply`'s structured result pattern.

use crate::error::PatchError;
use crate::model::{FixSuggestion, PatchResult};
use crate::snippet::Encoding;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PatchOptions {
    pub root_directory: PathBuf,
    pub allow_outside_root: bool,
    pub create_backup: bool,
    pub verify_content: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            root_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            allow_outside_root: false,
            create_backup: true,
            verify_content: true,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Applies only the first edit of the normalized fix to disk (open
/// question decision, see DESIGN.md).
pub fn apply(fix: &FixSuggestion, options: &PatchOptions) -> PatchResult {
    let Some(edit) = fix.edits.first() else {
        return PatchResult::fail("fix suggestion has no edits");
    };

    match apply_first_edit(edit, options) {
        Ok(backup_path) => PatchResult::ok(backup_path),
        Err(err) => PatchResult::fail(err.to_string()),
    }
}

/// Path gate + read + content-match, without touching disk.
pub fn verify(fix: &FixSuggestion, options: &PatchOptions) -> bool {
    let Some(edit) = fix.edits.first() else {
        return false;
    };
    verify_first_edit(edit, options).is_ok()
}

fn apply_first_edit(
    edit: &crate::model::FixEdit,
    options: &PatchOptions,
) -> Result<PathBuf, PatchError> {
    let resolved = safe_resolve(&edit.file_path, options)?;

    let original_bytes =
        std::fs::read(&resolved).map_err(|e| PatchError::Io(e.to_string()))?;
    let original_hash = sha256(&original_bytes);

    let (encoding, bom_len) = Encoding::detect(&original_bytes);
    let has_bom = bom_len > 0;
    let text = encoding.decode(&original_bytes[bom_len..]);
    let line_ending = dominant_line_ending(&text);

    let file_lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let match_index = find_content_match(&file_lines, &edit.original_lines)
        .ok_or_else(|| PatchError::ContentMismatch("original code not found".to_string()))?;

    if options.verify_content {
        let recheck_bytes =
            std::fs::read(&resolved).map_err(|e| PatchError::Io(e.to_string()))?;
        if sha256(&recheck_bytes) != original_hash {
            return Err(PatchError::StaleFile(
                "file content changed during the operation".to_string(),
            ));
        }
    }

    let new_content = build_patched_content(&file_lines, match_index, edit, line_ending);
    let new_bytes = encode_with_bom(&new_content, encoding, has_bom);

    let backup_path = if options.create_backup {
        write_backup(&options.root_directory, &resolved, &original_bytes)?
    } else {
        PathBuf::new()
    };

    atomic_write(&resolved, &new_bytes)?;

    Ok(backup_path)
}

fn verify_first_edit(edit: &crate::model::FixEdit, options: &PatchOptions) -> Result<(), PatchError> {
    let resolved = safe_resolve(&edit.file_path, options)?;
    let bytes = std::fs::read(&resolved).map_err(|e| PatchError::Io(e.to_string()))?;
    let (encoding, bom_len) = Encoding::detect(&bytes);
    let text = encoding.decode(&bytes[bom_len..]);
    let file_lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    find_content_match(&file_lines, &edit.original_lines)
        .map(|_| ())
        .ok_or_else(|| PatchError::ContentMismatch("original code not found".to_string()))
}

/// Rejects empty paths and anything that resolves outside the canonical
/// root (including `..`-based escapes), unless `allow_outside_root` is set.
fn safe_resolve(file_path: &str, options: &PatchOptions) -> Result<PathBuf, PatchError> {
    if file_path.trim().is_empty() {
        return Err(PatchError::PathUnsafe("empty file path".to_string()));
    }

    let joined = options.root_directory.join(file_path);
    let normalized = lexically_normalize(&joined);

    if options.allow_outside_root {
        return Ok(normalized);
    }

    let canonical_root = options
        .root_directory
        .canonicalize()
        .unwrap_or_else(|_| lexically_normalize(&options.root_directory));

    if !normalized.starts_with(&canonical_root) {
        return Err(PatchError::PathUnsafe(format!(
            "{} escapes root directory {}",
            normalized.display(),
            canonical_root.display()
        )));
    }

    Ok(normalized)
}

/// Resolves `.`/`..` components without requiring the path to exist on
/// disk (a plain `canonicalize()` would fail for a not-yet-created file).
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn sha256(bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().to_vec()
}

/// CRLF wins on majority-or-tie (spec §4.9).
fn dominant_line_ending(text: &str) -> LineEnding {
    let crlf_count = text.matches("\r\n").count();
    let total_newlines = text.matches('\n').count();
    let lf_only_count = total_newlines.saturating_sub(crlf_count);
    if crlf_count >= lf_only_count {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

/// Smallest `i` such that every trimmed original line matches the
/// corresponding trimmed file line (spec §4.9 whitespace-tolerant match).
fn find_content_match(file_lines: &[&str], original_lines: &[String]) -> Option<usize> {
    if original_lines.is_empty() || original_lines.len() > file_lines.len() {
        return None;
    }
    let window = original_lines.len();
    for i in 0..=(file_lines.len() - window) {
        let all_match = (0..window).all(|j| file_lines[i + j].trim() == original_lines[j].trim());
        if all_match {
            return Some(i);
        }
    }
    None
}

fn build_patched_content(
    file_lines: &[&str],
    match_index: usize,
    edit: &crate::model::FixEdit,
    line_ending: LineEnding,
) -> String {
    let replacement_lines: Vec<&str> = edit.replacement.split('\n').collect();
    let mut result: Vec<&str> = Vec::with_capacity(file_lines.len());
    result.extend_from_slice(&file_lines[..match_index]);
    result.extend_from_slice(&replacement_lines);
    result.extend_from_slice(&file_lines[match_index + edit.original_lines.len()..]);
    result.join(line_ending.as_str())
}

fn encode_with_bom(text: &str, encoding: Encoding, has_bom: bool) -> Vec<u8> {
    let mut bytes = match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Utf16Le => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        Encoding::Utf16Be => text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        Encoding::Utf32Be => text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect(),
    };
    if has_bom {
        let bom: &[u8] = match encoding {
            Encoding::Utf8 => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf16Be => &[0xFE, 0xFF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
        };
        let mut with_bom = bom.to_vec();
        with_bom.append(&mut bytes);
        return with_bom;
    }
    bytes
}

/// Copies the pre-modification bytes to
/// `<root>/.tsugix/backup/<yyyymmdd_HHmmss>/<relative-path>`.
fn write_backup(root: &Path, target: &Path, original_bytes: &[u8]) -> Result<PathBuf, PatchError> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let relative = target.strip_prefix(root).unwrap_or(target);
    let backup_path = root.join(".tsugix").join("backup").join(timestamp).join(relative);

    if let Some(parent) = backup_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PatchError::Io(e.to_string()))?;
    }
    std::fs::write(&backup_path, original_bytes).map_err(|e| PatchError::Io(e.to_string()))?;
    Ok(backup_path)
}

/// Writes to a sibling temp file, flushes, then renames over the target so
/// the target is never observed in a partially-written state.
fn atomic_write(target: &Path, bytes: &[u8]) -> Result<(), PatchError> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let temp_name = format!(".tsugix.tmp.{}", uuid::Uuid::new_v4().simple());
    let temp_path = parent.join(temp_name);

    let write_result = (|| -> std::io::Result<()> {
        use std::io::Write;
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(PatchError::Io(e.to_string()));
    }

    if let Err(e) = std::fs::rename(&temp_path, target) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(PatchError::Io(e.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FixEdit;

    fn edit(file_path: &str, start: usize, end: usize, original: &[&str], replacement: &str) -> FixEdit {
        FixEdit {
            file_path: file_path.to_string(),
            start_line: start,
            end_line: end,
            original_lines: original.iter().map(|s| s.to_string()).collect(),
            replacement: replacement.to_string(),
        }
    }

    fn suggestion(edits: Vec<FixEdit>) -> FixSuggestion {
        FixSuggestion {
            language: None,
            edits,
            explanation: None,
            confidence: 80,
        }
    }

    #[test]
    fn test_apply_guards_divisor_and_writes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.py");
        std::fs::write(&file_path, "def divide(a, b):\n    return a / b\n").unwrap();

        let fix = suggestion(vec![edit(
            "test.py",
            2,
            2,
            &["    return a / b"],
            "    return a / b if b != 0 else 0",
        )]);

        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = apply(&fix, &options);
        assert!(result.success, "{:?}", result.error_message);
        assert!(result.backup_path.exists());

        let backup_content = std::fs::read_to_string(&result.backup_path).unwrap();
        assert_eq!(backup_content, "def divide(a, b):\n    return a / b\n");

        let new_content = std::fs::read_to_string(&file_path).unwrap();
        assert!(new_content.contains("if b != 0 else 0"));
    }

    #[test]
    fn test_apply_fails_on_content_drift() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.py");
        std::fs::write(&file_path, "def divide(a, b):\n    return safe_div(a, b)\n").unwrap();

        let fix = suggestion(vec![edit(
            "test.py",
            2,
            2,
            &["    return a / b"],
            "    return a / b if b != 0 else 0",
        )]);

        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = apply(&fix, &options);
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("original code not found"));

        let unchanged = std::fs::read_to_string(&file_path).unwrap();
        assert_eq!(unchanged, "def divide(a, b):\n    return safe_div(a, b)\n");
    }

    #[test]
    fn test_apply_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let fix = suggestion(vec![edit(
            "../../etc/passwd",
            1,
            1,
            &["root:x:0:0"],
            "pwned",
        )]);

        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = apply(&fix, &options);
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("escapes root directory"));
    }

    #[test]
    fn test_apply_rejects_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        let fix = suggestion(vec![edit("", 1, 1, &["x"], "y")]);
        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let result = apply(&fix, &options);
        assert!(!result.success);
    }

    #[test]
    fn test_verify_true_on_matching_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.py"), "x = 1\ny = 2\n").unwrap();
        let fix = suggestion(vec![edit("test.py", 1, 1, &["x = 1"], "x = 2")]);
        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(verify(&fix, &options));
    }

    #[test]
    fn test_dominant_line_ending_prefers_crlf_on_majority() {
        assert_eq!(dominant_line_ending("a\r\nb\r\nc\r\n"), LineEnding::CrLf);
        assert_eq!(dominant_line_ending("a\nb\nc\n"), LineEnding::Lf);
    }

    #[test]
    fn test_line_ending_preserved_as_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.py");
        std::fs::write(&file_path, "a = 1\r\nb = 2\r\n").unwrap();

        let fix = suggestion(vec![edit("test.py", 1, 1, &["a = 1"], "a = 10")]);
        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        apply(&fix, &options);

        let new_bytes = std::fs::read(&file_path).unwrap();
        let new_text = String::from_utf8(new_bytes).unwrap();
        assert!(new_text.contains("\r\n"));
    }

    #[test]
    fn test_utf8_bom_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.py");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"x = 1\ny = 2\n");
        std::fs::write(&file_path, &bytes).unwrap();

        let fix = suggestion(vec![edit("test.py", 1, 1, &["x = 1"], "x = 2")]);
        let options = PatchOptions {
            root_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        apply(&fix, &options);

        let new_bytes = std::fs::read(&file_path).unwrap();
        assert_eq!(&new_bytes[..3], &[0xEF, 0xBB, 0xBF]);
    }

    #[test]
    fn test_lexically_normalize_collapses_parent_dir() {
        let path = Path::new("/root/project/../project/src/main.rs");
        assert_eq!(lexically_normalize(path), PathBuf::from("/root/project/src/main.rs"));
    }
}
