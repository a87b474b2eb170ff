//! Serialization of allow-list entries into the reverse-proxy fragment.
//!
//! Each entry becomes one line:
//!
//! ```text
//! allow 10.0.0.5;        # 12  | 2024-01-01 00:00:00 | office
//! allow 10.0.0.6;        # 13  | Permanent           | vpn gateway
//! ```
//!
//! The proxy includes this file verbatim, so the layout is a compatibility
//! contract and must stay byte-for-byte stable.

use chrono::DateTime;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Entry;

const DIRECTIVE_WIDTH: usize = 22;
const ID_WIDTH: usize = 3;
const EXPIRATION_WIDTH: usize = 19;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render entries in iteration order, one line each, joined by `\n`
pub fn render(entries: &[Entry]) -> Result<String> {
    let lines = entries
        .iter()
        .map(format_entry)
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

/// Render a single entry as an `allow` directive with its trailing comment
pub fn format_entry(entry: &Entry) -> Result<String> {
    let directive = format!("allow {};", entry.ip);
    Ok(format!(
        "{:<dw$} # {:<iw$} | {} | {}",
        directive,
        entry.id,
        format_expiration(entry.expiration)?,
        entry.label,
        dw = DIRECTIVE_WIDTH,
        iw = ID_WIDTH,
    ))
}

/// `Permanent` (padded to the timestamp width) or the UTC timestamp
pub fn format_expiration(expiration: i64) -> Result<String> {
    if expiration == 0 {
        return Ok(format!("{:<EXPIRATION_WIDTH$}", "Permanent"));
    }

    DateTime::from_timestamp(expiration, 0)
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .ok_or(Error::InvalidTimestamp(expiration))
}

/// Replace `path` with `content` so readers see either the old or the new
/// file, never a partial one.
///
/// The content goes to a temporary file in the same directory, is synced,
/// then renamed over the target.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.flush()?;

    // tempfile creates 0600 files; the proxy usually runs as another user
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NEVER;

    fn entry(id: i64, ip: &str, label: &str, expiration: i64) -> Entry {
        Entry {
            id,
            ip: ip.to_string(),
            label: label.to_string(),
            expiration,
        }
    }

    #[test]
    fn test_permanent_line_layout() {
        let line = format_entry(&entry(1, "10.0.0.5", "test", NEVER)).unwrap();
        assert_eq!(
            line,
            "allow 10.0.0.5;        # 1   | Permanent           | test"
        );
    }

    #[test]
    fn test_timestamp_line_layout() {
        // 2023-11-14 22:13:20 UTC
        let line = format_entry(&entry(42, "192.168.100.200", "home", 1_700_000_000)).unwrap();
        assert_eq!(
            line,
            "allow 192.168.100.200; # 42  | 2023-11-14 22:13:20 | home"
        );
    }

    #[test]
    fn test_long_fields_are_not_truncated() {
        let line = format_entry(&entry(12345, "255.255.255.255", "", NEVER)).unwrap();
        assert!(line.starts_with("allow 255.255.255.255; # 12345 | "));
    }

    #[test]
    fn test_render_joins_lines_without_trailing_newline() {
        let entries = vec![
            entry(1, "10.0.0.1", "a", NEVER),
            entry(2, "10.0.0.2", "b", 1_700_000_000),
        ];
        let text = render(&entries).unwrap();

        assert_eq!(text.lines().count(), 2);
        assert!(!text.ends_with('\n'));
        assert!(text.lines().next().unwrap().starts_with("allow 10.0.0.1;"));
        assert!(text.lines().nth(1).unwrap().starts_with("allow 10.0.0.2;"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]).unwrap(), "");
    }

    #[test]
    fn test_render_is_deterministic() {
        let entries = vec![
            entry(3, "10.0.0.3", "x", 1_650_000_000),
            entry(7, "10.0.0.7", "y, z", NEVER),
        ];
        assert_eq!(render(&entries).unwrap(), render(&entries.clone()).unwrap());
    }

    #[test]
    fn test_unrepresentable_timestamp_fails() {
        let err = format_expiration(i64::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(i64::MAX)));
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data").join("allow.conf");

        write_atomic(&path, "first version that is fairly long").unwrap();
        write_atomic(&path, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
