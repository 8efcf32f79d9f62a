use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::Path;
use walkdir::DirEntry;

pub fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

/// Dotfiles and dot-directories (`.git`, `.DS_Store`, ...) are never
/// published. The walk root itself is always allowed.
pub fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Joins the components of a relative path with `/`, whatever the platform
/// separator is.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Formats `time` with the strftime-style `format`. An invalid format falls
/// back to RFC 3339 with a warning rather than failing.
pub fn format_time<Tz: chrono::TimeZone>(time: &chrono::DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    use std::fmt::Write;
    let mut out = String::new();
    match write!(out, "{}", time.format(format)) {
        Ok(()) => out,
        Err(_) => {
            tracing::warn!("Invalid time format `{}`", format);
            time.to_rfc3339()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("guide").join("intro").as_path()), "guide/intro");
    }

    #[test]
    fn test_format_time() {
        let time = chrono::Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 0).unwrap();
        assert_eq!(format_time(&time, "%Y-%m-%d %H:%M"), "2021-01-02 03:04");
        assert_eq!(format_time(&time, "%Q"), "2021-01-02T03:04:00+00:00");
    }
}
