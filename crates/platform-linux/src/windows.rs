//! X11 top-level window listing via `wmctrl`.

use std::process::Command;

use duocast_common::{DuocastError, DuocastResult};

/// A managed X11 window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Window {
    /// Window id as printed by `wmctrl` (hex, e.g. `0x03a00007`).
    pub id: String,
    pub title: String,
}

/// List managed windows. Requires `wmctrl` and an X11 (or XWayland) session.
pub fn list_x11_windows() -> DuocastResult<Vec<X11Window>> {
    let output = Command::new("wmctrl").arg("-l").output().map_err(|e| {
        DuocastError::unsupported(format!("Window listing needs wmctrl: {e}"))
    })?;
    if !output.status.success() {
        return Err(DuocastError::unsupported(format!(
            "wmctrl exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(parse_wmctrl_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `wmctrl -l` output: `<id> <desktop> <host> <title...>`.
pub fn parse_wmctrl_list(output: &str) -> Vec<X11Window> {
    output
        .lines()
        .filter_map(|line| {
            let mut rest = line.trim_start();
            let mut fields = [""; 3];
            for field in &mut fields {
                let end = rest.find(char::is_whitespace)?;
                *field = &rest[..end];
                rest = rest[end..].trim_start();
            }
            Some(X11Window {
                id: fields[0].to_string(),
                title: rest.trim_end().to_string(),
            })
        })
        .filter(|w| w.id.starts_with("0x"))
        .collect()
}

/// First window whose title matches exactly.
pub fn find_window<'a>(windows: &'a [X11Window], title: &str) -> Option<&'a X11Window> {
    windows.iter().find(|w| w.title == title)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
0x01e00003 -1 workstation Desktop
0x03a00007  0 workstation Quarterly Review - Slides
0x04200004  1 workstation Terminal
0x04400001  0 workstation
";

    #[test]
    fn parses_titles_with_spaces() {
        let windows = parse_wmctrl_list(SAMPLE);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1].id, "0x03a00007");
        assert_eq!(windows[1].title, "Quarterly Review - Slides");
    }

    #[test]
    fn find_window_matches_exact_title() {
        let windows = parse_wmctrl_list(SAMPLE);
        assert_eq!(
            find_window(&windows, "Terminal").map(|w| w.id.as_str()),
            Some("0x04200004")
        );
        assert!(find_window(&windows, "Term").is_none());
    }
}
