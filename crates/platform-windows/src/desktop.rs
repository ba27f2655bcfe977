//! Top-level window enumeration through `EnumWindows`.

use duocast_common::DuocastResult;
use duocast_platform_core::filter_window_titles;

/// A top-level window as reported by the window manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelWindow {
    pub title: String,
    pub visible: bool,
}

/// Titles of visible windows, filtered for capture. Several windows of one
/// process each keep their own entry.
pub fn captureable_titles(windows: &[TopLevelWindow]) -> Vec<String> {
    filter_window_titles(
        windows
            .iter()
            .filter(|w| w.visible)
            .map(|w| w.title.as_str()),
    )
}

/// Every top-level window on the current desktop.
#[cfg(windows)]
pub fn enumerate_windows() -> DuocastResult<Vec<TopLevelWindow>> {
    use duocast_common::DuocastError;
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
    };

    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        // SAFETY: `lparam` carries the `Vec` borrowed for the duration of
        // the `EnumWindows` call below.
        let found = unsafe { &mut *(lparam.0 as *mut Vec<TopLevelWindow>) };
        // SAFETY: `hwnd` comes straight from the enumeration.
        let (visible, len) =
            unsafe { (IsWindowVisible(hwnd).as_bool(), GetWindowTextLengthW(hwnd)) };
        if len > 0 {
            let mut buf = vec![0u16; len as usize + 1];
            // SAFETY: `buf` holds `len` characters plus the terminator.
            let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
            if copied > 0 {
                found.push(TopLevelWindow {
                    title: String::from_utf16_lossy(&buf[..copied as usize]),
                    visible,
                });
            }
        }
        TRUE
    }

    let mut found: Vec<TopLevelWindow> = Vec::new();
    // SAFETY: the callback only touches `found`, which outlives the call.
    unsafe {
        EnumWindows(
            Some(collect),
            LPARAM(&mut found as *mut Vec<TopLevelWindow> as isize),
        )
    }
    .map_err(|e| DuocastError::unsupported(format!("Window enumeration failed: {e}")))?;
    tracing::debug!(count = found.len(), "Enumerated top-level windows");
    Ok(found)
}

#[cfg(not(windows))]
pub fn enumerate_windows() -> DuocastResult<Vec<TopLevelWindow>> {
    Err(duocast_common::DuocastError::unsupported(
        "Top-level window enumeration needs a Windows desktop",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(title: &str, visible: bool) -> TopLevelWindow {
        TopLevelWindow {
            title: title.to_string(),
            visible,
        }
    }

    #[test]
    fn every_visible_window_is_a_target() {
        let windows = [
            window("notes.txt - Notepad", true),
            window("todo.txt - Notepad", true),
            window("Hidden helper", false),
            window("Program Manager", true),
            window("  ", true),
        ];
        assert_eq!(
            captureable_titles(&windows),
            vec!["notes.txt - Notepad", "todo.txt - Notepad"]
        );
    }

    #[cfg(windows)]
    #[test]
    fn enumeration_runs_on_the_desktop() {
        assert!(enumerate_windows().is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn enumeration_is_unsupported_elsewhere() {
        assert!(enumerate_windows().is_err());
    }
}
