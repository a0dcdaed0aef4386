// User-facing message boxes and the shell "open" verb

use windows::core::PCWSTR;
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxW, MB_ICONERROR, MB_ICONWARNING, MB_OK, MB_SETFOREGROUND, MESSAGEBOX_STYLE,
    SW_SHOWNORMAL,
};

const TITLE: &str = "Overlay Image Hint";

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn message_box(text: &str, style: MESSAGEBOX_STYLE) {
    let text = wide(text);
    let title = wide(TITLE);
    unsafe {
        MessageBoxW(
            None,
            PCWSTR(text.as_ptr()),
            PCWSTR(title.as_ptr()),
            style | MB_OK | MB_SETFOREGROUND,
        );
    }
}

/// Blocking error dialog.
pub fn error(text: &str) {
    message_box(text, MB_ICONERROR);
}

/// Blocking warning dialog.
pub fn warning(text: &str) {
    message_box(text, MB_ICONWARNING);
}

/// Open a URL in the default browser
pub fn open_url(url: &str) {
    let url_wide = wide(url);
    let verb = wide("open");
    let result = unsafe {
        ShellExecuteW(
            None,
            PCWSTR(verb.as_ptr()),
            PCWSTR(url_wide.as_ptr()),
            None,
            None,
            SW_SHOWNORMAL,
        )
    };
    // ShellExecute reports failure as a value <= 32
    if result.0 as isize <= 32 {
        tracing::warn!(url, code = result.0 as isize, "could not open url");
    }
}
