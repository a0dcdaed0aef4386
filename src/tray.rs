// System tray icon with context menu

use std::path::Path;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HANDLE, HWND, POINT};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, DestroyIcon, DestroyMenu, GetCursorPos, LoadIconW, LoadImageW,
    PostMessageW, SetForegroundWindow, TrackPopupMenu, HICON, IDI_APPLICATION, IMAGE_ICON,
    LR_LOADFROMFILE, MF_SEPARATOR, MF_STRING, TPM_LEFTALIGN, TPM_RIGHTBUTTON, WM_APP, WM_NULL,
};

/// Custom message ID for tray icon callbacks
pub const WM_TRAY_ICON: u32 = WM_APP + 1;

/// Menu item IDs
pub const IDM_CLOSE: u32 = 1002;
pub const IDM_OPEN_HOMEPAGE: u32 = 1003;

pub const HOMEPAGE_URL: &str = "https://github.com/nntdgrss/OverlayImageHint";

const ICON_FILE: &str = "icon.ico";
const TOOLTIP: &str = "Overlay Image Hint";

fn wide_str(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// The tray icon. Removed from the notification area on drop.
pub struct TrayIcon {
    hwnd: HWND,
    icon: HICON,
    /// `icon.ico` was loaded from disk and must be destroyed by us
    owns_icon: bool,
    added: bool,
}

impl TrayIcon {
    /// Add the tray icon, using `icon.ico` from the working directory when
    /// present.
    pub fn add(hwnd: HWND) -> Self {
        let (icon, owns_icon) = match load_icon_file(Path::new(ICON_FILE)) {
            Some(icon) => (icon, true),
            None => (
                unsafe { LoadIconW(None, IDI_APPLICATION) }.unwrap_or_default(),
                false,
            ),
        };

        let mut nid = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: hwnd,
            uID: 1,
            uFlags: NIF_ICON | NIF_MESSAGE | NIF_TIP,
            uCallbackMessage: WM_TRAY_ICON,
            hIcon: icon,
            ..Default::default()
        };

        let tip = wide_str(TOOLTIP);
        let len = tip.len().min(nid.szTip.len());
        nid.szTip[..len].copy_from_slice(&tip[..len]);

        let added = unsafe { Shell_NotifyIconW(NIM_ADD, &nid) }.as_bool();
        if added {
            tracing::info!("tray icon added");
        } else {
            tracing::warn!("failed to add tray icon");
        }

        Self {
            hwnd,
            icon,
            owns_icon,
            added,
        }
    }

    /// Remove the tray icon. Safe to call more than once.
    pub fn remove(&mut self) {
        if self.added {
            let nid = NOTIFYICONDATAW {
                cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
                hWnd: self.hwnd,
                uID: 1,
                ..Default::default()
            };
            unsafe {
                let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
            }
            self.added = false;
        }
        if self.owns_icon {
            unsafe {
                let _ = DestroyIcon(self.icon);
            }
            self.owns_icon = false;
        }
    }
}

impl Drop for TrayIcon {
    fn drop(&mut self) {
        self.remove();
    }
}

fn load_icon_file(path: &Path) -> Option<HICON> {
    if !path.is_file() {
        return None;
    }
    let path_wide = wide_str(&path.to_string_lossy());
    let handle = unsafe {
        LoadImageW(
            None,
            PCWSTR(path_wide.as_ptr()),
            IMAGE_ICON,
            16,
            16,
            LR_LOADFROMFILE,
        )
    };
    match handle {
        Ok(HANDLE(ptr)) if !ptr.is_null() => Some(HICON(ptr)),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "could not load tray icon");
            None
        }
    }
}

/// Show the tray context menu
pub fn show_context_menu(hwnd: HWND) {
    unsafe {
        let menu = match CreatePopupMenu() {
            Ok(menu) => menu,
            Err(err) => {
                tracing::warn!(%err, "could not create tray menu");
                return;
            }
        };
        let open_text = wide_str("Open GitHub");
        let close_text = wide_str("Close");

        let _ = AppendMenuW(
            menu,
            MF_STRING,
            IDM_OPEN_HOMEPAGE as usize,
            PCWSTR(open_text.as_ptr()),
        );
        let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
        let _ = AppendMenuW(
            menu,
            MF_STRING,
            IDM_CLOSE as usize,
            PCWSTR(close_text.as_ptr()),
        );

        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);

        // Required for TrackPopupMenu to work correctly with tray icons
        let _ = SetForegroundWindow(hwnd);

        let _ = TrackPopupMenu(
            menu,
            TPM_LEFTALIGN | TPM_RIGHTBUTTON,
            pt.x,
            pt.y,
            Some(0),
            hwnd,
            None,
        );

        // Lets the menu close when focus moves elsewhere
        let _ = PostMessageW(Some(hwnd), WM_NULL, Default::default(), Default::default());

        let _ = DestroyMenu(menu);
    }
}
