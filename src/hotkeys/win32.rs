// WH_KEYBOARD_LL backend for the hotkey listener.
//
// Low-level hooks are called on the thread that installed them, inside its
// message loop, so the route lives in a thread-local slot. Only one route may
// occupy the slot at a time.

use super::{HookBackend, HookRoute, HotkeyError, InstalledHook, KeyEvent};
use crate::keys::VirtualKey;
use std::cell::RefCell;
use tracing::warn;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

thread_local! {
    static ROUTE: RefCell<Option<HookRoute>> = const { RefCell::new(None) };
}

/// Translate a hook message into a `KeyEvent`.
fn key_event(message: u32, info: &KBDLLHOOKSTRUCT) -> Option<KeyEvent> {
    let key = VirtualKey(info.vkCode);
    match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyEvent::down(key)),
        WM_KEYUP | WM_SYSKEYUP => Some(KeyEvent::up(key)),
        _ => None,
    }
}

/// Hook callback. Must return quickly: it only runs the filter and hands
/// matches to the observer, then always passes the event on.
unsafe extern "system" fn keyboard_hook_proc(
    code: i32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if code == HC_ACTION as i32 {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        if let Some(event) = key_event(wparam.0 as u32, info) {
            ROUTE.with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    if let Some(route) = slot.as_mut() {
                        route.dispatch(event);
                    }
                }
            });
        }
    }

    CallNextHookEx(None, code, wparam, lparam)
}

/// Installs the system-wide low-level keyboard hook on the calling thread.
/// That thread must run a message loop.
#[derive(Debug, Default)]
pub struct LowLevelKeyboard;

impl HookBackend for LowLevelKeyboard {
    type Hook = KeyboardHook;

    fn install(&mut self, route: HookRoute) -> Result<KeyboardHook, HotkeyError> {
        let occupied = ROUTE.with(|slot| slot.borrow().is_some());
        if occupied {
            return Err(HotkeyError::AlreadyInstalled);
        }
        ROUTE.with(|slot| *slot.borrow_mut() = Some(route));

        let installed = unsafe {
            GetModuleHandleW(PCWSTR::null()).and_then(|module| {
                SetWindowsHookExW(
                    WH_KEYBOARD_LL,
                    Some(keyboard_hook_proc),
                    Some(module.into()),
                    0,
                )
            })
        };

        match installed {
            Ok(handle) => Ok(KeyboardHook {
                handle: Some(handle),
            }),
            Err(err) => {
                ROUTE.with(|slot| slot.borrow_mut().take());
                Err(HotkeyError::Install(err.into()))
            }
        }
    }
}

/// The installed hook. Unhooks on drop.
#[derive(Debug)]
pub struct KeyboardHook {
    handle: Option<HHOOK>,
}

impl KeyboardHook {
    fn unhook(&mut self) -> Result<(), HotkeyError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let result = unsafe { UnhookWindowsHookEx(handle) };
        ROUTE.with(|slot| slot.borrow_mut().take());
        result.map_err(|err| HotkeyError::Uninstall(err.into()))
    }
}

impl InstalledHook for KeyboardHook {
    fn release(mut self) -> Result<(), HotkeyError> {
        self.unhook()
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        if let Err(err) = self.unhook() {
            warn!(%err, "failed to remove keyboard hook");
        }
    }
}
