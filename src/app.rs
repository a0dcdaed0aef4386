// Startup, message loop and ordered shutdown.
//
// Everything runs on the main thread: the window, the tray and the keyboard
// hook. The hook callback never touches the window itself. It queues a
// HotkeyEvent and posts WM_OVERLAY_HOTKEY, and the window procedure drains
// the queue into the overlay controller.

use crate::config;
use crate::dialog;
use crate::error::AppError;
use crate::hotkeys::win32::LowLevelKeyboard;
use crate::hotkeys::{HotkeyEvent, HotkeyListener, QueuedObserver};
use crate::overlay::bitmap;
use crate::overlay::window::{self, OverlayWindow};
use crate::overlay::OverlayController;
use crate::tray::{self, TrayIcon};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};
use tracing::{info, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PostMessageW, PostQuitMessage, TranslateMessage, MSG, WM_APP,
    WM_CLOSE, WM_COMMAND, WM_RBUTTONUP,
};

/// Posted to the overlay window when hotkey events are waiting.
const WM_OVERLAY_HOTKEY: u32 = WM_APP + 2;

struct App {
    controller: OverlayController<OverlayWindow>,
    events: Receiver<HotkeyEvent>,
}

impl App {
    fn drain_hotkeys(&mut self) {
        self.controller.drain(&self.events);
    }
}

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

unsafe extern "system" fn app_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_OVERLAY_HOTKEY => {
            APP.with(|slot| {
                // Busy only when re-entered; the queue is drained next time.
                if let Ok(mut app) = slot.try_borrow_mut() {
                    if let Some(app) = app.as_mut() {
                        app.drain_hotkeys();
                    }
                }
            });
            LRESULT(0)
        }

        tray::WM_TRAY_ICON => {
            let event = (lparam.0 & 0xFFFF) as u32;
            if event == WM_RBUTTONUP {
                tray::show_context_menu(hwnd);
            }
            LRESULT(0)
        }

        WM_COMMAND => {
            match (wparam.0 & 0xFFFF) as u32 {
                tray::IDM_OPEN_HOMEPAGE => dialog::open_url(tray::HOMEPAGE_URL),
                tray::IDM_CLOSE => {
                    info!("close requested from tray");
                    PostQuitMessage(0);
                }
                _ => {}
            }
            LRESULT(0)
        }

        // Teardown is done by `run` after the loop, in order.
        WM_CLOSE => {
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => window::base_proc(hwnd, msg, wparam, lparam),
    }
}

fn warn_user(context: &str, err: &dyn std::error::Error) {
    warn!(%err, "{context}");
    dialog::warning(&format!("{context}:\n{err}"));
}

/// Run the overlay until the user closes it from the tray.
pub fn run() -> Result<(), AppError> {
    let loaded = config::load_or_init(&config::settings_path());
    for err in &loaded.warnings {
        if err.is_save() {
            warn_user("Default settings could not be saved", err);
        } else {
            warn_user("Settings could not be loaded, defaults will be used", err);
        }
    }
    let settings = loaded.settings;

    let image = bitmap::load_image(&settings.image_path())?;
    let window = OverlayWindow::create(settings.opacity(), &image, Some(app_wndproc))?;
    drop(image);
    let hwnd = window.hwnd();

    let (sender, receiver) = mpsc::channel();
    APP.with(|slot| {
        *slot.borrow_mut() = Some(App {
            controller: OverlayController::new(window),
            events: receiver,
        })
    });

    let mut tray_icon = TrayIcon::add(hwnd);

    // Wakes the window procedure, which drains the queue on the UI thread.
    let notifier = Rc::new(QueuedObserver::new(sender, move || unsafe {
        let _ = PostMessageW(Some(hwnd), WM_OVERLAY_HOTKEY, WPARAM(0), LPARAM(0));
    }));
    let mut listener = HotkeyListener::new(LowLevelKeyboard, settings.key_for_show, notifier);
    if let Err(err) = listener.start() {
        warn_user(
            "The keyboard hook could not be installed, the overlay cannot be triggered",
            &err,
        );
    }

    info!(
        key = %settings.key_for_show,
        hook = listener.is_active(),
        "running"
    );
    message_loop();

    // Reverse of init: hook, tray, window.
    if let Err(err) = listener.stop() {
        warn!(%err, "keyboard hook leaked until process exit");
    }
    tray_icon.remove();
    if let Some(app) = APP.with(|slot| slot.borrow_mut().take()) {
        let mut window = app.controller.into_surface();
        window.dispose();
    }

    info!("shut down");
    Ok(())
}

fn message_loop() {
    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
