// Full-screen layered window that shows the hint image.
//
// The extended styles are passed to CreateWindowExW, so the window is
// layered, click-through and topmost before it is ever painted:
//   • WS_EX_LAYERED + UpdateLayeredWindow: per-pixel alpha for the letterbox,
//     constant alpha for the configured opacity
//   • WS_EX_TRANSPARENT: hit-testing falls through to the windows below
//   • WS_EX_TOPMOST: above every normal window
//   • WS_EX_TOOLWINDOW + WS_EX_NOACTIVATE: no taskbar/Alt-Tab entry, never
//     steals focus

use super::bitmap;
use super::{Opacity, OverlaySurface};
use image::RgbaImage;
use std::ffi::c_void;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC, SelectObject,
    AC_SRC_ALPHA, AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION,
    DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetSystemMetrics, IsWindow, LoadCursorW,
    RegisterClassW, SetWindowPos, ShowWindow, UpdateLayeredWindow, HWND_TOPMOST, IDC_ARROW,
    MA_NOACTIVATE, SM_CXSCREEN, SM_CYSCREEN, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE,
    SWP_SHOWWINDOW, SW_HIDE, ULW_ALPHA, WINDOW_EX_STYLE, WM_MOUSEACTIVATE, WNDCLASSW, WNDPROC,
    WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT,
    WS_POPUP,
};

const CLASS_NAME: &str = "OverlayImageHintClass\0";
const WINDOW_TITLE: &str = "Overlay Image Hint\0";

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("screen size is unavailable")]
    NoScreen,
    #[error("failed to register the overlay window class")]
    RegisterClass,
    #[error("failed to create the overlay window: {0}")]
    CreateWindow(#[source] windows::core::Error),
    #[error("{0} failed")]
    Gdi(&'static str),
    #[error("failed to render the overlay: {0}")]
    Render(#[source] windows::core::Error),
}

pub fn overlay_ex_style() -> WINDOW_EX_STYLE {
    WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Default handling for messages the application does not care about.
pub unsafe fn base_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE as isize),
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn register_class(wndproc: WNDPROC) -> Result<(), OverlayError> {
    let class_name = wide(CLASS_NAME);
    unsafe {
        let hinstance = GetModuleHandleW(PCWSTR::null()).map_err(|_| OverlayError::RegisterClass)?;
        let wc = WNDCLASSW {
            lpfnWndProc: wndproc,
            hInstance: hinstance.into(),
            lpszClassName: PCWSTR(class_name.as_ptr()),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            ..Default::default()
        };
        if RegisterClassW(&wc) == 0 {
            return Err(OverlayError::RegisterClass);
        }
    }
    Ok(())
}

/// Memory DC holding the composed frame.
struct LayeredFrame {
    mem_dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    width: i32,
    height: i32,
}

impl LayeredFrame {
    fn new(width: i32, height: i32, pixels: &[u8]) -> Result<Self, OverlayError> {
        unsafe {
            let mem_dc = CreateCompatibleDC(None);
            if mem_dc.is_invalid() {
                return Err(OverlayError::Gdi("CreateCompatibleDC"));
            }

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // negative height: top-down rows
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut bits: *mut c_void = std::ptr::null_mut();
            let created = CreateDIBSection(Some(mem_dc), &bmi, DIB_RGB_COLORS, &mut bits, None, 0);
            let bitmap = match created {
                Ok(bitmap) if !bits.is_null() => bitmap,
                Ok(bitmap) => {
                    let _ = DeleteObject(HGDIOBJ::from(bitmap));
                    let _ = DeleteDC(mem_dc);
                    return Err(OverlayError::Gdi("CreateDIBSection"));
                }
                Err(err) => {
                    let _ = DeleteDC(mem_dc);
                    return Err(OverlayError::Render(err));
                }
            };

            let len = (width as usize * height as usize * 4).min(pixels.len());
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), bits as *mut u8, len);

            let previous = SelectObject(mem_dc, HGDIOBJ::from(bitmap));
            Ok(Self {
                mem_dc,
                bitmap,
                previous,
                width,
                height,
            })
        }
    }
}

impl Drop for LayeredFrame {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.mem_dc, self.previous);
            let _ = DeleteObject(HGDIOBJ::from(self.bitmap));
            let _ = DeleteDC(self.mem_dc);
        }
    }
}

/// The overlay window. Created hidden.
pub struct OverlayWindow {
    hwnd: Option<HWND>,
    frame: Option<LayeredFrame>,
}

impl OverlayWindow {
    /// Create the window over the primary screen and upload the fitted image.
    /// `wndproc` receives every message; unhandled ones should go to
    /// [`base_proc`].
    pub fn create(
        opacity: Opacity,
        image: &RgbaImage,
        wndproc: WNDPROC,
    ) -> Result<Self, OverlayError> {
        let (width, height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            return Err(OverlayError::NoScreen);
        }

        register_class(wndproc)?;

        let class_name = wide(CLASS_NAME);
        let title = wide(WINDOW_TITLE);
        let hwnd = unsafe {
            let hinstance = GetModuleHandleW(PCWSTR::null()).unwrap_or_default();
            CreateWindowExW(
                overlay_ex_style(),
                PCWSTR(class_name.as_ptr()),
                PCWSTR(title.as_ptr()),
                WS_POPUP,
                0,
                0,
                width,
                height,
                None,
                None,
                Some(hinstance.into()),
                None,
            )
            .map_err(OverlayError::CreateWindow)?
        };

        // From here on Drop cleans up the window if anything fails.
        let mut window = Self {
            hwnd: Some(hwnd),
            frame: None,
        };

        let pixels = bitmap::compose_frame(image, width as u32, height as u32);
        window.frame = Some(LayeredFrame::new(width, height, &pixels)?);
        window.present(opacity)?;

        tracing::info!(
            width,
            height,
            opacity = opacity.percent(),
            "overlay window created"
        );
        Ok(window)
    }

    /// Null after `dispose`.
    pub fn hwnd(&self) -> HWND {
        self.hwnd.unwrap_or_default()
    }

    /// Push the frame to the window with the given constant alpha.
    fn present(&self, opacity: Opacity) -> Result<(), OverlayError> {
        let (Some(hwnd), Some(frame)) = (self.hwnd, self.frame.as_ref()) else {
            return Ok(());
        };

        let origin = POINT { x: 0, y: 0 };
        let source = POINT { x: 0, y: 0 };
        let size = SIZE {
            cx: frame.width,
            cy: frame.height,
        };
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: opacity.alpha(),
            AlphaFormat: AC_SRC_ALPHA as u8,
        };

        unsafe {
            let screen_dc = GetDC(None);
            let result = UpdateLayeredWindow(
                hwnd,
                Some(screen_dc),
                Some(&origin as *const POINT),
                Some(&size as *const SIZE),
                Some(frame.mem_dc),
                Some(&source as *const POINT),
                COLORREF(0),
                Some(&blend as *const BLENDFUNCTION),
                ULW_ALPHA,
            );
            let _ = ReleaseDC(None, screen_dc);
            result.map_err(OverlayError::Render)
        }
    }

    /// Destroy the window and free the frame. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.frame = None;
        if let Some(hwnd) = self.hwnd.take() {
            unsafe {
                if IsWindow(Some(hwnd)).as_bool() {
                    if let Err(err) = DestroyWindow(hwnd) {
                        tracing::warn!(%err, "failed to destroy overlay window");
                    }
                }
            }
            tracing::info!("overlay window destroyed");
        }
    }
}

impl OverlaySurface for OverlayWindow {
    fn set_visible(&mut self, visible: bool) {
        let Some(hwnd) = self.hwnd else {
            return;
        };
        unsafe {
            if visible {
                // Showing through SetWindowPos also re-asserts the topmost band.
                let _ = SetWindowPos(
                    hwnd,
                    Some(HWND_TOPMOST),
                    0,
                    0,
                    0,
                    0,
                    SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_SHOWWINDOW,
                );
            } else {
                let _ = ShowWindow(hwnd, SW_HIDE);
            }
        }
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        self.dispose();
    }
}
