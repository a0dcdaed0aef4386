// Overlay visibility and the layered window that shows the hint image.
//
// The overlay has two states, Hidden (initial) and Visible. A key-down of the
// configured key moves it to Visible, the matching key-up back to Hidden.
// Redundant requests are absorbed here so the window never sees a second
// ShowWindow for a state it is already in.

pub mod bitmap;
#[cfg(windows)]
pub mod window;

use crate::hotkeys::HotkeyEvent;
use std::sync::mpsc::Receiver;

/// Whole-window opacity in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opacity(u8);

impl Opacity {
    pub fn from_percent(percent: u8) -> Option<Self> {
        (percent <= 100).then_some(Opacity(percent))
    }

    /// Clamp to 100%.
    pub fn saturating(percent: u8) -> Self {
        Opacity(percent.min(100))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Constant alpha for the layered window, rounded to nearest.
    pub fn alpha(self) -> u8 {
        ((u32::from(self.0) * 255 + 50) / 100) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

/// Whatever actually puts pixels on screen.
pub trait OverlaySurface {
    fn set_visible(&mut self, visible: bool);
}

/// Owns the overlay surface and its visibility state.
pub struct OverlayController<S: OverlaySurface> {
    surface: S,
    visibility: Visibility,
}

impl<S: OverlaySurface> OverlayController<S> {
    /// The surface must start hidden.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            visibility: Visibility::Hidden,
        }
    }

    #[cfg(test)]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn show(&mut self) {
        self.transition(Visibility::Visible);
    }

    pub fn hide(&mut self) {
        self.transition(Visibility::Hidden);
    }

    pub fn handle(&mut self, event: HotkeyEvent) {
        match event {
            HotkeyEvent::Pressed(_) => self.show(),
            HotkeyEvent::Released(_) => self.hide(),
        }
    }

    /// Apply every queued hotkey event, oldest first.
    pub fn drain(&mut self, events: &Receiver<HotkeyEvent>) {
        for event in events.try_iter() {
            tracing::debug!(?event, "hotkey");
            self.handle(event);
        }
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn transition(&mut self, target: Visibility) {
        if self.visibility == target {
            return;
        }
        tracing::debug!(from = ?self.visibility, to = ?target, "overlay visibility");
        self.visibility = target;
        self.surface.set_visible(target == Visibility::Visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::VirtualKey;
    use std::sync::mpsc;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<bool>,
    }

    impl OverlaySurface for RecordingSurface {
        fn set_visible(&mut self, visible: bool) {
            self.calls.push(visible);
        }
    }

    #[test]
    fn alpha_matches_percent() {
        for percent in 0..=100u8 {
            let opacity = Opacity::from_percent(percent).unwrap();
            assert_eq!(opacity.percent(), percent);
            let expected = (f64::from(percent) * 255.0 / 100.0).round() as u8;
            assert_eq!(opacity.alpha(), expected, "percent {percent}");
        }
        assert_eq!(Opacity::from_percent(0).unwrap().alpha(), 0);
        assert_eq!(Opacity::from_percent(100).unwrap().alpha(), 255);
        assert_eq!(Opacity::from_percent(101), None);
        assert_eq!(Opacity::saturating(200).percent(), 100);
    }

    #[test]
    fn starts_hidden() {
        let controller = OverlayController::new(RecordingSurface::default());
        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert!(controller.surface().calls.is_empty());
    }

    #[test]
    fn show_is_idempotent() {
        let mut controller = OverlayController::new(RecordingSurface::default());
        controller.show();
        controller.show();
        assert_eq!(controller.visibility(), Visibility::Visible);
        assert_eq!(controller.surface().calls, vec![true]);
    }

    #[test]
    fn hide_while_hidden_does_nothing() {
        let mut controller = OverlayController::new(RecordingSurface::default());
        controller.hide();
        assert!(controller.into_surface().calls.is_empty());
    }

    #[test]
    fn repeated_press_does_not_flicker() {
        let key = VirtualKey::F8;
        let mut controller = OverlayController::new(RecordingSurface::default());

        controller.handle(HotkeyEvent::Pressed(key));
        assert_eq!(controller.visibility(), Visibility::Visible);
        controller.handle(HotkeyEvent::Pressed(key));
        assert_eq!(controller.visibility(), Visibility::Visible);
        controller.handle(HotkeyEvent::Released(key));
        assert_eq!(controller.visibility(), Visibility::Hidden);

        assert_eq!(controller.surface().calls, vec![true, false]);
    }

    #[test]
    fn drain_applies_events_in_order() {
        let key = VirtualKey::F8;
        let (sender, receiver) = mpsc::channel();
        let mut controller = OverlayController::new(RecordingSurface::default());

        for event in [
            HotkeyEvent::Pressed(key),
            HotkeyEvent::Released(key),
            HotkeyEvent::Pressed(key),
        ] {
            sender.send(event).unwrap();
        }
        controller.drain(&receiver);
        assert_eq!(controller.visibility(), Visibility::Visible);
        assert_eq!(controller.surface().calls, vec![true, false, true]);

        controller.drain(&receiver);
        assert_eq!(controller.surface().calls.len(), 3);
    }
}
