// Global hotkey listener built on a low-level keyboard hook.
//
// The hook sees every keystroke in the system. A KeyFilter narrows that down
// to the one configured key and turns OS auto-repeat into clean edges, so an
// observer hears exactly one key-down and one key-up per physical press.

#[cfg(windows)]
pub mod win32;

use crate::keys::VirtualKey;
use std::io;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// One raw keystroke as reported by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: VirtualKey,
    pub transition: KeyTransition,
}

impl KeyEvent {
    pub fn down(key: VirtualKey) -> Self {
        Self {
            key,
            transition: KeyTransition::Down,
        }
    }

    pub fn up(key: VirtualKey) -> Self {
        Self {
            key,
            transition: KeyTransition::Up,
        }
    }
}

/// A filtered transition of the configured key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    Pressed(VirtualKey),
    Released(VirtualKey),
}

/// Receives transitions of the configured key. Called from inside the hook
/// callback, so implementations must not block or touch UI.
pub trait HotkeyObserver {
    fn on_key_down(&self, key: VirtualKey);
    fn on_key_up(&self, key: VirtualKey);
}

/// Observer that queues transitions for the UI thread, then calls `wake` so
/// the queue gets drained. `wake` only runs once the event is queued.
pub struct QueuedObserver<W: Fn()> {
    events: Sender<HotkeyEvent>,
    wake: W,
}

impl<W: Fn()> QueuedObserver<W> {
    pub fn new(events: Sender<HotkeyEvent>, wake: W) -> Self {
        Self { events, wake }
    }

    fn push(&self, event: HotkeyEvent) {
        match self.events.send(event) {
            Ok(()) => (self.wake)(),
            Err(_) => debug!(?event, "hotkey queue closed, event dropped"),
        }
    }
}

impl<W: Fn()> HotkeyObserver for QueuedObserver<W> {
    fn on_key_down(&self, key: VirtualKey) {
        self.push(HotkeyEvent::Pressed(key));
    }

    fn on_key_up(&self, key: VirtualKey) {
        self.push(HotkeyEvent::Released(key));
    }
}

/// Edge detector for a single key.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    key: VirtualKey,
    held: bool,
}

impl KeyFilter {
    pub fn new(key: VirtualKey) -> Self {
        Self { key, held: false }
    }

    pub fn apply(&mut self, event: KeyEvent) -> Option<HotkeyEvent> {
        if event.key != self.key {
            return None;
        }
        match (event.transition, self.held) {
            (KeyTransition::Down, false) => {
                self.held = true;
                Some(HotkeyEvent::Pressed(self.key))
            }
            (KeyTransition::Up, true) => {
                self.held = false;
                Some(HotkeyEvent::Released(self.key))
            }
            // auto-repeat, or a release whose press happened before the hook
            _ => None,
        }
    }
}

/// Everything the hook callback needs: the filter and who to tell.
pub struct HookRoute {
    filter: KeyFilter,
    observer: Rc<dyn HotkeyObserver>,
}

impl HookRoute {
    pub fn new(key: VirtualKey, observer: Rc<dyn HotkeyObserver>) -> Self {
        Self {
            filter: KeyFilter::new(key),
            observer,
        }
    }

    pub fn dispatch(&mut self, event: KeyEvent) {
        match self.filter.apply(event) {
            Some(HotkeyEvent::Pressed(key)) => self.observer.on_key_down(key),
            Some(HotkeyEvent::Released(key)) => self.observer.on_key_up(key),
            None => {}
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("the keyboard hook could not be installed: {0}")]
    Install(#[source] io::Error),
    #[error("a keyboard hook is already installed")]
    AlreadyInstalled,
    #[error("the keyboard hook could not be removed: {0}")]
    Uninstall(#[source] io::Error),
}

/// A platform mechanism that can route system keystrokes into a `HookRoute`.
pub trait HookBackend {
    type Hook: InstalledHook;

    fn install(&mut self, route: HookRoute) -> Result<Self::Hook, HotkeyError>;
}

/// Guard for an installed hook. Dropping it removes the hook; `release`
/// does the same but reports failure.
pub trait InstalledHook {
    fn release(self) -> Result<(), HotkeyError>;
}

/// Listens for one key system-wide and notifies an observer.
pub struct HotkeyListener<B: HookBackend> {
    backend: B,
    key: VirtualKey,
    observer: Rc<dyn HotkeyObserver>,
    hook: Option<B::Hook>,
}

impl<B: HookBackend> HotkeyListener<B> {
    pub fn new(backend: B, key: VirtualKey, observer: Rc<dyn HotkeyObserver>) -> Self {
        Self {
            backend,
            key,
            observer,
            hook: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.hook.is_some()
    }

    /// Install the hook. Does nothing if this listener is already installed.
    pub fn start(&mut self) -> Result<(), HotkeyError> {
        if self.hook.is_some() {
            debug!("keyboard hook already installed");
            return Ok(());
        }
        let route = HookRoute::new(self.key, Rc::clone(&self.observer));
        let hook = self.backend.install(route)?;
        self.hook = Some(hook);
        info!(key = %self.key, "keyboard hook installed");
        Ok(())
    }

    /// Remove the hook. Safe to call when not installed.
    pub fn stop(&mut self) -> Result<(), HotkeyError> {
        match self.hook.take() {
            Some(hook) => {
                hook.release()?;
                info!("keyboard hook removed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<B: HookBackend> Drop for HotkeyListener<B> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(%err, "keyboard hook was not removed cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::sync::mpsc;

    const OTHER: VirtualKey = VirtualKey(0x41);

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<HotkeyEvent>>,
    }

    impl HotkeyObserver for Recorder {
        fn on_key_down(&self, key: VirtualKey) {
            self.seen.borrow_mut().push(HotkeyEvent::Pressed(key));
        }

        fn on_key_up(&self, key: VirtualKey) {
            self.seen.borrow_mut().push(HotkeyEvent::Released(key));
        }
    }

    /// Counts live hooks the way the OS would.
    #[derive(Default)]
    struct FakeBackend {
        live: Rc<Cell<usize>>,
        refuse: bool,
        routes: Rc<RefCell<Vec<HookRoute>>>,
    }

    struct FakeHook {
        live: Rc<Cell<usize>>,
        released: bool,
    }

    impl HookBackend for FakeBackend {
        type Hook = FakeHook;

        fn install(&mut self, route: HookRoute) -> Result<FakeHook, HotkeyError> {
            if self.refuse {
                return Err(HotkeyError::Install(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "access denied",
                )));
            }
            if self.live.get() > 0 {
                return Err(HotkeyError::AlreadyInstalled);
            }
            self.live.set(self.live.get() + 1);
            self.routes.borrow_mut().push(route);
            Ok(FakeHook {
                live: Rc::clone(&self.live),
                released: false,
            })
        }
    }

    impl InstalledHook for FakeHook {
        fn release(mut self) -> Result<(), HotkeyError> {
            self.released = true;
            self.live.set(self.live.get() - 1);
            Ok(())
        }
    }

    impl Drop for FakeHook {
        fn drop(&mut self) {
            if !self.released {
                self.live.set(self.live.get() - 1);
            }
        }
    }

    fn route_with_recorder() -> (HookRoute, Rc<Recorder>) {
        let recorder = Rc::new(Recorder::default());
        let route = HookRoute::new(VirtualKey::F8, recorder.clone());
        (route, recorder)
    }

    #[test]
    fn repeat_downs_fire_once() {
        let (mut route, recorder) = route_with_recorder();
        route.dispatch(KeyEvent::down(VirtualKey::F8));
        route.dispatch(KeyEvent::down(VirtualKey::F8));
        route.dispatch(KeyEvent::down(VirtualKey::F8));
        route.dispatch(KeyEvent::up(VirtualKey::F8));

        assert_eq!(
            *recorder.seen.borrow(),
            vec![
                HotkeyEvent::Pressed(VirtualKey::F8),
                HotkeyEvent::Released(VirtualKey::F8)
            ]
        );
    }

    #[test]
    fn other_keys_are_ignored() {
        let (mut route, recorder) = route_with_recorder();
        route.dispatch(KeyEvent::down(OTHER));
        route.dispatch(KeyEvent::up(OTHER));
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn other_keys_do_not_interrupt_a_hold() {
        let (mut route, recorder) = route_with_recorder();
        route.dispatch(KeyEvent::down(VirtualKey::F8));
        route.dispatch(KeyEvent::down(OTHER));
        route.dispatch(KeyEvent::up(OTHER));
        route.dispatch(KeyEvent::up(VirtualKey::F8));
        assert_eq!(recorder.seen.borrow().len(), 2);
    }

    #[test]
    fn stray_release_is_ignored() {
        let mut filter = KeyFilter::new(VirtualKey::F8);
        assert_eq!(filter.apply(KeyEvent::up(VirtualKey::F8)), None);
        assert_eq!(
            filter.apply(KeyEvent::down(VirtualKey::F8)),
            Some(HotkeyEvent::Pressed(VirtualKey::F8))
        );
    }

    #[test]
    fn start_twice_installs_once() {
        let backend = FakeBackend::default();
        let live = Rc::clone(&backend.live);
        let mut listener =
            HotkeyListener::new(backend, VirtualKey::F8, Rc::new(Recorder::default()));

        listener.start().unwrap();
        listener.start().unwrap();
        assert!(listener.is_active());
        assert_eq!(live.get(), 1);
    }

    #[test]
    fn restart_leaves_one_hook() {
        let backend = FakeBackend::default();
        let live = Rc::clone(&backend.live);
        let mut listener =
            HotkeyListener::new(backend, VirtualKey::F8, Rc::new(Recorder::default()));

        listener.start().unwrap();
        listener.stop().unwrap();
        assert_eq!(live.get(), 0);
        listener.start().unwrap();
        assert_eq!(live.get(), 1);
        listener.stop().unwrap();
        listener.stop().unwrap();
        assert_eq!(live.get(), 0);
        assert!(!listener.is_active());
    }

    #[test]
    fn refused_install_is_reported() {
        let backend = FakeBackend {
            refuse: true,
            ..FakeBackend::default()
        };
        let mut listener =
            HotkeyListener::new(backend, VirtualKey::F8, Rc::new(Recorder::default()));

        assert!(matches!(listener.start(), Err(HotkeyError::Install(_))));
        assert!(!listener.is_active());
        listener.stop().unwrap();
    }

    #[test]
    fn drop_removes_the_hook() {
        let backend = FakeBackend::default();
        let live = Rc::clone(&backend.live);
        {
            let mut listener =
                HotkeyListener::new(backend, VirtualKey::F8, Rc::new(Recorder::default()));
            listener.start().unwrap();
            assert_eq!(live.get(), 1);
        }
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn installed_route_reaches_the_observer() {
        let backend = FakeBackend::default();
        let routes = Rc::clone(&backend.routes);
        let recorder = Rc::new(Recorder::default());
        let mut listener = HotkeyListener::new(backend, VirtualKey::F8, recorder.clone());
        listener.start().unwrap();

        let mut routes = routes.borrow_mut();
        routes[0].dispatch(KeyEvent::down(VirtualKey::F8));
        assert_eq!(
            *recorder.seen.borrow(),
            vec![HotkeyEvent::Pressed(VirtualKey::F8)]
        );
    }

    #[test]
    fn queued_events_are_visible_when_woken() {
        let (sender, receiver) = mpsc::channel();
        let receiver = Rc::new(receiver);
        let drained = Rc::new(RefCell::new(Vec::new()));
        let wake = {
            let receiver = Rc::clone(&receiver);
            let drained = Rc::clone(&drained);
            move || drained.borrow_mut().extend(receiver.try_iter())
        };
        let observer = Rc::new(QueuedObserver::new(sender, wake));
        let mut route = HookRoute::new(VirtualKey::F8, observer);

        route.dispatch(KeyEvent::down(VirtualKey::F8));
        assert_eq!(*drained.borrow(), vec![HotkeyEvent::Pressed(VirtualKey::F8)]);
        route.dispatch(KeyEvent::down(VirtualKey::F8));
        route.dispatch(KeyEvent::up(VirtualKey::F8));
        assert_eq!(
            *drained.borrow(),
            vec![
                HotkeyEvent::Pressed(VirtualKey::F8),
                HotkeyEvent::Released(VirtualKey::F8)
            ]
        );
    }

    #[test]
    fn closed_queue_does_not_wake() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);
        let wakes = Rc::new(Cell::new(0));
        let observer = QueuedObserver::new(sender, {
            let wakes = Rc::clone(&wakes);
            move || wakes.set(wakes.get() + 1)
        });
        observer.on_key_down(VirtualKey::F8);
        assert_eq!(wakes.get(), 0);
    }
}
