//! DVD adapter coordinating the device cache and navigation forwarding
//!
//! The host owns one [`DvdManager`] per player and calls into it on every
//! URI open, video sink change and user input event. The playbin is passed
//! by reference to each call; the manager itself only owns the cached
//! device, the current navigation capability and the "in menu" flag.

use super::device::DeviceCache;
use super::playbin::{DeviceSource, Navigation, Playbin};
use crate::config::DvdSettings;
use common::{MouseEvent, NavigationCommand, UriDecision};

/// Per-player DVD state
pub struct DvdManager<P: Playbin> {
    device: DeviceCache,

    /// Navigation interface of the current video sink
    navigation: Option<P::Navigation>,

    /// Whether the disc is showing a menu
    is_menu: bool,

    /// Seek in place instead of reopening the spinning disc
    fast_seek: bool,
}

impl<P: Playbin> DvdManager<P> {
    pub fn new(settings: &DvdSettings) -> Self {
        Self {
            device: DeviceCache::new(),
            navigation: None,
            is_menu: false,
            fast_seek: settings.fast_seek,
        }
    }

    /// Hook the adapter into a freshly built playbin
    pub fn pipeline_setup(&self, playbin: &P) {
        let device = self.device.clone();
        playbin.connect_source_changed(Box::new(move |source: &dyn DeviceSource| {
            device.apply_to_source(source);
        }));
    }

    /// Process a URI about to be opened on `playbin`
    ///
    /// Returns `true` when the adapter dealt with the URI itself and the
    /// pipeline must not reopen the device.
    pub fn handle_uri(&self, playbin: &P, uri: &str) -> bool {
        match self.device.handle_uri(uri) {
            UriDecision::FastSeek {
                chapter: Some(chapter),
                ..
            } if self.fast_seek => self.seek_in_place(playbin, chapter),
            _ => false,
        }
    }

    /// Currently cached device node
    pub fn device(&self) -> Option<String> {
        self.device.device()
    }

    /// Re-resolve the navigation interface after a video sink change
    pub fn find_navigation(&mut self, playbin: &P) {
        // Replacing drops the previous reference
        self.navigation = playbin.find_navigation();
        log::debug!(
            "dvd: navigation {}",
            if self.navigation.is_some() {
                "available"
            } else {
                "unavailable"
            }
        );
    }

    pub fn has_navigation(&self) -> bool {
        self.navigation.is_some()
    }

    /// Refresh the "in menu" flag from the commands the sink accepts
    pub fn handle_commands_changed(&mut self, playbin: &P) {
        self.is_menu = false;

        if self.navigation.is_none() {
            self.find_navigation(playbin);
        }

        let Some(commands) = self.navigation.as_ref().and_then(|n| n.commands()) else {
            return;
        };

        self.is_menu = commands.iter().any(|c| c.is_menu_command());
        log::debug!("dvd: commands changed, in menu: {}", self.is_menu);
    }

    pub fn is_menu(&self) -> bool {
        self.is_menu
    }

    pub fn mouse_move(&self, x: f64, y: f64) {
        self.send_mouse_event(MouseEvent::Move { x, y });
    }

    pub fn mouse_button_pressed(&self, button: i32, x: f64, y: f64) {
        self.send_mouse_event(MouseEvent::ButtonPress { button, x, y });
    }

    pub fn mouse_button_released(&self, button: i32, x: f64, y: f64) {
        self.send_mouse_event(MouseEvent::ButtonRelease { button, x, y });
    }

    pub fn left(&self) {
        self.send_command(NavigationCommand::Left);
    }

    pub fn right(&self) {
        self.send_command(NavigationCommand::Right);
    }

    pub fn up(&self) {
        self.send_command(NavigationCommand::Up);
    }

    pub fn down(&self) {
        self.send_command(NavigationCommand::Down);
    }

    pub fn activate(&self) {
        self.send_command(NavigationCommand::Activate);
    }

    pub fn go_to_menu(&self) {
        self.send_command(NavigationCommand::DvdMenu);
    }

    /// Forward any command, used by hosts that map keys to commands
    pub fn send_command(&self, command: NavigationCommand) {
        match self.navigation.as_ref() {
            Some(navigation) => {
                log::trace!("dvd: forwarding {:?}", command);
                navigation.send_command(command);
            }
            None => log::trace!("dvd: no navigation available, dropping {:?}", command),
        }
    }

    /// Seek to the chapter after the current one
    ///
    /// Out-of-range chapters are left for the pipeline to reject.
    pub fn go_to_next_chapter(&self, playbin: &P) -> bool {
        self.step_chapter(playbin, 1)
    }

    pub fn go_to_previous_chapter(&self, playbin: &P) -> bool {
        self.step_chapter(playbin, -1)
    }

    fn step_chapter(&self, playbin: &P, delta: i64) -> bool {
        let Some(current) = playbin.query_chapter() else {
            log::debug!("dvd: chapter position unavailable");
            return false;
        };

        log::debug!("dvd: seeking from chapter {} to {}", current, current + delta);
        playbin.seek_chapter(current + delta)
    }

    fn seek_in_place(&self, playbin: &P, chapter: u32) -> bool {
        // Without a prerolled pipeline there is no spinning disc to seek on;
        // let the pipeline open the device at the requested chapter instead
        if !playbin.is_prerolled() {
            return false;
        }

        if playbin.seek_chapter(i64::from(chapter)) {
            log::debug!("dvd: seeking to chapter {}, avoiding a reopen", chapter);
            true
        } else {
            false
        }
    }

    fn send_mouse_event(&self, event: MouseEvent) {
        if let Some(navigation) = self.navigation.as_ref() {
            log::trace!("dvd: forwarding {:?}", event);
            navigation.send_mouse_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvd::playbin::SourceChangedHandler;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct StubPlaybin {
        prerolled: bool,
        chapter: Option<i64>,
        seeks: RefCell<Vec<i64>>,
        handlers: RefCell<Vec<SourceChangedHandler>>,
        lookups: Cell<u32>,
    }

    struct NullNavigation;

    impl Navigation for NullNavigation {
        fn send_mouse_event(&self, _event: MouseEvent) {}
        fn send_command(&self, _command: NavigationCommand) {}
        fn commands(&self) -> Option<Vec<NavigationCommand>> {
            None
        }
    }

    impl Playbin for StubPlaybin {
        type Navigation = NullNavigation;

        fn connect_source_changed(&self, handler: SourceChangedHandler) {
            self.handlers.borrow_mut().push(handler);
        }

        fn find_navigation(&self) -> Option<NullNavigation> {
            self.lookups.set(self.lookups.get() + 1);
            None
        }

        fn query_chapter(&self) -> Option<i64> {
            self.chapter
        }

        fn seek_chapter(&self, chapter: i64) -> bool {
            self.seeks.borrow_mut().push(chapter);
            true
        }

        fn is_prerolled(&self) -> bool {
            self.prerolled
        }
    }

    struct RecordingSource(Rc<RefCell<Option<String>>>);

    impl DeviceSource for RecordingSource {
        fn has_device_property(&self) -> bool {
            true
        }

        fn set_device(&self, device: &str) {
            *self.0.borrow_mut() = Some(device.to_string());
        }
    }

    #[test]
    fn test_fast_seek_disabled_by_default() {
        let playbin = StubPlaybin {
            prerolled: true,
            ..Default::default()
        };
        let manager = DvdManager::new(&DvdSettings::default());

        assert!(!manager.handle_uri(&playbin, "dvd:///dev/sr0"));
        assert!(!manager.handle_uri(&playbin, "dvd:///dev/sr0#2"));
        assert_eq!(manager.device().as_deref(), Some("/dev/sr0"));
        assert!(playbin.seeks.borrow().is_empty());
    }

    #[test]
    fn test_fast_seek_enabled() {
        let playbin = StubPlaybin {
            prerolled: true,
            ..Default::default()
        };
        let manager = DvdManager::new(&DvdSettings { fast_seek: true });

        assert!(!manager.handle_uri(&playbin, "dvd:///dev/sr0"));
        assert!(manager.handle_uri(&playbin, "dvd:///dev/sr0#3"));
        assert_eq!(*playbin.seeks.borrow(), vec![3]);

        // No chapter token: nothing to seek to
        assert!(!manager.handle_uri(&playbin, "dvd:///dev/sr0"));
        assert_eq!(playbin.seeks.borrow().len(), 1);
    }

    #[test]
    fn test_fast_seek_needs_preroll() {
        let playbin = StubPlaybin::default();
        let manager = DvdManager::new(&DvdSettings { fast_seek: true });

        manager.handle_uri(&playbin, "dvd:///dev/sr0");
        assert!(!manager.handle_uri(&playbin, "dvd:///dev/sr0#3"));
        assert!(playbin.seeks.borrow().is_empty());
    }

    #[test]
    fn test_pipeline_setup_pushes_cached_device() {
        let playbin = StubPlaybin::default();
        let manager = DvdManager::new(&DvdSettings::default());
        manager.pipeline_setup(&playbin);
        assert_eq!(playbin.handlers.borrow().len(), 1);

        let seen = Rc::new(RefCell::new(None));
        let source = RecordingSource(Rc::clone(&seen));

        // Before any DVD URI the source is left alone
        (playbin.handlers.borrow()[0])(&source as &dyn DeviceSource);
        assert!(seen.borrow().is_none());

        manager.handle_uri(&playbin, "dvd:///dev/sr1#4");
        (playbin.handlers.borrow()[0])(&source as &dyn DeviceSource);
        assert_eq!(seen.borrow().as_deref(), Some("/dev/sr1"));
    }

    #[test]
    fn test_chapter_stepping() {
        let playbin = StubPlaybin {
            chapter: Some(5),
            ..Default::default()
        };
        let manager = DvdManager::new(&DvdSettings::default());

        assert!(manager.go_to_next_chapter(&playbin));
        assert!(manager.go_to_previous_chapter(&playbin));
        assert_eq!(*playbin.seeks.borrow(), vec![6, 4]);
    }

    #[test]
    fn test_chapter_stepping_without_position() {
        let playbin = StubPlaybin::default();
        let manager = DvdManager::new(&DvdSettings::default());

        assert!(!manager.go_to_next_chapter(&playbin));
        assert!(playbin.seeks.borrow().is_empty());
    }

    #[test]
    fn test_commands_changed_without_navigation() {
        let playbin = StubPlaybin::default();
        let mut manager = DvdManager::new(&DvdSettings::default());

        manager.handle_commands_changed(&playbin);
        assert!(!manager.is_menu());
        // Tried to resolve a navigation interface first
        assert_eq!(playbin.lookups.get(), 1);
    }
}
