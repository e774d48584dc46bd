//! DVD playback on a GStreamer `playbin`
//!
//! [`GstPlaybin`] implements the [`Playbin`] seam of the DVD adapter. New
//! source elements are reported through `notify::source` and chapters are
//! addressed in the `chapter` format. Bus messages are reduced to the few
//! [`PlaybinEvent`]s a host reacts to.

use crate::dvd::{DeviceSource, Navigation, Playbin, SourceChangedHandler};
use crate::log_and_continue;
use anyhow::{Context, Result};
use common::{MouseEvent, NavigationCommand};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use std::time::Duration;

const CHAPTER_FORMAT: &str = "chapter";

/// Bus messages a DVD host reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybinEvent {
    /// Playbin reached PLAYING, the video sink is in place
    Playing,
    /// The navigation commands offered by the sink changed
    CommandsChanged,
    Eos,
    Error(String),
}

/// `playbin` element used for DVD playback
pub struct GstPlaybin {
    playbin: gst::Element,
}

impl GstPlaybin {
    pub fn new() -> Result<Self> {
        super::initialize_gstreamer()?;

        let playbin = gst::ElementFactory::make("playbin")
            .name("player")
            .build()
            .context("Failed to create playbin")?;

        // An explicit sink lets us look up its navigation interface later
        match gst::ElementFactory::make("autovideosink").build() {
            Ok(sink) => playbin.set_property("video-sink", &sink),
            Err(e) => log::warn!("autovideosink unavailable, using playbin default: {}", e),
        }

        Ok(Self { playbin })
    }

    pub fn set_uri(&self, uri: &str) {
        self.playbin.set_property("uri", uri);
    }

    pub fn play(&self) -> Result<()> {
        self.playbin
            .set_state(gst::State::Playing)
            .context("Failed to start playback")?;
        Ok(())
    }

    pub fn stop(&self) {
        log_and_continue!(
            self.playbin.set_state(gst::State::Null),
            "set playbin state to Null"
        );
    }

    /// Wait up to `timeout` for the next bus message the host cares about
    pub fn next_event(&self, timeout: Duration) -> Option<PlaybinEvent> {
        let bus = self.playbin.bus()?;
        let timeout = gst::ClockTime::from_mseconds(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        let message = bus.timed_pop(timeout)?;

        match message.view() {
            gst::MessageView::Eos(_) => Some(PlaybinEvent::Eos),
            gst::MessageView::Error(err) => Some(PlaybinEvent::Error(format!(
                "{} (debug: {:?})",
                err.error(),
                err.debug()
            ))),
            gst::MessageView::StateChanged(change)
                if change.current() == gst::State::Playing
                    && change.src() == Some(self.playbin.upcast_ref::<gst::Object>()) =>
            {
                Some(PlaybinEvent::Playing)
            }
            gst::MessageView::Element(_) if is_commands_changed(&message) => {
                Some(PlaybinEvent::CommandsChanged)
            }
            _ => None,
        }
    }

    fn chapter_format() -> Option<gst::Format> {
        let format = gst::Format::by_nick(CHAPTER_FORMAT);
        (format != gst::Format::Undefined).then_some(format)
    }
}

impl Drop for GstPlaybin {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Source element wrapper handed to the device cache
struct GstSource(gst::Element);

impl DeviceSource for GstSource {
    fn has_device_property(&self) -> bool {
        self.0.find_property("device").is_some()
    }

    fn set_device(&self, device: &str) {
        self.0.set_property("device", device);
    }
}

impl Playbin for GstPlaybin {
    type Navigation = GstNavigation;

    fn connect_source_changed(&self, handler: SourceChangedHandler) {
        self.playbin
            .connect_notify(Some("source"), move |playbin, _pspec| {
                let Some(source) = playbin.property::<Option<gst::Element>>("source") else {
                    return;
                };
                log::trace!("Source changed to {}", source.name());
                handler(&GstSource(source));
            });
    }

    fn find_navigation(&self) -> Option<GstNavigation> {
        let sink = self.playbin.property::<Option<gst::Element>>("video-sink")?;

        let element = match sink.downcast_ref::<gst::Bin>() {
            Some(bin) => bin.by_interface(gst_video::Navigation::static_type())?,
            None => sink,
        };

        let navigation = element.dynamic_cast_ref::<gst_video::Navigation>()?.clone();
        Some(GstNavigation {
            element,
            navigation,
        })
    }

    fn query_chapter(&self) -> Option<i64> {
        let format = Self::chapter_format()?;
        let position = self.playbin.query_position_generic(format)?;
        let chapter = position.value();
        (chapter >= 0).then_some(chapter)
    }

    fn seek_chapter(&self, chapter: i64) -> bool {
        let Some(format) = Self::chapter_format() else {
            log::debug!("Pipeline has no chapter format");
            return false;
        };

        match self.playbin.seek(
            1.0,
            gst::SeekFlags::FLUSH,
            gst::SeekType::Set,
            gst::GenericFormattedValue::new(format, chapter),
            gst::SeekType::None,
            gst::GenericFormattedValue::new(format, -1),
        ) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Chapter seek to {} rejected: {}", chapter, e);
                false
            }
        }
    }

    fn is_prerolled(&self) -> bool {
        let (_, current, _) = self.playbin.state(Some(gst::ClockTime::ZERO));
        matches!(current, gst::State::Paused | gst::State::Playing)
    }
}

/// Navigation interface of the current video sink
pub struct GstNavigation {
    element: gst::Element,
    navigation: gst_video::Navigation,
}

impl Navigation for GstNavigation {
    fn send_mouse_event(&self, event: MouseEvent) {
        let (x, y) = event.position();
        self.navigation
            .send_mouse_event(event.name(), event.button(), x, y);
    }

    fn send_command(&self, command: NavigationCommand) {
        match to_gst_command(command) {
            Some(command) => self.navigation.send_command(command),
            None => log::debug!("No navigation command for {:?}", command),
        }
    }

    fn commands(&self) -> Option<Vec<NavigationCommand>> {
        let structure = gst::Structure::builder("GstNavigationQuery")
            .field("type", "commands")
            .build();
        let mut query = gst::query::Custom::new(structure);

        if !self.element.query(&mut query) {
            log::trace!("Navigation commands query failed");
            return None;
        }

        let commands = query.structure()?.get::<gst::List>("commands").ok()?;
        Some(
            commands
                .iter()
                .filter_map(|value| value.get::<gst_video::NavigationCommand>().ok())
                .map(from_gst_command)
                .collect(),
        )
    }
}

fn to_gst_command(command: NavigationCommand) -> Option<gst_video::NavigationCommand> {
    Some(match command {
        NavigationCommand::Left => gst_video::NavigationCommand::Left,
        NavigationCommand::Right => gst_video::NavigationCommand::Right,
        NavigationCommand::Up => gst_video::NavigationCommand::Up,
        NavigationCommand::Down => gst_video::NavigationCommand::Down,
        NavigationCommand::Activate => gst_video::NavigationCommand::Activate,
        NavigationCommand::DvdMenu => gst_video::NavigationCommand::Menu1,
        NavigationCommand::Other => return None,
    })
}

fn from_gst_command(command: gst_video::NavigationCommand) -> NavigationCommand {
    match command {
        gst_video::NavigationCommand::Left => NavigationCommand::Left,
        gst_video::NavigationCommand::Right => NavigationCommand::Right,
        gst_video::NavigationCommand::Up => NavigationCommand::Up,
        gst_video::NavigationCommand::Down => NavigationCommand::Down,
        gst_video::NavigationCommand::Activate => NavigationCommand::Activate,
        gst_video::NavigationCommand::Menu1 => NavigationCommand::DvdMenu,
        _ => NavigationCommand::Other,
    }
}

/// Whether `message` announces a change of the accepted navigation commands
fn is_commands_changed(message: &gst::MessageRef) -> bool {
    message.structure().is_some_and(|s| {
        s.has_name("GstNavigationMessage") && s.get::<&str>("type").ok() == Some("commands-changed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mapping() {
        for command in [
            NavigationCommand::Left,
            NavigationCommand::Right,
            NavigationCommand::Up,
            NavigationCommand::Down,
            NavigationCommand::Activate,
            NavigationCommand::DvdMenu,
        ] {
            let gst_command = to_gst_command(command).unwrap();
            assert_eq!(from_gst_command(gst_command), command);
        }
        assert!(to_gst_command(NavigationCommand::Other).is_none());
        assert_eq!(
            from_gst_command(gst_video::NavigationCommand::Menu2),
            NavigationCommand::Other
        );
    }
}
