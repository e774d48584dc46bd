use anyhow::Result;
use clap::{Parser, Subcommand};
use common::{NavigationCommand, TrackHints, UriDecision};
use player::Config;
use player::dvd::DeviceCache;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bpctl")]
#[command(about = "DVD navigation and audio fingerprint control", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/bpctl/config.toml)
    #[arg(short, long, global = true, env = "BPCTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// DVD playback commands
    Dvd {
        #[command(subcommand)]
        action: DvdCommands,
    },

    /// Fingerprint an audio file and look up its identifier
    Fingerprint {
        /// Audio file to decode
        path: PathBuf,

        /// Fingerprint service URL (overrides config)
        #[arg(short, long)]
        server: Option<String>,

        /// Artist name sent with the fingerprint
        #[arg(long)]
        artist: Option<String>,

        /// Album name sent with the fingerprint
        #[arg(long)]
        album: Option<String>,

        /// Track title sent with the fingerprint
        #[arg(long)]
        title: Option<String>,

        /// Track duration in seconds
        #[arg(long)]
        duration: Option<u32>,
    },
}

#[derive(Subcommand)]
enum DvdCommands {
    /// Show what the device cache decides for a sequence of opened URIs
    Plan {
        /// URIs in the order they are opened
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Play a DVD URI and forward navigation commands read from stdin
    Play {
        /// dvd://<device>[#<chapter>]
        uri: String,
    },
}

#[derive(Serialize)]
struct PlanStep<'a> {
    uri: &'a str,
    decision: UriDecision,
}

/// One line of interactive input during `dvd play`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(not(feature = "gst"), allow(dead_code))]
enum Input {
    Quit,
    NextChapter,
    PreviousChapter,
    Move { x: f64, y: f64 },
    Press { button: i32, x: f64, y: f64 },
    Release { button: i32, x: f64, y: f64 },
    Command(NavigationCommand),
}

#[cfg_attr(not(feature = "gst"), allow(dead_code))]
fn parse_input(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let word = words.next()?;

    // Buttons are whole numbers, only coordinates may be fractional
    let button = match word {
        "press" | "release" => Some(words.next()?.parse::<i32>().ok()?),
        _ => None,
    };

    let args = words
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    let input = match (word, button, args.as_slice()) {
        ("quit" | "q", None, []) => Input::Quit,
        ("next", None, []) => Input::NextChapter,
        ("prev", None, []) => Input::PreviousChapter,
        ("move", None, &[x, y]) => Input::Move { x, y },
        ("press", Some(button), &[x, y]) => Input::Press { button, x, y },
        ("release", Some(button), &[x, y]) => Input::Release { button, x, y },
        (name, None, []) => Input::Command(NavigationCommand::from_name(name)?),
        _ => return None,
    };
    Some(input)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    let result = match cli.command {
        Commands::Dvd {
            action: DvdCommands::Plan { uris },
        } => plan(&uris),
        Commands::Dvd {
            action: DvdCommands::Play { uri },
        } => play(config, uri).await,
        Commands::Fingerprint {
            path,
            server,
            artist,
            album,
            title,
            duration,
        } => {
            let hints = TrackHints {
                artist,
                album,
                track: title,
                duration,
                filename: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()),
            };
            fingerprint(config, path, server, hints).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn plan(uris: &[String]) -> Result<()> {
    let cache = DeviceCache::new();

    for uri in uris {
        let step = PlanStep {
            uri,
            decision: cache.handle_uri(uri),
        };
        println!("{}", serde_json::to_string(&step)?);
    }

    Ok(())
}

#[cfg(feature = "gst")]
async fn play(config: Config, uri: String) -> Result<()> {
    use player::dvd::DvdManager;
    use player::gst::{GstPlaybin, PlaybinEvent};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    if !player::dvd::is_dvd_uri(&uri) {
        log::warn!("{} is not a dvd:// URI, navigation may be unavailable", uri);
    }

    let playbin = Arc::new(GstPlaybin::new()?);
    let manager: DvdManager<GstPlaybin> = DvdManager::new(&config.dvd);
    manager.pipeline_setup(&playbin);

    if !manager.handle_uri(&playbin, &uri) {
        playbin.set_uri(&uri);
    }
    playbin.play()?;
    log::info!("Playing {}", uri);

    let manager = Arc::new(Mutex::new(manager));
    let quit = Arc::new(AtomicBool::new(false));

    let mut bus_task = {
        let playbin = Arc::clone(&playbin);
        let manager = Arc::clone(&manager);
        let quit = Arc::clone(&quit);

        tokio::task::spawn_blocking(move || -> Result<()> {
            while !quit.load(Ordering::Acquire) {
                let Some(event) = playbin.next_event(Duration::from_millis(100)) else {
                    continue;
                };

                let mut manager = manager.lock().unwrap_or_else(PoisonError::into_inner);
                match event {
                    PlaybinEvent::Playing => manager.find_navigation(&playbin),
                    PlaybinEvent::CommandsChanged => {
                        manager.handle_commands_changed(&playbin);
                        println!("menu: {}", manager.is_menu());
                    }
                    PlaybinEvent::Eos => {
                        log::info!("End of stream");
                        return Ok(());
                    }
                    PlaybinEvent::Error(e) => anyhow::bail!("Playback error: {}", e),
                }
            }
            Ok(())
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            result = &mut bus_task => {
                playbin.stop();
                return result?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(input) = parse_input(&line) else {
                    eprintln!("Unknown command: {}", line.trim());
                    continue;
                };

                let manager = manager.lock().unwrap_or_else(PoisonError::into_inner);
                match input {
                    Input::Quit => break,
                    Input::NextChapter => {
                        manager.go_to_next_chapter(&playbin);
                    }
                    Input::PreviousChapter => {
                        manager.go_to_previous_chapter(&playbin);
                    }
                    Input::Move { x, y } => manager.mouse_move(x, y),
                    Input::Press { button, x, y } => manager.mouse_button_pressed(button, x, y),
                    Input::Release { button, x, y } => manager.mouse_button_released(button, x, y),
                    Input::Command(command) => manager.send_command(command),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    quit.store(true, Ordering::Release);
    let result = bus_task.await?;
    playbin.stop();
    result
}

#[cfg(not(feature = "gst"))]
async fn play(_config: Config, _uri: String) -> Result<()> {
    player::gst::initialize_gstreamer()
}

#[cfg(feature = "gst")]
async fn fingerprint(
    config: Config,
    path: PathBuf,
    server: Option<String>,
    hints: TrackHints,
) -> Result<()> {
    use player::fingerprint::{FingerprintBridge, HttpSubmitter, PcmWindowExtractor};
    use player::gst::GstDecodeBackend;
    use std::sync::Arc;

    let mut settings = config.fingerprint;
    if let Some(server) = server {
        settings.server_url = server;
    }

    // The blocking HTTP client must be created and dropped off the runtime
    let bridge = tokio::task::spawn_blocking(move || -> Result<_> {
        let backend = GstDecodeBackend::new(settings.rate)?;
        let submitter = HttpSubmitter::new(&settings)?;
        Ok(Arc::new(FingerprintBridge::new(
            &settings,
            backend,
            submitter,
            PcmWindowExtractor::new(),
        )))
    })
    .await??;

    let mut decode = {
        let bridge = Arc::clone(&bridge);
        tokio::task::spawn_blocking(move || bridge.decode_with_hints(&path, &hints))
    };

    let outcome = tokio::select! {
        outcome = &mut decode => outcome?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, cancelling decode");
            bridge.cancel();
            decode.await?
        }
    };

    tokio::task::spawn_blocking(move || drop(bridge)).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(not(feature = "gst"))]
async fn fingerprint(
    _config: Config,
    _path: PathBuf,
    _server: Option<String>,
    _hints: TrackHints,
) -> Result<()> {
    player::gst::initialize_gstreamer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigation_commands() {
        assert_eq!(
            parse_input("up"),
            Some(Input::Command(NavigationCommand::Up))
        );
        assert_eq!(
            parse_input("  enter "),
            Some(Input::Command(NavigationCommand::Activate))
        );
        assert_eq!(
            parse_input("menu"),
            Some(Input::Command(NavigationCommand::DvdMenu))
        );
        assert_eq!(parse_input("next"), Some(Input::NextChapter));
        assert_eq!(parse_input("prev"), Some(Input::PreviousChapter));
        assert_eq!(parse_input("quit"), Some(Input::Quit));
    }

    #[test]
    fn test_parse_mouse_input() {
        assert_eq!(
            parse_input("move 10 20.5"),
            Some(Input::Move { x: 10.0, y: 20.5 })
        );
        assert_eq!(
            parse_input("press 1 3 4"),
            Some(Input::Press {
                button: 1,
                x: 3.0,
                y: 4.0
            })
        );
        assert_eq!(
            parse_input("release 2 0 0"),
            Some(Input::Release {
                button: 2,
                x: 0.0,
                y: 0.0
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert_eq!(parse_input(""), None);
        assert_eq!(parse_input("jump"), None);
        assert_eq!(parse_input("move 1"), None);
        assert_eq!(parse_input("move a b"), None);
        assert_eq!(parse_input("up 3"), None);
    }

    #[test]
    fn test_parse_rejects_fractional_buttons() {
        assert_eq!(parse_input("press 1.7 3 4"), None);
        assert_eq!(parse_input("release NaN 0 0"), None);
        assert_eq!(parse_input("press 1"), None);
        assert_eq!(
            parse_input("press 3 1.5 2.5"),
            Some(Input::Press {
                button: 3,
                x: 1.5,
                y: 2.5
            })
        );
    }

    #[test]
    fn test_cli_parses_fingerprint_hints() {
        let cli = Cli::try_parse_from([
            "bpctl",
            "fingerprint",
            "song.ogg",
            "--artist",
            "Artist",
            "--duration",
            "215",
        ])
        .unwrap();

        match cli.command {
            Commands::Fingerprint {
                path,
                artist,
                duration,
                server,
                ..
            } => {
                assert_eq!(path, PathBuf::from("song.ogg"));
                assert_eq!(artist.as_deref(), Some("Artist"));
                assert_eq!(duration, Some(215));
                assert!(server.is_none());
            }
            _ => panic!("expected fingerprint command"),
        }
    }

    #[test]
    fn test_plan_step_json() {
        let step = PlanStep {
            uri: "dvd:///dev/sr0",
            decision: UriDecision::Adopted {
                device: "/dev/sr0".into(),
            },
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"uri\":\"dvd:///dev/sr0\""));
        assert!(json.contains("Adopted"));
    }
}
