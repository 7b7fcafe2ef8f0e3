//! Line-oriented operator console.
//!
//! Each input line is one command; each command prints one or more
//! result lines. Errors are printed and the session continues.

use std::fmt::Write as _;

use ptzcam_core::types::{BIRDDOG_DEFAULT_PORT, PANASONIC_DEFAULT_PORT, VISCA_DEFAULT_PORT};
use ptzcam_core::{CameraEndpoint, Dispatch, Dispatcher, Preset, ProtocolConfig, PtzError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub const HELP: &str = "\
commands:
  move <dpan> <dtilt>          relative move
  abs <pan> <tilt> <zoom>      absolute move
  zoom <level>                 absolute zoom
  drive <pan> <tilt>           continuous move at signed speeds
  stop | home
  focus <speed>|stop | af on|off|push
  pos                          query the camera position
  presets | recall <preset>
  capture <name> [#color]      save the current position
  rename <preset> <name> | forget <preset>
  store <slot>                 save to the camera's own preset slot
  profiles | profile save|load|delete <name>
  endpoints | use <endpoint> | release
  add <name> <protocol...>     protocols: visca|panasonic|birddog <host[:port]>, ndi, sim
  remove <endpoint> | test <protocol...>
  video on|off | click <x> <y> <w> <h> | scroll <steps> | overlays <w> <h>
  help | quit";

/// Default overlay color for captured presets.
const DEFAULT_COLOR: &str = "#ff9900";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Quit,
    Move { pan_delta: f64, tilt_delta: f64 },
    Absolute { pan: f64, tilt: f64, zoom: f64 },
    Zoom(f64),
    Drive { pan_speed: f64, tilt_speed: f64 },
    Stop,
    Home,
    Focus(f64),
    FocusStop,
    Autofocus(bool),
    AutofocusTrigger,
    Position,
    Presets,
    Recall(String),
    Capture { name: String, color: String },
    RenamePreset { preset: String, name: String },
    ForgetPreset(String),
    StoreNative(u8),
    Profiles,
    SaveProfile(String),
    LoadProfile(String),
    DeleteProfile(String),
    Endpoints,
    AddEndpoint { name: String, config: ProtocolConfig },
    Use(String),
    RemoveEndpoint(String),
    Release,
    Test(ProtocolConfig),
    Video(bool),
    Click { x: f64, y: f64, w: f64, h: f64 },
    Scroll(f64),
    Overlays { w: f64, h: f64 },
}

// ── Parsing ──────────────────────────────────────────────────────

/// Parse one input line. Keywords are case-insensitive.
pub fn parse_command(input: &str) -> Result<ConsoleCommand, String> {
    let words: Vec<&str> = input.split_whitespace().collect();
    let Some((keyword, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };
    let keyword = keyword.to_ascii_lowercase();

    let cmd = match keyword.as_str() {
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "move" => ConsoleCommand::Move {
            pan_delta: number(args, 0, "dpan")?,
            tilt_delta: number(args, 1, "dtilt")?,
        },
        "abs" => ConsoleCommand::Absolute {
            pan: number(args, 0, "pan")?,
            tilt: number(args, 1, "tilt")?,
            zoom: number(args, 2, "zoom")?,
        },
        "zoom" => ConsoleCommand::Zoom(number(args, 0, "level")?),
        "drive" => ConsoleCommand::Drive {
            pan_speed: number(args, 0, "pan speed")?,
            tilt_speed: number(args, 1, "tilt speed")?,
        },
        "stop" => ConsoleCommand::Stop,
        "home" => ConsoleCommand::Home,
        "focus" if args.first().is_some_and(|a| a.eq_ignore_ascii_case("stop")) => {
            ConsoleCommand::FocusStop
        }
        "focus" => ConsoleCommand::Focus(number(args, 0, "speed")?),
        "af" if args.first().is_some_and(|a| a.eq_ignore_ascii_case("push")) => {
            ConsoleCommand::AutofocusTrigger
        }
        "af" => ConsoleCommand::Autofocus(switch(args)?),
        "pos" => ConsoleCommand::Position,
        "presets" => ConsoleCommand::Presets,
        "recall" => ConsoleCommand::Recall(rest(args, 0, "recall requires a preset")?),
        "capture" => {
            let (color, name_words) = match args.split_last() {
                Some((last, init)) if last.starts_with('#') => (last.to_string(), init),
                _ => (DEFAULT_COLOR.to_string(), args),
            };
            ConsoleCommand::Capture {
                name: rest(name_words, 0, "capture requires a name")?,
                color,
            }
        }
        "rename" => ConsoleCommand::RenamePreset {
            preset: word(args, 0, "rename requires <preset> <name>")?,
            name: rest(args, 1, "rename requires <preset> <name>")?,
        },
        "forget" => ConsoleCommand::ForgetPreset(rest(args, 0, "forget requires a preset")?),
        "store" => {
            let slot = word(args, 0, "store requires a slot")?;
            ConsoleCommand::StoreNative(
                slot.parse()
                    .map_err(|_| format!("invalid slot '{slot}'"))?,
            )
        }
        "profiles" => ConsoleCommand::Profiles,
        "profile" => {
            let action = word(args, 0, "profile requires save|load|delete <name>")?;
            let name = rest(args, 1, "profile requires a name")?;
            match action.to_ascii_lowercase().as_str() {
                "save" => ConsoleCommand::SaveProfile(name),
                "load" => ConsoleCommand::LoadProfile(name),
                "delete" => ConsoleCommand::DeleteProfile(name),
                other => return Err(format!("unknown profile action: '{other}'")),
            }
        }
        "endpoints" => ConsoleCommand::Endpoints,
        "add" => {
            let name = word(args, 0, "add requires <name> <protocol...>")?;
            ConsoleCommand::AddEndpoint {
                name,
                config: parse_protocol(args.get(1..).unwrap_or_default())?,
            }
        }
        "use" => ConsoleCommand::Use(rest(args, 0, "use requires an endpoint")?),
        "remove" => ConsoleCommand::RemoveEndpoint(rest(args, 0, "remove requires an endpoint")?),
        "release" => ConsoleCommand::Release,
        "test" => ConsoleCommand::Test(parse_protocol(args)?),
        "video" => ConsoleCommand::Video(switch(args)?),
        "click" => ConsoleCommand::Click {
            x: number(args, 0, "x")?,
            y: number(args, 1, "y")?,
            w: number(args, 2, "width")?,
            h: number(args, 3, "height")?,
        },
        "scroll" => ConsoleCommand::Scroll(number(args, 0, "steps")?),
        "overlays" => ConsoleCommand::Overlays {
            w: number(args, 0, "width")?,
            h: number(args, 1, "height")?,
        },
        other => return Err(format!("unknown command: '{other}'")),
    };
    Ok(cmd)
}

/// Parse `visca|panasonic|birddog <host[:port]> ...`, `ndi` or `sim`.
/// Panasonic accepts an optional username and password after the host.
pub fn parse_protocol(args: &[&str]) -> Result<ProtocolConfig, String> {
    let Some((kind, args)) = args.split_first() else {
        return Err("missing protocol".to_string());
    };
    let config = match kind.to_ascii_lowercase().as_str() {
        "ndi" => ProtocolConfig::Ndi,
        "sim" | "simulated" => ProtocolConfig::Simulated,
        "visca" => {
            let (host, port) = address(args, VISCA_DEFAULT_PORT)?;
            ProtocolConfig::Visca { host, port }
        }
        "panasonic" | "aw" => {
            let (host, port) = address(args, PANASONIC_DEFAULT_PORT)?;
            ProtocolConfig::PanasonicAw {
                host,
                port,
                username: args.get(1).map(|s| s.to_string()),
                password: args.get(2).map(|s| s.to_string()),
            }
        }
        "birddog" => {
            let (host, port) = address(args, BIRDDOG_DEFAULT_PORT)?;
            ProtocolConfig::BirdDogRest { host, port }
        }
        other => return Err(format!("unknown protocol: '{other}'")),
    };
    Ok(config)
}

fn address(args: &[&str], default_port: u16) -> Result<(String, u16), String> {
    let addr = word(args, 0, "missing host")?;
    if let Some((host, port)) = addr.rsplit_once(':')
        && !host.contains(':')
    {
        let port = port.parse().map_err(|_| format!("invalid port '{port}'"))?;
        return Ok((host.to_string(), port));
    }
    Ok((addr, default_port))
}

fn word(args: &[&str], index: usize, missing: &str) -> Result<String, String> {
    args.get(index)
        .map(|s| s.to_string())
        .ok_or_else(|| missing.to_string())
}

/// Every word from `index` on, joined with single spaces.
fn rest(args: &[&str], index: usize, missing: &str) -> Result<String, String> {
    match args.get(index..) {
        Some(tail) if !tail.is_empty() => Ok(tail.join(" ")),
        _ => Err(missing.to_string()),
    }
}

fn number(args: &[&str], index: usize, what: &str) -> Result<f64, String> {
    let raw = args.get(index).ok_or_else(|| format!("missing {what}"))?;
    raw.parse().map_err(|_| format!("invalid {what} '{raw}'"))
}

fn switch(args: &[&str]) -> Result<bool, String> {
    match args.first().map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err("expected on|off".to_string()),
    }
}

// ── Execution ────────────────────────────────────────────────────

/// Run one command against the dispatcher and render its outcome.
pub async fn execute(dispatcher: &Dispatcher, cmd: ConsoleCommand) -> Result<String, PtzError> {
    let text = match cmd {
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => String::new(),
        ConsoleCommand::Move { pan_delta, tilt_delta } => {
            outcome(dispatcher, dispatcher.move_relative(pan_delta, tilt_delta).await?)
        }
        ConsoleCommand::Absolute { pan, tilt, zoom } => {
            outcome(dispatcher, dispatcher.move_absolute(pan, tilt, zoom).await?)
        }
        ConsoleCommand::Zoom(level) => outcome(dispatcher, dispatcher.zoom(level).await?),
        ConsoleCommand::Drive { pan_speed, tilt_speed } => {
            outcome(dispatcher, dispatcher.continuous_move(pan_speed, tilt_speed).await?)
        }
        ConsoleCommand::Stop => outcome(dispatcher, dispatcher.stop().await?),
        ConsoleCommand::Home => outcome(dispatcher, dispatcher.home().await?),
        ConsoleCommand::Focus(speed) => outcome(dispatcher, dispatcher.focus(speed).await?),
        ConsoleCommand::FocusStop => outcome(dispatcher, dispatcher.focus_stop().await?),
        ConsoleCommand::AutofocusTrigger => {
            outcome(dispatcher, dispatcher.autofocus_trigger().await?)
        }
        ConsoleCommand::Autofocus(enabled) => {
            outcome(dispatcher, dispatcher.set_autofocus(enabled).await?)
        }
        ConsoleCommand::Position => dispatcher.get_position().await?.to_string(),
        ConsoleCommand::Presets => {
            let presets = dispatcher.presets().await?;
            if presets.is_empty() {
                "no presets".to_string()
            } else {
                let mut out = String::new();
                for p in &presets {
                    let _ = writeln!(out, "{}  {}  {}  {}", p.id, p.name, p.color, p.position());
                }
                out.trim_end().to_string()
            }
        }
        ConsoleCommand::Recall(key) => {
            let id = preset_id(dispatcher, &key).await?;
            outcome(dispatcher, dispatcher.recall_preset(&id).await?)
        }
        ConsoleCommand::Capture { name, color } => {
            let preset = dispatcher.capture_preset(&name, &color).await?;
            format!("captured '{}' ({}) at {}", preset.name, preset.id, preset.position())
        }
        ConsoleCommand::RenamePreset { preset, name } => {
            let id = preset_id(dispatcher, &preset).await?;
            let mut preset = find_preset(&dispatcher.presets().await?, &id)?;
            preset.name = name;
            let preset = dispatcher.update_preset(preset).await?;
            format!("renamed {} to '{}'", preset.id, preset.name)
        }
        ConsoleCommand::ForgetPreset(key) => {
            let id = preset_id(dispatcher, &key).await?;
            dispatcher.delete_preset(&id).await?;
            format!("deleted preset {id}")
        }
        ConsoleCommand::StoreNative(slot) => {
            let dispatch = dispatcher.store_native_preset(slot).await?;
            format!("slot {slot}: {}", dispatch_word(dispatch))
        }
        ConsoleCommand::Profiles => {
            let profiles = dispatcher.profiles().await?;
            if profiles.is_empty() {
                "no profiles".to_string()
            } else {
                let mut out = String::new();
                for p in &profiles {
                    let _ = writeln!(
                        out,
                        "{}  {}  fov={}  {} preset(s)",
                        p.id,
                        p.name,
                        p.camera_fov_degrees,
                        p.presets.len()
                    );
                }
                out.trim_end().to_string()
            }
        }
        ConsoleCommand::SaveProfile(name) => {
            let profile = dispatcher.save_profile(&name).await?;
            format!(
                "saved profile '{}' ({}) with {} preset(s)",
                profile.name,
                profile.id,
                profile.presets.len()
            )
        }
        ConsoleCommand::LoadProfile(key) => {
            let id = profile_id(dispatcher, &key).await?;
            let profile = dispatcher.load_profile(&id).await?;
            format!(
                "loaded profile '{}': {} preset(s), fov {}",
                profile.name,
                profile.presets.len(),
                profile.camera_fov_degrees
            )
        }
        ConsoleCommand::DeleteProfile(key) => {
            let id = profile_id(dispatcher, &key).await?;
            dispatcher.delete_profile(&id).await?;
            format!("deleted profile {id}")
        }
        ConsoleCommand::Endpoints => {
            let endpoints = dispatcher.endpoints().await?;
            let active = dispatcher.active_endpoint().await.map(|e| e.id);
            if endpoints.is_empty() {
                "no endpoints".to_string()
            } else {
                let mut out = String::new();
                for e in &endpoints {
                    let marker = if active.as_deref() == Some(e.id.as_str()) { "*" } else { " " };
                    let addr = e.config.address().unwrap_or_default();
                    let _ = writeln!(out, "{marker} {}  {}  {}  {addr}", e.id, e.name, e.protocol);
                }
                out.trim_end().to_string()
            }
        }
        ConsoleCommand::AddEndpoint { name, config } => {
            let endpoint = dispatcher.create_endpoint(&name, config).await?;
            format!("added '{}' ({})", endpoint.name, endpoint.id)
        }
        ConsoleCommand::Use(key) => {
            let id = endpoint_id(dispatcher, &key).await?;
            let endpoint = dispatcher.activate_endpoint(&id).await?;
            format!("active: {} ({})", endpoint.name, endpoint.protocol)
        }
        ConsoleCommand::RemoveEndpoint(key) => {
            let id = endpoint_id(dispatcher, &key).await?;
            dispatcher.delete_endpoint(&id).await?;
            format!("deleted endpoint {id}")
        }
        ConsoleCommand::Release => {
            dispatcher.deactivate().await;
            "idle".to_string()
        }
        ConsoleCommand::Test(config) => dispatcher.test_connection(&config).await?,
        ConsoleCommand::Video(connected) => {
            dispatcher.video().set_connected(connected);
            format!("video {}", if connected { "connected" } else { "disconnected" })
        }
        ConsoleCommand::Click { x, y, w, h } => {
            outcome(dispatcher, dispatcher.click_move(x, y, w, h).await?)
        }
        ConsoleCommand::Scroll(steps) => outcome(dispatcher, dispatcher.scroll_zoom(steps).await?),
        ConsoleCommand::Overlays { w, h } => {
            let overlays = dispatcher.overlays(w, h).await?;
            let mut out = String::new();
            for o in overlays.iter().filter(|o| o.rect.visible) {
                let r = o.rect;
                let _ = writeln!(
                    out,
                    "{}  {}  x={:.0} y={:.0} w={:.0} h={:.0}",
                    o.name, o.color, r.x, r.y, r.w, r.h
                );
            }
            if out.is_empty() {
                "no visible overlays".to_string()
            } else {
                out.trim_end().to_string()
            }
        }
    };
    Ok(text)
}

fn dispatch_word(dispatch: Dispatch) -> &'static str {
    match dispatch {
        Dispatch::Sent => "sent",
        Dispatch::Local => "local",
        Dispatch::Throttled => "throttled",
        Dispatch::Ignored => "ignored",
    }
}

fn outcome(dispatcher: &Dispatcher, dispatch: Dispatch) -> String {
    format!("{}  {}", dispatch_word(dispatch), dispatcher.position())
}

fn find_preset(presets: &[Preset], id: &str) -> Result<Preset, PtzError> {
    presets
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .ok_or_else(|| PtzError::NotFound {
            kind: "preset",
            id: id.to_string(),
        })
}

/// Accept an id or a case-insensitive name.
async fn preset_id(dispatcher: &Dispatcher, key: &str) -> Result<String, PtzError> {
    let presets = dispatcher.presets().await?;
    Ok(presets
        .iter()
        .find(|p| p.id == key)
        .or_else(|| presets.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
        .map_or_else(|| key.to_string(), |p| p.id.clone()))
}

async fn profile_id(dispatcher: &Dispatcher, key: &str) -> Result<String, PtzError> {
    let profiles = dispatcher.profiles().await?;
    Ok(profiles
        .iter()
        .find(|p| p.id == key)
        .or_else(|| profiles.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
        .map_or_else(|| key.to_string(), |p| p.id.clone()))
}

async fn endpoint_id(dispatcher: &Dispatcher, key: &str) -> Result<String, PtzError> {
    let endpoints: Vec<CameraEndpoint> = dispatcher.endpoints().await?;
    Ok(endpoints
        .iter()
        .find(|e| e.id == key)
        .or_else(|| endpoints.iter().find(|e| e.name.eq_ignore_ascii_case(key)))
        .map_or_else(|| key.to_string(), |e| e.id.clone()))
}

/// Activate the startup endpoint by id or name.
pub async fn activate(dispatcher: &Dispatcher, key: &str) -> Result<CameraEndpoint, PtzError> {
    let id = endpoint_id(dispatcher, key).await?;
    dispatcher.activate_endpoint(&id).await
}

// ── Session ──────────────────────────────────────────────────────

/// Read commands until `quit` or end of input.
pub async fn run<R, W>(dispatcher: &Dispatcher, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        debug!("console: {line}");
        let reply = match parse_command(line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(cmd) => match execute(dispatcher, cmd).await {
                Ok(text) => text,
                Err(e) => format!("error: {e}"),
            },
            Err(e) => format!("error: {e}"),
        };
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ptzcam_core::{DispatcherConfig, MemoryStore, VideoSignal};

    use super::*;

    #[test]
    fn parses_motion_commands() {
        assert_eq!(
            parse_command("move 0.1 -0.2").unwrap(),
            ConsoleCommand::Move { pan_delta: 0.1, tilt_delta: -0.2 }
        );
        assert_eq!(
            parse_command("ABS 0 0 0.5").unwrap(),
            ConsoleCommand::Absolute { pan: 0.0, tilt: 0.0, zoom: 0.5 }
        );
        assert_eq!(parse_command("  stop ").unwrap(), ConsoleCommand::Stop);
        assert_eq!(parse_command("af off").unwrap(), ConsoleCommand::Autofocus(false));
        assert_eq!(parse_command("af PUSH").unwrap(), ConsoleCommand::AutofocusTrigger);
        assert_eq!(parse_command("focus stop").unwrap(), ConsoleCommand::FocusStop);
        assert_eq!(parse_command("focus -0.5").unwrap(), ConsoleCommand::Focus(-0.5));
        assert_eq!(parse_command("store 12").unwrap(), ConsoleCommand::StoreNative(12));
    }

    #[test]
    fn parses_profile_commands() {
        assert_eq!(parse_command("profiles").unwrap(), ConsoleCommand::Profiles);
        assert_eq!(
            parse_command("profile save Sunday service").unwrap(),
            ConsoleCommand::SaveProfile("Sunday service".into())
        );
        assert_eq!(
            parse_command("PROFILE Load sunday service").unwrap(),
            ConsoleCommand::LoadProfile("sunday service".into())
        );
        assert!(parse_command("profile delete").is_err());
        assert!(parse_command("profile rename a b").unwrap_err().contains("profile action"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("move 0.1").unwrap_err().contains("dtilt"));
        assert!(parse_command("zoom wide").unwrap_err().contains("invalid level"));
        assert!(parse_command("af maybe").is_err());
        assert!(parse_command("store 300").is_err());
        assert!(parse_command("teleport").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn parses_capture_name_and_color() {
        assert_eq!(
            parse_command("capture Choir left #00ff00").unwrap(),
            ConsoleCommand::Capture { name: "Choir left".into(), color: "#00ff00".into() }
        );
        assert_eq!(
            parse_command("capture Pulpit").unwrap(),
            ConsoleCommand::Capture { name: "Pulpit".into(), color: DEFAULT_COLOR.into() }
        );
        assert!(parse_command("capture #00ff00").is_err());
    }

    #[test]
    fn parses_protocols() {
        assert_eq!(
            parse_protocol(&["visca", "10.0.0.5"]).unwrap(),
            ProtocolConfig::Visca { host: "10.0.0.5".into(), port: 52381 }
        );
        assert_eq!(
            parse_protocol(&["birddog", "cam.local:9000"]).unwrap(),
            ProtocolConfig::BirdDogRest { host: "cam.local".into(), port: 9000 }
        );
        assert_eq!(
            parse_protocol(&["aw", "10.0.0.6", "admin", "secret"]).unwrap(),
            ProtocolConfig::PanasonicAw {
                host: "10.0.0.6".into(),
                port: 80,
                username: Some("admin".into()),
                password: Some("secret".into()),
            }
        );
        assert_eq!(parse_protocol(&["SIM"]).unwrap(), ProtocolConfig::Simulated);
        assert!(parse_protocol(&["visca"]).is_err());
        assert!(parse_protocol(&["visca", "h:port"]).is_err());
        assert!(parse_protocol(&["rs232"]).is_err());
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            DispatcherConfig::default(),
            Arc::new(MemoryStore::<CameraEndpoint>::new()),
            Arc::new(MemoryStore::<Preset>::new()),
            VideoSignal::new(true),
        )
    }

    async fn session(dispatcher: &Dispatcher, script: &str) -> Vec<String> {
        let mut out = Vec::new();
        run(dispatcher, script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap().lines().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn session_drives_simulated_camera() {
        let d = dispatcher();
        let out = session(
            &d,
            "add Sim sim\nuse sim\nabs 0.5 -0.5 0.25\npos\ncapture Wide #112233\n\
             home\nrecall wide\nendpoints\nquit\nstop\n",
        )
        .await;

        assert!(out[0].starts_with("added 'Sim'"));
        assert_eq!(out[1], "active: Sim (Simulated)");
        assert!(out[2].starts_with("sent"));
        assert_eq!(out[3], d.position().to_string());
        assert!(out[4].starts_with("captured 'Wide'"));
        assert!(out[5].starts_with("sent"));
        assert!(out[6].starts_with("sent"));
        assert!(out[7].starts_with("* "));
        // Nothing after quit runs.
        assert_eq!(out.len(), 8);
        assert_eq!(d.position().pan, 0.5);
        d.shutdown().await;
    }

    #[tokio::test]
    async fn errors_are_printed_and_the_session_continues() {
        let d = dispatcher();
        let out = session(&d, "recall nowhere\nbogus\n# comment\n\nmove 0.1 0\n").await;
        assert_eq!(out.len(), 3);
        assert!(out[0].starts_with("error: preset not found"));
        assert!(out[1].starts_with("error: unknown command"));
        assert!(out[2].starts_with("local"));
    }

    #[tokio::test]
    async fn video_gates_clicks() {
        let d = dispatcher();
        let out = session(&d, "video off\nclick 0 0 800 600\nvideo on\noverlays 800 600\n").await;
        assert_eq!(out[0], "video disconnected");
        assert!(out[1].starts_with("ignored"));
        assert_eq!(out[3], "no visible overlays");
    }

    #[tokio::test]
    async fn profiles_round_trip_through_the_console() {
        let d = dispatcher();
        let out = session(
            &d,
            "profiles
capture Pulpit
profile save Sunday
forget pulpit
capture Door
             profile load sunday
presets
profiles
profile delete Sunday
profile load Sunday
",
        )
        .await;
        assert_eq!(out[0], "no profiles");
        assert!(out[2].starts_with("saved profile 'Sunday'"));
        assert!(out[2].ends_with("with 1 preset(s)"));
        assert_eq!(out[5], "loaded profile 'Sunday': 1 preset(s), fov 60");
        assert!(out[6].contains("Pulpit"));
        assert!(!out.iter().skip(6).any(|l| l.contains("Door")));
        assert!(out[7].contains("Sunday  fov=60  1 preset(s)"));
        assert!(out[8].starts_with("deleted profile"));
        assert!(out[9].starts_with("error: profile not found"));
    }

    #[tokio::test]
    async fn rename_and_forget_by_name() {
        let d = dispatcher();
        let out = session(
            &d,
            "capture Pulpit\nrename pulpit Lectern\npresets\nforget Lectern\npresets\n",
        )
        .await;
        assert!(out[1].ends_with("to 'Lectern'"));
        assert!(out[2].contains("Lectern"));
        assert!(out[3].starts_with("deleted preset"));
        assert_eq!(out[4], "no presets");
    }
}
