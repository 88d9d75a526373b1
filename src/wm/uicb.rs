//! User commands
//!
//! The command table shared by the control channel and key bindings. Control
//! text is one command per line: `<screen> <command> [arg]`.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::wm::Session;
use crate::wm::backend::Backend;

pub type Uicb<B> = fn(&mut Session<B>, usize, Option<&str>) -> Result<()>;

/// Look a command up by name
pub fn command<B: Backend>(name: &str) -> Option<Uicb<B>> {
    let uicb: Uicb<B> = match name {
        "quit" => quit,
        "spawn" => spawn,
        "setstatustext" => set_status_text,
        "tag_view" => tag_view,
        "tag_viewnext" => tag_view_next,
        "tag_viewprev" => tag_view_prev,
        "setlayout" => set_layout,
        "client_focusnext" => client_focus_next,
        "client_focusprev" => client_focus_prev,
        "client_kill" => client_kill,
        "client_togglefloating" => client_toggle_floating,
        _ => return None,
    };
    Some(uicb)
}

/// Run one command on a logical screen
pub fn execute<B: Backend>(
    session: &mut Session<B>,
    screen: usize,
    name: &str,
    arg: Option<&str>,
) -> Result<()> {
    if screen >= session.screens.len() {
        warn!("Command {:?} for unknown screen {}", name, screen);
        return Ok(());
    }
    match command::<B>(name) {
        Some(uicb) => {
            debug!("Running {} {:?} on screen {}", name, arg, screen);
            uicb(session, screen, arg)
        }
        None => {
            warn!("Unknown command {:?}", name);
            Ok(())
        }
    }
}

/// Split one control line into screen, command and argument
pub fn parse_line(line: &str) -> Option<(&str, &str, Option<&str>)> {
    let line = line.trim();
    let (screen, rest) = line.split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    Some((screen, name, arg))
}

/// Interpret control text received over the FIFO or the socket
pub fn parse_control<B: Backend>(session: &mut Session<B>, text: &str) -> Result<()> {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let Some((screen, name, arg)) = parse_line(line) else {
            warn!("Malformed control line {:?}", line);
            continue;
        };
        let Ok(screen) = screen.parse::<usize>() else {
            warn!("Bad screen number in control line {:?}", line);
            continue;
        };
        execute(session, screen, name, arg)?;
    }
    Ok(())
}

fn quit<B: Backend>(session: &mut Session<B>, _screen: usize, _arg: Option<&str>) -> Result<()> {
    info!("Quit requested");
    session.quit();
    Ok(())
}

fn spawn<B: Backend>(session: &mut Session<B>, screen: usize, arg: Option<&str>) -> Result<()> {
    let Some(cmd) = arg else {
        return Ok(());
    };
    let mut child = Command::new("sh");
    child.arg("-c").arg(cmd);
    if let Some(display) = session.display_for(screen) {
        child.env("DISPLAY", display);
    }
    match child.spawn() {
        Ok(c) => debug!("Spawned {:?} (pid {})", cmd, c.id()),
        Err(e) => warn!("Failed to spawn {:?}: {}", cmd, e),
    }
    Ok(())
}

fn set_status_text<B: Backend>(session: &mut Session<B>, screen: usize, arg: Option<&str>) -> Result<()> {
    session.set_status_text(screen, arg.unwrap_or_default())
}

fn tag_view<B: Backend>(session: &mut Session<B>, screen: usize, arg: Option<&str>) -> Result<()> {
    let Some(index) = arg.and_then(|a| a.parse::<usize>().ok()).and_then(|n| n.checked_sub(1)) else {
        warn!("tag_view needs a tag number, got {:?}", arg);
        return Ok(());
    };
    if session.screens[screen].view_tag(index) {
        session.arrange(screen)?;
    }
    Ok(())
}

fn tag_view_next<B: Backend>(session: &mut Session<B>, screen: usize, _arg: Option<&str>) -> Result<()> {
    session.screens[screen].view_relative(1);
    session.arrange(screen)
}

fn tag_view_prev<B: Backend>(session: &mut Session<B>, screen: usize, _arg: Option<&str>) -> Result<()> {
    session.screens[screen].view_relative(-1);
    session.arrange(screen)
}

/// `+n`/`-n` cycles through the layouts, a bare `n` selects one (1-based)
fn set_layout<B: Backend>(session: &mut Session<B>, screen: usize, arg: Option<&str>) -> Result<()> {
    let config = &mut session.screens[screen];
    match arg {
        None => config.cycle_layout(1),
        Some(a) if a.starts_with('+') || a.starts_with('-') => match a.parse::<isize>() {
            Ok(delta) => config.cycle_layout(delta),
            Err(_) => warn!("Bad layout offset {:?}", a),
        },
        Some(a) => match a.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
            Some(index) if index < config.layouts.len() => config.layout = index,
            _ => warn!("No layout {:?}", a),
        },
    }
    session.arrange(screen)
}

fn focus_relative<B: Backend>(session: &mut Session<B>, screen: usize, delta: isize) -> Result<()> {
    let visible = session.visible_on(screen);
    if visible.is_empty() {
        return Ok(());
    }
    let next = match session.selected.and_then(|w| visible.iter().position(|v| *v == w)) {
        Some(current) => (current as isize + delta).rem_euclid(visible.len() as isize) as usize,
        None => 0,
    };
    session.focus(Some(visible[next]), screen)
}

fn client_focus_next<B: Backend>(session: &mut Session<B>, screen: usize, _arg: Option<&str>) -> Result<()> {
    focus_relative(session, screen, 1)
}

fn client_focus_prev<B: Backend>(session: &mut Session<B>, screen: usize, _arg: Option<&str>) -> Result<()> {
    focus_relative(session, screen, -1)
}

fn client_kill<B: Backend>(session: &mut Session<B>, _screen: usize, _arg: Option<&str>) -> Result<()> {
    session.kill_selected()
}

fn client_toggle_floating<B: Backend>(session: &mut Session<B>, _screen: usize, _arg: Option<&str>) -> Result<()> {
    let Some(window) = session.selected else {
        return Ok(());
    };
    let Some(client) = session.clients.get_mut(window) else {
        return Ok(());
    };
    client.floating = !client.floating;
    let screen = client.screen;
    session.arrange(screen)
}
