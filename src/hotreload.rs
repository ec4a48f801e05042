//! Socket inheritance across a supervisor-initiated `exec`, per §6's
//! `WAMBLE_PROFILES_INHERITED` environment variable.
//!
//! Grounded on the teacher's preference for raw OS primitives over a
//! dedicated crate wherever the standard library falls short (e.g.
//! `lib/random_port`'s direct `libc` use for port-range probing); clearing
//! `FD_CLOEXEC` needs the same kind of raw `fcntl` call std doesn't expose.

use std::collections::HashMap;
use std::env;
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;

use anyhow::{Context, Result};

const ENV_VAR: &str = "WAMBLE_PROFILES_INHERITED";
const STATE_DIR_VAR: &str = "WAMBLE_STATE_DIR";
const STATE_FILE_VAR: &str = "WAMBLE_STATE_FILE";

/// Resolves the state snapshot path for profile `name`. `WAMBLE_STATE_FILE`
/// names an exact path and wins outright; otherwise `WAMBLE_STATE_DIR`
/// (default `.`) gets `<name>.wmblst` appended.
pub fn state_file_path(name: &str) -> PathBuf {
    if let Ok(path) = env::var(STATE_FILE_VAR) {
        return PathBuf::from(path);
    }
    let dir = env::var(STATE_DIR_VAR).unwrap_or_else(|_| ".".to_string());
    PathBuf::from(dir).join(format!("{name}.wmblst"))
}

/// Parses `name=fd,name=fd,...` into a lookup table. Absent or malformed
/// entries are simply not present in the map; this is best-effort discovery,
/// not validation — a missing name just means "bind fresh".
fn inherited_fds() -> HashMap<String, i32> {
    let mut map = HashMap::new();
    let Ok(raw) = env::var(ENV_VAR) else {
        return map;
    };
    for entry in raw.split(',') {
        if let Some((name, fd)) = entry.split_once('=') {
            if let Ok(fd) = fd.parse::<i32>() {
                map.insert(name.to_string(), fd);
            }
        }
    }
    map
}

/// Binds a fresh socket for `name`/`addr`, unless an inherited fd for `name`
/// is present in `WAMBLE_PROFILES_INHERITED`, in which case that fd is
/// adopted instead of binding a new one.
#[cfg(unix)]
pub fn bind_or_inherit(name: &str, addr: SocketAddr) -> Result<UdpSocket> {
    use std::os::unix::io::FromRawFd;

    if let Some(fd) = inherited_fds().get(name) {
        // Safety: the fd was handed to us by a prior instance of this same
        // binary via `export_env`, which only ever places open, bound UDP
        // socket fds in the variable.
        return Ok(unsafe { UdpSocket::from_raw_fd(*fd) });
    }
    UdpSocket::bind(addr).with_context(|| format!("binding profile '{name}' to {addr}"))
}

#[cfg(not(unix))]
pub fn bind_or_inherit(name: &str, addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr).with_context(|| format!("binding profile '{name}' to {addr}"))
}

/// Clears `FD_CLOEXEC` on `socket`'s fd so it survives an `exec` call, and
/// returns the fd to include in the exported environment variable.
#[cfg(unix)]
pub fn make_inheritable(socket: &UdpSocket) -> i32 {
    use std::os::unix::io::AsRawFd;

    let fd = socket.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
        }
    }
    fd
}

#[cfg(not(unix))]
pub fn make_inheritable(_socket: &UdpSocket) -> i32 {
    -1
}

/// Builds the `WAMBLE_PROFILES_INHERITED` value for an `exec`'d replacement
/// process, from this process's own `(name, fd)` pairs.
pub fn export_env_value(entries: &[(String, i32)]) -> String {
    entries.iter().map(|(name, fd)| format!("{name}={fd}")).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_parse_round_trips() {
        let value = export_env_value(&[("alpha".to_string(), 7), ("beta".to_string(), 9)]);
        std::env::set_var(ENV_VAR, &value);
        let parsed = inherited_fds();
        assert_eq!(parsed.get("alpha"), Some(&7));
        assert_eq!(parsed.get("beta"), Some(&9));
        std::env::remove_var(ENV_VAR);
    }

    #[test]
    fn missing_env_var_yields_empty_map() {
        std::env::remove_var(ENV_VAR);
        assert!(inherited_fds().is_empty());
    }
}
