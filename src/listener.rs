use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use codec::{Control, Flags, Frame, UciBytes};
use log::{info, warn};
use persistence::apply_intents;

use crate::dispatch;
use crate::runtime::ProfileRuntime;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const INTENT_BATCH: usize = 64;

/// Drives one profile's blocking UDP socket: decode and dispatch whatever
/// arrives, and interleave the 1Hz board/spectator tick and the
/// configured cleanup sweep on every read timeout. One thread per profile,
/// mirroring a listener built around a single blocking socket rather than
/// an async reactor.
pub fn run(profile: Arc<ProfileRuntime>) {
    info!("profile '{}': listening on {}", profile.name, profile.socket.local_addr().unwrap());

    let buffer_size = profile.config_snapshot().buffer_size;
    let mut buf = vec![0u8; buffer_size];
    let mut last_tick = Instant::now();
    let mut last_cleanup = Instant::now();

    while !profile.should_stop.load(Ordering::Relaxed) {
        match profile.socket.recv_from(&mut buf) {
            Ok((len, from)) => match Frame::decode(&buf[..len]) {
                Ok(frame) => {
                    let accept = profile.sessions.with_session(
                        codec::PeerKey { addr: from, token: frame.token },
                        |s| s.accept_inbound(frame.seq_num),
                    );
                    if accept || frame.ctrl == Control::Ack {
                        dispatch::handle_frame(&profile, frame, from);
                    }
                }
                Err(_) => {
                    // Malformed datagrams are silently dropped; nothing to
                    // reply to and no peer identity to reply with.
                }
            },
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {}
            Err(err) => warn!("profile '{}': recv_from failed: {err}", profile.name),
        }

        let config = profile.config_snapshot();
        let cleanup_period = Duration::from_secs(config.cleanup_interval_sec);
        if last_cleanup.elapsed() >= cleanup_period {
            last_cleanup = Instant::now();
            profile.sessions.evict_stale();
            profile.players.sweep_expired();
            profile.spectators.evict_stale();
        }

        if last_tick.elapsed() >= TICK_PERIOD {
            last_tick = Instant::now();
            run_tick(&profile);
        }

        let mut buf_lock = profile.intents.lock();
        if !buf_lock.is_empty() {
            apply_intents(&mut buf_lock, profile.driver.as_ref(), INTENT_BATCH);
        }
    }
}

fn run_tick(profile: &ProfileRuntime) {
    let archived = profile.boards.tick();
    for board in archived {
        let contributions = profile.contributions.take(board.id);
        if contributions.is_empty() {
            continue;
        }
        let payouts = crate::scoring::distribute_payout(board.result, &contributions, profile.config_snapshot().max_pot);
        for (token, points) in payouts {
            profile.players.record_game(&token, points);
        }
    }

    for update in profile.spectators.collect_focus_updates(&profile.boards) {
        send_spectator_frame(profile, Control::SpectateUpdate, update.key.addr, update.key.token, update.board_id);
    }
    for update in profile.spectators.collect_summary_updates(&profile.boards) {
        send_spectator_frame(profile, Control::SpectateUpdate, update.key.addr, update.key.token, update.board_id);
    }
    for notice in profile.spectators.drain_notices() {
        send_spectator_frame(profile, Control::ServerNotification, notice.key.addr, notice.key.token, notice.board_id);
    }
}

fn send_spectator_frame(
    profile: &ProfileRuntime,
    ctrl: Control,
    to: std::net::SocketAddr,
    token: [u8; 16],
    board_id: u64,
) {
    let fen = profile.boards.with_board(board_id, |e| e.position.fen_cache.clone()).unwrap_or_default();
    let frame = Frame {
        ctrl,
        flags: Flags::new(true),
        header_version: codec::SERVER_VERSION,
        token,
        board_id,
        seq_num: 0,
        uci: UciBytes::empty(),
        payload: Bytes::copy_from_slice(fen.as_bytes()),
    };
    if let Err(err) = profile.socket.send_to(&frame.encode(), to) {
        warn!("profile '{}': spectator send to {to} failed: {err}", profile.name);
    }
}
