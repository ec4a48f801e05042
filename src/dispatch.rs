use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use codec::{Control, Flags, Frame, PeerKey, UciBytes};
use engine::{GameResult, MoveError};
use log::{debug, warn};
use persistence::Intent;
use registry::{RegistryError, SpectatorKey, Token};

use crate::runtime::ProfileRuntime;
use crate::scoring::{self, Contribution};

/// Sends a reply frame to `to` with `header_version = SERVER_VERSION`,
/// allocating the next outbound sequence number for `token`'s session unless
/// `ctrl` is always fire-and-forget. Reliable frames hand off to the
/// register-send-wait-retransmit loop described at §4.1, which runs off the
/// calling thread so the listener keeps reading ACKs while it waits.
fn send(
    profile: &Arc<ProfileRuntime>,
    to: SocketAddr,
    ctrl: Control,
    token: Token,
    board_id: u64,
    uci: UciBytes,
    payload: Bytes,
) {
    send_versioned(profile, to, ctrl, codec::SERVER_VERSION, token, board_id, uci, payload);
}

/// Like [`send`] but lets the caller override `header_version`, for
/// SERVER_HELLO's negotiated-version reply.
fn send_versioned(
    profile: &Arc<ProfileRuntime>,
    to: SocketAddr,
    ctrl: Control,
    header_version: u8,
    token: Token,
    board_id: u64,
    uci: UciBytes,
    payload: Bytes,
) {
    send_flagged(profile, to, ctrl, Flags::new(ctrl.is_always_unreliable()), header_version, token, board_id, uci, payload);
}

/// Like [`send_versioned`] but lets the caller supply the full flags byte,
/// for SERVER_HELLO's negotiated-capabilities reply.
#[allow(clippy::too_many_arguments)]
fn send_flagged(
    profile: &Arc<ProfileRuntime>,
    to: SocketAddr,
    ctrl: Control,
    flags: Flags,
    header_version: u8,
    token: Token,
    board_id: u64,
    uci: UciBytes,
    payload: Bytes,
) {
    let unreliable = ctrl.is_always_unreliable() || flags.is_unreliable();
    let seq_num = if unreliable {
        0
    } else {
        let key = PeerKey { addr: to, token };
        profile.sessions.with_session(key, |s| s.next_seq())
    };
    let frame = Frame {
        ctrl,
        flags,
        header_version,
        token,
        board_id,
        seq_num,
        uci,
        payload,
    };
    let wire = frame.encode();

    if unreliable {
        if let Err(err) = profile.socket.send_to(&wire, to) {
            warn!("profile '{}': send to {to} failed: {err}", profile.name);
        }
        return;
    }

    spawn_reliable_send(profile.clone(), to, seq_num, wire);
}

/// Spawns the register -> send -> wait -> retransmit loop for one reliable
/// frame (§4.1) onto its own thread: this profile's socket read loop is the
/// only thing that can observe an inbound ACK and call
/// [`codec::AckWaiters::notify`], so waiting for one on the calling thread
/// would deadlock the listener against itself. Waits up to `timeout_ms` for
/// the matching ACK, resending the identical wire bytes up to `max_retries`
/// times, and logging `NoAck` once the retry budget is exhausted.
fn spawn_reliable_send(profile: Arc<ProfileRuntime>, to: SocketAddr, seq_num: u32, wire: bytes::BytesMut) {
    std::thread::spawn(move || {
        let rx = profile.ack_waiters.register(seq_num);
        let reliability = profile.reliability;

        for attempt in 0..=reliability.max_retries {
            if attempt > 0 {
                debug!("profile '{}': retransmitting seq {seq_num} to {to} (attempt {attempt})", profile.name);
            }
            if let Err(err) = profile.socket.send_to(&wire, to) {
                warn!("profile '{}': reliable send to {to} failed: {err}", profile.name);
                profile.ack_waiters.cancel(seq_num);
                return;
            }
            if rx.recv_timeout(reliability.timeout).is_ok() {
                return;
            }
        }

        profile.ack_waiters.cancel(seq_num);
        let err = codec::Error::NoAck;
        warn!("profile '{}': reliable send to {to} seq {seq_num} failed: {err}", profile.name);
    });
}

/// Immediately ACKs an accepted inbound reliable frame, echoing its
/// `seq_num` so the sender's ACK-wait is satisfied (§4.1). Never itself
/// awaits an ACK back.
pub(crate) fn send_ack(profile: &Arc<ProfileRuntime>, token: Token, board_id: u64, seq_num: u32, to: SocketAddr) {
    let frame = Frame {
        ctrl: Control::Ack,
        flags: Flags::new(true),
        header_version: codec::SERVER_VERSION,
        token,
        board_id,
        seq_num,
        uci: UciBytes::empty(),
        payload: Bytes::new(),
    };
    if let Err(err) = profile.socket.send_to(&frame.encode(), to) {
        warn!("profile '{}': ack send to {to} failed: {err}", profile.name);
    }
}

fn send_error(profile: &Arc<ProfileRuntime>, to: SocketAddr, token: Token, board_id: u64, message: &str) {
    send(
        profile,
        to,
        Control::Error,
        token,
        board_id,
        UciBytes::empty(),
        Bytes::copy_from_slice(message.as_bytes()),
    );
}

fn emit(profile: &Arc<ProfileRuntime>, intent: Intent) {
    let mut buf = profile.intents.lock();
    buf.emit(intent);
}

/// Dispatches one decoded inbound frame. Errors that reach a handler (as
/// opposed to decode failures, which are dropped before this is called)
/// always get an ERROR reply back to the sender, except an invalid token on
/// anything but CLIENT_HELLO, which is silently dropped.
pub fn handle_frame(profile: &Arc<ProfileRuntime>, frame: Frame, from: SocketAddr) {
    let config = profile.config_snapshot();

    if frame.ctrl != Control::Ack && !frame.flags.is_unreliable() {
        send_ack(profile, frame.token, frame.board_id, frame.seq_num, from);
    }

    match frame.ctrl {
        Control::ClientHello => handle_client_hello(profile, &frame, from),
        Control::PlayerMove => handle_player_move(profile, &frame, from, config.max_pot),
        Control::SpectateGame => handle_spectate_game(profile, &frame, from),
        Control::SpectateStop => {
            profile.spectators.spectate_stop(&SpectatorKey {
                addr: from,
                token: frame.token,
            });
        }
        Control::GetLegalMoves => handle_get_legal_moves(profile, &frame, from),
        Control::LoginRequest => handle_login_request(profile, &frame, from),
        Control::GetPlayerStats => handle_get_player_stats(profile, &frame, from),
        Control::GetLeaderboard => handle_get_leaderboard(profile, from),
        Control::ListProfiles => handle_list_profiles(profile, &frame, from),
        Control::GetProfileInfo => handle_get_profile_info(profile, &frame, from),
        Control::Ack => {
            profile.ack_waiters.notify(frame.seq_num);
        }
        // The remaining codes (SERVER_HELLO, BOARD_UPDATE, ERROR,
        // PROFILES_LIST, PROFILE_INFO, LOGIN_SUCCESS, LOGIN_FAILED,
        // SPECTATE_UPDATE, SERVER_NOTIFICATION, PLAYER_STATS_DATA,
        // LEADERBOARD_DATA, LEGAL_MOVES) are server-to-client only; a client
        // sending one of these is silently dropped.
        _ => debug!("profile '{}': ignoring client-originated reply code {:?}", profile.name, frame.ctrl),
    }
}

fn handle_client_hello(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    let client_version = frame.seq_num as u8;
    let requested_caps = frame.flags.capabilities();
    let granted_caps = requested_caps & codec::SUPPORTED_CAPABILITIES;

    let assigned = match profile.players.get_or_create(Some(frame.token)) {
        Ok(token) => token,
        Err(RegistryError::PlayerCapacityReached) => {
            send_error(profile, from, frame.token, 0, "player capacity reached");
            return;
        }
        Err(_) => return,
    };
    profile.sessions.with_session(PeerKey { addr: from, token: assigned }, |s| s.next_seq());
    emit(profile, Intent::CreateSession { token: assigned, player_id: 0 });

    if client_version > codec::SERVER_VERSION {
        send_error(profile, from, assigned, 0, "unsupported protocol version");
        return;
    }

    let config = profile.config_snapshot();
    let games_played = profile.players.get(&assigned).map(|p| p.games_played).unwrap_or(0);
    let multipliers = config.phase_multipliers();

    let assignment = profile.boards.find_board_for_player(
        assigned,
        games_played,
        config.assignment.n_new,
        config.assignment.early_threshold,
        config.assignment.mid_threshold,
        &multipliers,
        config.max_moves_per_board as usize,
        profile.players.len(),
    );

    let negotiated = client_version.min(codec::SERVER_VERSION);
    match assignment {
        Ok((board_id, side)) => {
            emit(
                profile,
                Intent::CreateReservation {
                    board_id,
                    token: assigned,
                    timeout_seconds: config.reservation_timeout_secs as u32,
                },
            );
            send_flagged(
                profile,
                from,
                Control::ServerHello,
                Flags::with_capabilities(false, granted_caps),
                negotiated,
                assigned,
                board_id,
                UciBytes::empty(),
                Bytes::copy_from_slice(&[side as u8]),
            );
            let fen = profile.boards.with_board(board_id, |e| e.position.fen_cache.clone()).unwrap_or_default();
            send(
                profile,
                from,
                Control::BoardUpdate,
                assigned,
                board_id,
                UciBytes::empty(),
                Bytes::copy_from_slice(fen.as_bytes()),
            );
        }
        Err(RegistryError::PoolExhausted) => send_error(profile, from, assigned, 0, "no boards available"),
        Err(_) => send_error(profile, from, assigned, 0, "board assignment failed"),
    }
}

fn handle_player_move(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr, max_pot: u64) {
    let token = frame.token;
    let board_id = frame.board_id;
    let uci = frame.uci.as_str().to_string();

    let reserved_side = match profile.boards.with_board(board_id, |e| e.reservation.map(|r| r.side)) {
        Some(Some(side)) => side,
        Some(None) => {
            send_error(profile, from, token, board_id, "board is not reserved");
            return;
        }
        None => {
            send_error(profile, from, token, board_id, "unknown board");
            return;
        }
    };

    let outcome = profile
        .boards
        .mutate_position(board_id, &token, |position| engine::validate_and_apply(position, reserved_side, &uci));

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(MoveError::NotTurn)) => {
            send_error(profile, from, token, board_id, "not your turn");
            return;
        }
        Ok(Err(MoveError::BadUci)) => {
            send_error(profile, from, token, board_id, "malformed move");
            return;
        }
        Ok(Err(MoveError::Illegal)) => {
            send_error(profile, from, token, board_id, "illegal move");
            return;
        }
        Err(_) => {
            send_error(profile, from, token, board_id, "board reservation mismatch");
            return;
        }
    };

    if let Err(err) = profile.boards.release_after_move(board_id, &token) {
        warn!("profile '{}': release_after_move({board_id}) failed: {err:?}", profile.name);
    }

    let move_number = profile.boards.with_board(board_id, |e| e.position.fullmove_number).unwrap_or(0);
    emit(profile, Intent::RecordMove { board_id, token, uci: uci.clone(), move_number });
    profile.contributions.record(board_id, Contribution { token, side: reserved_side, moves: 1 });

    let fen = profile.boards.with_board(board_id, |e| e.position.fen_cache.clone()).unwrap_or_default();
    let status = lifecycle_status_tag(result);
    emit(profile, Intent::UpdateBoard { board_id, fen: fen.clone(), status: status.to_string() });

    if result != GameResult::InProgress {
        let contributions = profile.contributions.take(board_id);
        let payouts = scoring::distribute_payout(result, &contributions, max_pot);
        for (payee, points) in payouts {
            profile.players.record_game(&payee, points);
            emit(profile, Intent::RecordPayout { board_id, token: payee, points });
        }
        let winning_side = match result {
            GameResult::WhiteWins => Some(true),
            GameResult::BlackWins => Some(false),
            _ => None,
        };
        emit(profile, Intent::RecordGameResult { board_id, winning_side });
    }

    send(
        profile,
        from,
        Control::BoardUpdate,
        token,
        board_id,
        UciBytes::empty(),
        Bytes::copy_from_slice(fen.as_bytes()),
    );
}

fn lifecycle_status_tag(result: GameResult) -> &'static str {
    match result {
        GameResult::InProgress => "active",
        _ => "archived",
    }
}

fn handle_spectate_game(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    let key = SpectatorKey { addr: from, token: frame.token };
    let trust_tier = profile
        .driver
        .get_trust_tier_by_token(frame.token)
        .ok()
        .flatten()
        .unwrap_or(0);
    let is_admin = trust_tier >= profile.config_snapshot().admin_trust_level;

    match profile.spectators.spectate_game(key, trust_tier, frame.board_id, is_admin, &profile.boards) {
        Ok(()) => {}
        Err(RegistryError::Visibility) => send_error(profile, from, frame.token, frame.board_id, "visibility too low"),
        Err(RegistryError::FocusDisabled) => send_error(profile, from, frame.token, frame.board_id, "focus mode disabled"),
        Err(RegistryError::Full) => send_error(profile, from, frame.token, frame.board_id, "spectator capacity reached"),
        Err(RegistryError::NotAvailable) => send_error(profile, from, frame.token, frame.board_id, "board not available"),
        Err(_) => send_error(profile, from, frame.token, frame.board_id, "cannot spectate"),
    }
}

fn handle_get_legal_moves(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    let Some(moves) = profile.boards.with_board(frame.board_id, |e| engine::moves::generate_legal_moves(&e.position)) else {
        send_error(profile, from, frame.token, frame.board_id, "unknown board");
        return;
    };
    let joined = moves.iter().map(engine::uci::move_to_uci).collect::<Vec<_>>().join(",");
    send(
        profile,
        from,
        Control::LegalMoves,
        frame.token,
        frame.board_id,
        UciBytes::empty(),
        Bytes::copy_from_slice(joined.as_bytes()),
    );
}

fn handle_login_request(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    if frame.payload.len() != 32 {
        send_error(profile, from, frame.token, 0, "malformed public key");
        return;
    }
    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&frame.payload);

    if profile.players.promote_to_persistent(&frame.token, public_key) {
        emit(profile, Intent::LinkSessionToPubkey { token: frame.token, public_key });
        send(profile, from, Control::LoginSuccess, frame.token, 0, UciBytes::empty(), Bytes::new());
    } else {
        send(profile, from, Control::LoginFailed, frame.token, 0, UciBytes::empty(), Bytes::new());
    }
}

fn handle_get_player_stats(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    let Some(player) = profile.players.get(&frame.token) else {
        send_error(profile, from, frame.token, 0, "unknown player");
        return;
    };
    let payload = format!("{},{}", player.score, player.games_played);
    send(
        profile,
        from,
        Control::PlayerStatsData,
        frame.token,
        0,
        UciBytes::empty(),
        Bytes::copy_from_slice(payload.as_bytes()),
    );
}

fn handle_get_leaderboard(profile: &Arc<ProfileRuntime>, from: SocketAddr) {
    let top = profile.players.top_n(10);
    let payload = top
        .iter()
        .map(|p| format!("{}:{}", registry::token::encode(&p.token), p.score))
        .collect::<Vec<_>>()
        .join(",");
    send(
        profile,
        from,
        Control::LeaderboardData,
        [0u8; 16],
        0,
        UciBytes::empty(),
        Bytes::copy_from_slice(payload.as_bytes()),
    );
}

fn handle_list_profiles(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    let directory = profile.directory.read().clone();
    let payload = directory
        .iter()
        .map(|entry| entry.name.clone())
        .collect::<Vec<_>>()
        .join(",");
    send(
        profile,
        from,
        Control::ProfilesList,
        frame.token,
        0,
        UciBytes::empty(),
        Bytes::copy_from_slice(payload.as_bytes()),
    );
}

fn handle_get_profile_info(profile: &Arc<ProfileRuntime>, frame: &Frame, from: SocketAddr) {
    let payload = format!(
        "{},boards={},players={}",
        profile.name,
        profile.boards.len(),
        profile.players.len()
    );
    send(
        profile,
        from,
        Control::ProfileInfo,
        frame.token,
        0,
        UciBytes::empty(),
        Bytes::copy_from_slice(payload.as_bytes()),
    );
}
