use wamble_persistence::{apply_intents, Intent, IntentBuffer, MemoryDriver, SessionRecord, Status, StorageDriver};

#[test]
fn session_touch_applies_once_the_session_exists() {
    let token = [4u8; 16];
    let driver = MemoryDriver::new();
    driver.seed_session(
        token,
        SessionRecord {
            player_id: 1,
            persistent: false,
        },
    );

    let mut buf = IntentBuffer::new();
    buf.emit(Intent::UpdateSessionLastSeen { token });
    assert_eq!(apply_intents(&mut buf, &driver, 10), Status::Ok);
    assert!(buf.is_empty());
}

#[test]
fn a_batch_of_mixed_success_and_failure_retains_only_the_failures() {
    let driver = MemoryDriver::new();
    let mut buf = IntentBuffer::new();
    buf.emit(Intent::CreateBoard {
        board_id: 1,
        fen: "startpos".to_string(),
        status: "dormant".to_string(),
    });
    buf.emit(Intent::UpdateSessionLastSeen { token: [0u8; 16] }); // no session: silently satisfied
    buf.emit(Intent::CreateBoard {
        board_id: 2,
        fen: "startpos".to_string(),
        status: "dormant".to_string(),
    });

    assert_eq!(apply_intents(&mut buf, &driver, 10), Status::Ok);
    assert!(buf.is_empty());
    assert_eq!(driver.get_board(1).unwrap().unwrap().board_id, 1);
    assert_eq!(driver.get_board(2).unwrap().unwrap().board_id, 2);
}

#[test]
fn recorded_moves_are_queryable_back_from_the_driver() {
    let driver = MemoryDriver::new();
    let mut buf = IntentBuffer::new();
    for move_number in 1..=3u32 {
        buf.emit(Intent::RecordMove {
            board_id: 9,
            token: [1u8; 16],
            uci: "e2e4".to_string(),
            move_number,
        });
    }
    apply_intents(&mut buf, &driver, 10);

    let moves = driver.get_moves_for_board(9).unwrap();
    assert_eq!(moves.len(), 3);
    assert_eq!(driver.get_longest_game_moves().unwrap(), Some(3));
}
