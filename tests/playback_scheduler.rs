mod common;

use common::{FakePlayer, PlayerCall};
use peersync::audio::TrackRef;
use peersync::scheduler::{PlaybackCommand, PlaybackScheduler, ScheduleOutcome, SessionCell};

const T: i64 = 1_700_000_000_000_000;

fn play(track: &str, start: i64, position_ms: i64) -> PlaybackCommand {
    PlaybackCommand::Play {
        track: TrackRef::from(track),
        reference_start_time: start,
        start_position_ms: position_ms,
    }
}

#[test]
fn test_late_join_seeks_forward_and_starts_immediately() {
    let cell = SessionCell::new();
    let mut scheduler = PlaybackScheduler::new(cell.clone());
    let mut player = FakePlayer::new();

    let outcome = scheduler
        .schedule(&play("song.flac", T, 5_000), T + 12_000_000, &mut player)
        .unwrap();

    assert!(matches!(
        outcome,
        ScheduleOutcome::Started {
            position_ms: 17_000,
            ..
        }
    ));
    assert!(scheduler.pending_start().is_none());
    assert_eq!(
        player.calls(),
        vec![
            PlayerCall::Load(TrackRef::from("song.flac")),
            PlayerCall::Seek(17_000),
            PlayerCall::Play,
        ]
    );
    assert!(cell.current().unwrap().is_active);
}

#[test]
fn test_exact_start_time_plays_from_start_position() {
    let mut scheduler = PlaybackScheduler::new(SessionCell::new());
    let mut player = FakePlayer::new();

    let outcome = scheduler
        .schedule(&play("song.flac", T, 5_000), T, &mut player)
        .unwrap();
    assert!(matches!(outcome, ScheduleOutcome::Started { position_ms: 5_000, .. }));
    assert!(scheduler.pending_start().is_none());
}

#[test]
fn test_early_command_arms_deadline() {
    let cell = SessionCell::new();
    let mut scheduler = PlaybackScheduler::new(cell.clone());
    let mut player = FakePlayer::new();

    let outcome = scheduler
        .schedule(&play("song.flac", T + 3_000_000, 0), T, &mut player)
        .unwrap();
    let ScheduleOutcome::Armed { generation, wait_ms } = outcome else {
        panic!("expected armed start, got {:?}", outcome);
    };
    assert_eq!(wait_ms, 3_000);
    assert_eq!(scheduler.pending_start().unwrap().wait_ms, 3_000);

    // Loaded and cued, not playing
    assert_eq!(
        player.calls(),
        vec![PlayerCall::Load(TrackRef::from("song.flac")), PlayerCall::Seek(0)]
    );
    assert!(!player.is_playing_now());
    assert!(!cell.current().unwrap().is_active);

    assert!(scheduler.fire_start(generation, &mut player).unwrap());
    assert!(player.is_playing_now());
    assert!(cell.current().unwrap().is_active);
    assert!(scheduler.pending_start().is_none());

    // Firing twice does nothing
    assert!(!scheduler.fire_start(generation, &mut player).unwrap());
}

#[test]
fn test_new_play_supersedes_pending_start() {
    let mut scheduler = PlaybackScheduler::new(SessionCell::new());
    let mut player = FakePlayer::new();

    scheduler
        .schedule(&play("a.flac", T + 3_000_000, 0), T, &mut player)
        .unwrap();
    let first = scheduler.pending_start().unwrap();
    scheduler
        .schedule(&play("b.flac", T + 5_000_000, 0), T, &mut player)
        .unwrap();
    let second = scheduler.pending_start().unwrap();

    assert_ne!(first.generation, second.generation);
    assert_eq!(second.wait_ms, 5_000);
    assert!(!scheduler.fire_start(first.generation, &mut player).unwrap());
    assert!(!player.is_playing_now());
}

#[test]
fn test_live_bypasses_scheduling() {
    let cell = SessionCell::new();
    let mut scheduler = PlaybackScheduler::new(cell.clone());
    let mut player = FakePlayer::new();

    let outcome = scheduler
        .schedule(&play("live", T + 60_000_000, 0), T, &mut player)
        .unwrap();
    assert!(matches!(outcome, ScheduleOutcome::LiveStarted { .. }));
    assert!(scheduler.pending_start().is_none());
    assert_eq!(
        player.calls(),
        vec![PlayerCall::Load(TrackRef::Live), PlayerCall::Play]
    );
    assert!(cell.current().unwrap().track.is_live());
}

#[test]
fn test_pause_is_idempotent() {
    let cell = SessionCell::new();
    let mut scheduler = PlaybackScheduler::new(cell.clone());
    let mut player = FakePlayer::new();
    let pause = PlaybackCommand::Pause { reference_time: T };

    scheduler
        .schedule(&play("song.flac", T - 1_000_000, 0), T, &mut player)
        .unwrap();

    assert_eq!(scheduler.schedule(&pause, T, &mut player).unwrap(), ScheduleOutcome::Paused);
    let calls_after_first = player.calls();
    assert!(!player.is_playing_now());
    assert!(cell.current().is_none());

    assert_eq!(
        scheduler.schedule(&pause, T, &mut player).unwrap(),
        ScheduleOutcome::AlreadyPaused
    );
    assert_eq!(player.calls(), calls_after_first);
    assert!(cell.current().is_none());
}

#[test]
fn test_pause_cancels_pending_start() {
    let mut scheduler = PlaybackScheduler::new(SessionCell::new());
    let mut player = FakePlayer::new();

    scheduler
        .schedule(&play("song.flac", T + 3_000_000, 0), T, &mut player)
        .unwrap();
    let pending = scheduler.pending_start().unwrap();

    let outcome = scheduler
        .schedule(&PlaybackCommand::Pause { reference_time: T }, T, &mut player)
        .unwrap();
    assert_eq!(outcome, ScheduleOutcome::Paused);
    assert!(scheduler.pending_start().is_none());
    assert!(!scheduler.fire_start(pending.generation, &mut player).unwrap());
    assert!(!player.is_playing_now());
}

#[test]
fn test_seek_reschedules_active_track() {
    let cell = SessionCell::new();
    let mut scheduler = PlaybackScheduler::new(cell.clone());
    let mut player = FakePlayer::new();

    scheduler
        .schedule(&play("song.flac", T - 2_000_000, 0), T, &mut player)
        .unwrap();
    player.clear_calls();

    let seek = PlaybackCommand::SeekTo {
        reference_start_time: T - 500_000,
        start_position_ms: 60_000,
    };
    let outcome = scheduler.schedule(&seek, T, &mut player).unwrap();
    assert!(matches!(outcome, ScheduleOutcome::Started { position_ms: 60_500, .. }));

    let session = cell.current().unwrap();
    assert_eq!(session.track, TrackRef::from("song.flac"));
    assert_eq!(session.start_position_ms, 60_000);
    assert_eq!(session.reference_start_time, T - 500_000);
    assert!(player.seeks().contains(&60_500));
}

#[test]
fn test_seek_ignored_while_live() {
    let mut scheduler = PlaybackScheduler::new(SessionCell::new());
    let mut player = FakePlayer::new();

    scheduler.schedule(&play("live", T, 0), T, &mut player).unwrap();
    player.clear_calls();

    let seek = PlaybackCommand::SeekTo {
        reference_start_time: T,
        start_position_ms: 1_000,
    };
    assert_eq!(scheduler.schedule(&seek, T, &mut player).unwrap(), ScheduleOutcome::Ignored);
    assert!(player.calls().is_empty());
}

#[test]
fn test_failed_play_clears_session() {
    let cell = SessionCell::new();
    let mut scheduler = PlaybackScheduler::new(cell.clone());
    let mut player = FakePlayer::new();
    player.state.lock().fail_play = true;

    assert!(scheduler
        .schedule(&play("song.flac", T - 1_000_000, 0), T, &mut player)
        .is_err());
    assert!(cell.current().is_none());
}
