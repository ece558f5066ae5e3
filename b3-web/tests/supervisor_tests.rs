//! Supervisor state machine tests against a fake player

mod helpers;

use std::time::Duration;

use b3_common::{B3Event, PlaybackState};
use b3_web::action::Action;
use b3_web::Error;
use helpers::harness;
use serde_json::json;

fn play(file: &str) -> Action {
    Action::Play(file.to_string())
}

#[tokio::test]
async fn test_play_pause_resume_stop_cycle() {
    let h = harness().await;
    let sup = &h.supervisor;

    let t = sup.perform_action(play("song.mp3")).await.unwrap();
    assert!(t.is_ok());
    assert_eq!(t.from, PlaybackState::Stopped);
    assert_eq!(t.to, PlaybackState::Playing);
    assert_eq!(t.active_file, "song.mp3");
    assert_eq!(h.launcher.spawns(), vec![(h.audio_dir.join("song.mp3"), 0)]);

    // The player records 42 seconds when interrupted
    h.launcher.set_behavior(|b| b.seek_on_stop = Some(42));

    let t = sup.perform_action(play("")).await.unwrap();
    assert!(t.is_ok());
    assert_eq!(t.to, PlaybackState::Paused);
    assert_eq!(t.active_file, "song.mp3");
    assert_eq!(h.launcher.stops(), 1);
    assert_eq!(sup.snapshot().await.params.seek_time, 42);

    let t = sup.perform_action(play("song.mp3")).await.unwrap();
    assert_eq!(t.to, PlaybackState::Playing);
    assert_eq!(h.launcher.spawns()[1], (h.audio_dir.join("song.mp3"), 42));

    let t = sup.perform_action(Action::Stop).await.unwrap();
    assert!(t.is_ok());
    assert_eq!(t.to, PlaybackState::Stopped);
    assert_eq!(t.active_file, "");
    assert_eq!(h.launcher.stops(), 2);

    let snapshot = sup.snapshot().await;
    assert_eq!(snapshot.params.seek_time, 0);
    assert_eq!(h.store.load().await.unwrap(), snapshot.params);
}

#[tokio::test]
async fn test_resume_with_empty_file_uses_paused_file() {
    let h = harness().await;
    let sup = &h.supervisor;

    sup.perform_action(play("a.mp3")).await.unwrap();
    sup.perform_action(play("")).await.unwrap();
    let t = sup.perform_action(play("")).await.unwrap();

    assert_eq!(t.to, PlaybackState::Playing);
    assert_eq!(t.active_file, "a.mp3");
    assert_eq!(h.launcher.spawns().len(), 2);
    assert_eq!(h.launcher.spawns()[1].0, h.audio_dir.join("a.mp3"));
}

#[tokio::test]
async fn test_different_file_while_paused_starts_from_top() {
    let h = harness().await;
    let sup = &h.supervisor;
    h.launcher.set_behavior(|b| b.seek_on_stop = Some(30));

    sup.perform_action(play("a.mp3")).await.unwrap();
    sup.perform_action(play("")).await.unwrap();
    assert_eq!(sup.snapshot().await.params.seek_time, 30);

    let t = sup.perform_action(play("b.mp3")).await.unwrap();
    assert_eq!(t.to, PlaybackState::Playing);
    assert_eq!(t.active_file, "b.mp3");
    assert_eq!(h.launcher.spawns()[1], (h.audio_dir.join("b.mp3"), 0));
    assert_eq!(h.store.load().await.unwrap().seek_time, 0);
}

#[tokio::test]
async fn test_failed_switch_keeps_paused_position() {
    let h = harness().await;
    let sup = &h.supervisor;
    h.launcher.set_behavior(|b| b.seek_on_stop = Some(30));

    sup.perform_action(play("a.mp3")).await.unwrap();
    sup.perform_action(play("")).await.unwrap();

    h.launcher.set_behavior(|b| b.missing_binary = true);
    let t = sup.perform_action(play("b.mp3")).await.unwrap();
    assert_eq!(t.to, PlaybackState::Paused);
    assert_eq!(t.active_file, "a.mp3");
    assert!(matches!(t.errors[..], [Error::ExecutableNotFound(_)]));
    assert_eq!(sup.snapshot().await.params.seek_time, 30);
    assert_eq!(h.store.load().await.unwrap().seek_time, 30);

    h.launcher.set_behavior(|b| b.missing_binary = false);
    let t = sup.perform_action(play("")).await.unwrap();
    assert_eq!(t.to, PlaybackState::Playing);
    assert_eq!(h.launcher.spawns()[1], (h.audio_dir.join("a.mp3"), 30));
}

#[tokio::test]
async fn test_failed_start_keeps_stored_position() {
    let h = harness().await;
    let updates = json!({"seek_time": 15});
    h.supervisor
        .update_params(updates.as_object().unwrap())
        .await;

    h.launcher.set_behavior(|b| b.missing_binary = true);
    let t = h.supervisor.perform_action(play("a.mp3")).await.unwrap();
    assert_eq!(t.to, PlaybackState::Stopped);
    assert_eq!(h.store.load().await.unwrap().seek_time, 15);

    h.launcher.set_behavior(|b| b.missing_binary = false);
    h.supervisor.perform_action(play("a.mp3")).await.unwrap();
    assert_eq!(h.launcher.spawns()[0].1, 0);
    assert_eq!(h.store.load().await.unwrap().seek_time, 0);
}

#[tokio::test]
async fn test_absolute_path_used_as_is() {
    let h = harness().await;
    h.supervisor
        .perform_action(play("/media/usb/track.mp3"))
        .await
        .unwrap();
    assert_eq!(h.launcher.spawns()[0].0.to_str(), Some("/media/usb/track.mp3"));
}

#[tokio::test]
async fn test_stop_when_stopped_is_noop() {
    let h = harness().await;

    let t = h.supervisor.perform_action(Action::Stop).await.unwrap();
    assert!(t.is_ok());
    assert_eq!(t.from, PlaybackState::Stopped);
    assert_eq!(t.to, PlaybackState::Stopped);
    assert_eq!(h.launcher.stops(), 0);
    assert!(h.launcher.spawns().is_empty());
}

#[tokio::test]
async fn test_stop_from_paused_clears_file_without_signalling() {
    let h = harness().await;
    let sup = &h.supervisor;
    h.launcher.set_behavior(|b| b.seek_on_stop = Some(12));

    sup.perform_action(play("a.mp3")).await.unwrap();
    sup.perform_action(play("")).await.unwrap();
    assert_eq!(h.launcher.stops(), 1);

    let t = sup.perform_action(Action::Stop).await.unwrap();
    assert_eq!(t.to, PlaybackState::Stopped);
    assert_eq!(t.active_file, "");
    assert_eq!(h.launcher.stops(), 1);
    assert_eq!(h.store.load().await.unwrap().seek_time, 0);
}

#[tokio::test]
async fn test_play_without_file_when_stopped_is_rejected() {
    let h = harness().await;

    let err = h.supervisor.perform_action(play("")).await.unwrap_err();
    assert!(matches!(err, Error::MissingFile));
    assert_eq!(h.supervisor.state().await, PlaybackState::Stopped);
    assert!(h.launcher.spawns().is_empty());
}

#[tokio::test]
async fn test_spawn_failure_leaves_state_unchanged() {
    let h = harness().await;
    h.launcher.set_behavior(|b| b.missing_binary = true);

    let t = h.supervisor.perform_action(play("a.mp3")).await.unwrap();
    assert!(!t.is_ok());
    assert!(matches!(t.errors[0], Error::ExecutableNotFound(_)));
    assert_eq!(t.to, PlaybackState::Stopped);

    let snapshot = h.supervisor.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Stopped);
    assert_eq!(snapshot.active_file, "");

    // The next attempt works once the binary is back
    h.launcher.set_behavior(|b| b.missing_binary = false);
    let t = h.supervisor.perform_action(play("a.mp3")).await.unwrap();
    assert_eq!(t.to, PlaybackState::Playing);
}

#[tokio::test]
async fn test_unclean_exit_reported_but_transition_completes() {
    let h = harness().await;
    h.launcher.set_behavior(|b| b.exit_code = Some(2));

    h.supervisor.perform_action(play("a.mp3")).await.unwrap();
    let t = h.supervisor.perform_action(Action::Stop).await.unwrap();

    assert_eq!(t.to, PlaybackState::Stopped);
    assert_eq!(t.errors.len(), 1);
    assert!(matches!(t.errors[0], Error::ProcessTermination(_)));
}

#[tokio::test]
async fn test_concurrent_stops_signal_once() {
    let h = harness().await;
    let sup = &h.supervisor;
    h.launcher
        .set_behavior(|b| b.stop_delay = Duration::from_millis(100));

    sup.perform_action(play("a.mp3")).await.unwrap();

    let (first, second) = tokio::join!(
        sup.perform_action(Action::Stop),
        sup.perform_action(Action::Stop)
    );

    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.to, PlaybackState::Stopped);
    assert_eq!(second.to, PlaybackState::Stopped);
    assert_eq!(h.launcher.stops(), 1);
}

#[tokio::test]
async fn test_concurrent_plays_launch_one_player() {
    let h = harness().await;
    let sup = &h.supervisor;

    let (first, second) = tokio::join!(
        sup.perform_action(play("a.mp3")),
        sup.perform_action(play("a.mp3"))
    );
    first.unwrap();
    second.unwrap();

    // Second play toggles to paused rather than launching again
    assert_eq!(h.launcher.spawns().len(), 1);
    assert_eq!(sup.state().await, PlaybackState::Paused);
}

#[tokio::test]
async fn test_health_check_stops_after_player_exits() {
    let h = harness().await;
    let sup = &h.supervisor;
    let mut events = sup.subscribe_events();

    sup.perform_action(play("a.mp3")).await.unwrap();
    assert!(sup.check_health().await.is_none());

    h.launcher.finish_current(Some(0));
    let exit = sup.check_health().await.expect("exit detected");
    assert_eq!(exit.code, Some(0));

    let snapshot = sup.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Stopped);
    assert_eq!(snapshot.active_file, "");
    assert_eq!(snapshot.params.seek_time, 0);

    let mut saw_exit = false;
    while let Ok(event) = events.try_recv() {
        if let B3Event::PlayerExited { file, exit_code, .. } = event {
            assert_eq!(file, "a.mp3");
            assert_eq!(exit_code, Some(0));
            saw_exit = true;
        }
    }
    assert!(saw_exit);
}

#[tokio::test]
async fn test_action_after_player_exit_starts_fresh() {
    let h = harness().await;
    let sup = &h.supervisor;

    sup.perform_action(play("a.mp3")).await.unwrap();
    h.launcher.finish_current(Some(0));

    // Without the exit check this would be a pause
    let t = sup.perform_action(play("b.mp3")).await.unwrap();
    assert_eq!(t.from, PlaybackState::Stopped);
    assert_eq!(t.to, PlaybackState::Playing);
    assert_eq!(t.active_file, "b.mp3");
    assert_eq!(h.launcher.spawns().len(), 2);
}

#[tokio::test]
async fn test_health_monitor_notices_exit() {
    let h = harness().await;
    let sup = &h.supervisor;

    sup.perform_action(play("a.mp3")).await.unwrap();
    let monitor = sup.spawn_health_monitor(Duration::from_millis(10));

    h.launcher.finish_current(Some(0));
    let mut stopped = false;
    for _ in 0..50 {
        if sup.state().await == PlaybackState::Stopped {
            stopped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    monitor.abort();
    assert!(stopped);
}

#[tokio::test]
async fn test_param_update_persists_full_set() {
    let h = harness().await;
    let updates = json!({"seek_time": 42});

    let outcome = h
        .supervisor
        .update_params(updates.as_object().unwrap())
        .await;
    assert!(outcome.update.is_clean());
    assert!(outcome.persist_error.is_none());

    let stored = h.store.load().await.unwrap();
    assert_eq!(stored.seek_time, 42);
    assert_eq!(stored.lpf_cutoff, 20000.0);
    assert_eq!(stored.flip_interval_ms, 2000);
    assert_eq!(stored, h.supervisor.snapshot().await.params);
}

#[tokio::test]
async fn test_param_update_applies_valid_keys_only() {
    let h = harness().await;
    let updates = json!({"body_threshold": "5000", "volume": 11, "buffer_count": "many"});

    let outcome = h
        .supervisor
        .update_params(updates.as_object().unwrap())
        .await;
    assert_eq!(outcome.update.applied.len(), 1);
    assert_eq!(outcome.update.rejected.len(), 2);

    let stored = h.store.load().await.unwrap();
    assert_eq!(stored.body_threshold, 5000);
    assert_eq!(stored.buffer_count, 2);
}

#[tokio::test]
async fn test_param_update_survives_store_failure() {
    let h = harness().await;

    // A directory where the store file should be makes every write fail
    std::fs::remove_file(h.store.path()).unwrap();
    std::fs::create_dir(h.store.path()).unwrap();

    let updates = json!({"hpf_cutoff": 80});
    let outcome = h
        .supervisor
        .update_params(updates.as_object().unwrap())
        .await;

    assert!(outcome.update.is_clean());
    assert!(outcome.persist_error.is_some());
    assert_eq!(h.supervisor.snapshot().await.params.hpf_cutoff, 80.0);
}

#[tokio::test]
async fn test_missing_store_created_on_startup() {
    let h = harness().await;
    assert!(h.store.path().exists());
    assert_eq!(h.store.load().await.unwrap(), Default::default());
}

#[tokio::test]
async fn test_shutdown_stops_player() {
    let h = harness().await;

    h.supervisor.perform_action(play("a.mp3")).await.unwrap();
    h.supervisor.shutdown().await;

    assert_eq!(h.launcher.stops(), 1);
    assert_eq!(h.supervisor.state().await, PlaybackState::Stopped);
}
