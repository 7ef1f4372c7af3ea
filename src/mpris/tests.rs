use super::*;
use std::sync::mpsc::Receiver;
use std::thread;

fn make_handle(art_dir: &Path) -> (MprisHandle, Arc<Mutex<SharedState>>, Receiver<Changed>) {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Changed>();
    let handle = MprisHandle {
        state: state.clone(),
        notify: notify_tx,
        art_dir: art_dir.to_path_buf(),
    };
    (handle, state, notify_rx)
}

fn make_info() -> NowPlayingInfo {
    NowPlayingInfo {
        title: "Test Title".to_string(),
        artist: "Test Artist".to_string(),
        duration: Some(Duration::from_micros(1_234_567)),
        elapsed: Duration::ZERO,
        rate: 1.0,
        artwork: Some(Artwork::new(vec![0x89, b'P', b'N', b'G'], Some("image/png".into()))),
    }
}

fn make_iface(state: Arc<Mutex<SharedState>>) -> (PlayerIface, Receiver<ControlCmd>) {
    let (tx, rx) = mpsc::channel::<ControlCmd>();
    (PlayerIface { tx, state }, rx)
}

/// Answer every remote command on `rx` with `status` until the sender goes away.
fn answer_with(rx: Receiver<ControlCmd>, status: CommandStatus) -> thread::JoinHandle<Vec<RemoteCommand>> {
    thread::spawn(move || {
        let mut seen = Vec::new();
        while let Ok(ControlCmd::Remote { cmd, reply }) = rx.recv() {
            seen.push(cmd);
            let _ = reply.send(status);
        }
        seen
    })
}

#[test]
fn publish_fills_shared_state_and_caches_artwork() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, notify_rx) = make_handle(dir.path());

    handle.publish(&make_info());

    let s = state.lock().unwrap();
    assert_eq!(s.status, PlaybackState::Playing);
    assert_eq!(s.title.as_deref(), Some("Test Title"));
    assert_eq!(s.artist.as_deref(), Some("Test Artist"));
    assert_eq!(s.length, Some(Duration::from_micros(1_234_567)));
    assert_eq!(
        s.track_id.as_ref().map(|p| p.as_str()),
        Some("/org/mpris/MediaPlayer2/track/1")
    );

    let url = s.art_url.clone().unwrap();
    let file = PathBuf::from(url.strip_prefix("file://").unwrap());
    assert_eq!(file.extension().and_then(|e| e.to_str()), Some("png"));
    assert_eq!(fs::read(file).unwrap(), vec![0x89, b'P', b'N', b'G']);

    let changes: Vec<Changed> = notify_rx.try_iter().collect();
    assert!(changes.contains(&Changed::Metadata));
    assert!(changes.contains(&Changed::Status));
}

#[test]
fn each_publish_mints_a_new_track_id() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());

    handle.publish(&make_info());
    handle.clear();
    handle.publish(&make_info());

    assert_eq!(
        state.lock().unwrap().track_id.as_ref().map(|p| p.as_str()),
        Some("/org/mpris/MediaPlayer2/track/2")
    );
}

#[test]
fn progress_updates_position_and_signals_only_status_changes() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, notify_rx) = make_handle(dir.path());
    handle.publish(&make_info());
    let _ = notify_rx.try_iter().count();

    handle.update_progress(Duration::from_secs(3), 1.0);
    assert!(notify_rx.try_recv().is_err());
    assert_eq!(state.lock().unwrap().position, Duration::from_secs(3));

    handle.update_progress(Duration::from_secs(4), 0.0);
    assert_eq!(notify_rx.try_recv().unwrap(), Changed::Status);
    assert_eq!(state.lock().unwrap().status, PlaybackState::Paused);
}

#[test]
fn seek_signals_seeked_with_the_new_position() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, notify_rx) = make_handle(dir.path());
    handle.publish(&make_info());
    let _ = notify_rx.try_iter().count();

    handle.seeked(Duration::from_millis(800), 0.0);

    assert_eq!(
        notify_rx.try_iter().collect::<Vec<_>>(),
        vec![Changed::Status, Changed::Seeked]
    );
    let (iface, _cmd_rx) = make_iface(state);
    assert_eq!(iface.position(), 800_000);
}

#[test]
fn session_seek_reaches_the_bus_as_seeked() {
    use crate::audio::SessionManager;
    use crate::audio::fakes::FakeBackend;

    let dir = tempfile::tempdir().unwrap();
    let (handle, _state, notify_rx) = make_handle(dir.path());
    let mgr = SessionManager::new(FakeBackend::default(), Arc::new(handle), Duration::from_secs(3600));
    mgr.play(Path::new("/m/a.mp3"), "A", "", None).unwrap();
    let _ = notify_rx.try_iter().count();

    assert!(mgr.seek(Duration::from_secs(12)).unwrap());
    let mut pending = Pending::default();
    notify_rx.try_iter().for_each(|c| pending.mark(c));
    assert_eq!(
        pending,
        Pending {
            seeked: true,
            ..Pending::default()
        }
    );

    // Periodic progress is not a jump.
    mgr.sync_now();
    assert!(notify_rx.try_recv().is_err());
}

#[test]
fn pending_collapses_repeated_notifications() {
    let mut pending = Pending::default();
    assert!(!pending.any());

    for changed in [Changed::Status, Changed::Seeked, Changed::Status] {
        pending.mark(changed);
    }
    assert!(pending.any());
    assert!(pending.status && pending.seeked && !pending.metadata);
}

#[test]
fn paused_position_does_not_advance() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());
    handle.update_progress(Duration::from_millis(500), 0.0);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(state.lock().unwrap().position_now(), Duration::from_millis(500));
}

#[test]
fn clear_resets_to_stopped_without_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());

    handle.clear();

    let (iface, _cmd_rx) = make_iface(state.clone());
    assert_eq!(iface.playback_status(), "Stopped");
    assert!(!iface.can_play());
    let map = iface.metadata();
    assert_eq!(map.len(), 1);
    assert!(map.contains_key("mpris:trackid"));
}

#[test]
fn playback_status_maps_state_to_mpris_strings() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (iface, _rx) = make_iface(state.clone());

    assert_eq!(iface.playback_status(), "Stopped");
    state.lock().unwrap().status = PlaybackState::Playing;
    assert_eq!(iface.playback_status(), "Playing");
    state.lock().unwrap().status = PlaybackState::Paused;
    assert_eq!(iface.playback_status(), "Paused");
}

#[test]
fn metadata_includes_expected_keys_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());
    let (iface, _cmd_rx) = make_iface(state);

    let map = iface.metadata();
    for k in [
        "mpris:trackid",
        "xesam:title",
        "xesam:artist",
        "mpris:length",
        "mpris:artUrl",
    ] {
        assert!(map.contains_key(k), "missing key: {k}");
    }
}

#[test]
fn blank_artist_is_left_out_of_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&NowPlayingInfo {
        artist: String::new(),
        artwork: None,
        ..make_info()
    });
    let (iface, _cmd_rx) = make_iface(state);

    let map = iface.metadata();
    assert!(!map.contains_key("xesam:artist"));
    assert!(!map.contains_key("mpris:artUrl"));
}

#[test]
fn remote_methods_report_the_runtime_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());

    let (iface, cmd_rx) = make_iface(state.clone());
    let answered = answer_with(cmd_rx, CommandStatus::Success);
    assert!(iface.play_pause().is_ok());
    assert!(iface.stop().is_ok());
    drop(iface);
    assert_eq!(
        answered.join().unwrap(),
        vec![RemoteCommand::PlayPause, RemoteCommand::Stop]
    );

    let (iface, cmd_rx) = make_iface(state);
    let answered = answer_with(cmd_rx, CommandStatus::NoActiveSession);
    assert!(iface.pause().is_err());
    drop(iface);
    answered.join().unwrap();
}

#[test]
fn rejected_seek_is_an_error_on_the_bus() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());

    let (iface, cmd_rx) = make_iface(state);
    let answered = answer_with(cmd_rx, CommandStatus::Failed);
    assert!(iface.seek(500_000).is_err());
    drop(iface);
    assert_eq!(answered.join().unwrap().len(), 1);
}

#[test]
fn remote_without_runtime_fails() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (iface, cmd_rx) = make_iface(state);
    drop(cmd_rx);

    assert!(iface.play().is_err());
}

#[test]
fn set_position_ignores_stale_track_ids() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());
    let (iface, cmd_rx) = make_iface(state);

    let stale = ObjectPath::try_from("/org/mpris/MediaPlayer2/track/99").unwrap();
    assert!(iface.set_position(stale, 1_000).is_ok());
    let current = ObjectPath::try_from("/org/mpris/MediaPlayer2/track/1").unwrap();
    assert!(iface.set_position(current.clone(), -5).is_ok());
    assert!(iface.set_position(current, 9_999_999).is_ok());

    assert!(cmd_rx.try_recv().is_err());
}

#[test]
fn set_position_forwards_valid_requests() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, state, _rx) = make_handle(dir.path());
    handle.publish(&make_info());
    let (iface, cmd_rx) = make_iface(state);
    let answered = answer_with(cmd_rx, CommandStatus::Success);

    let current = ObjectPath::try_from("/org/mpris/MediaPlayer2/track/1").unwrap();
    assert!(iface.set_position(current, 1_000_000).is_ok());
    drop(iface);

    assert_eq!(
        answered.join().unwrap(),
        vec![RemoteCommand::SetPosition(Duration::from_secs(1))]
    );
}

#[test]
fn identical_artwork_is_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let art = Artwork::new(vec![1, 2, 3], Some("image/jpeg".into()));

    let first = cache_artwork(dir.path(), &art).unwrap();
    let second = cache_artwork(dir.path(), &art).unwrap();

    assert_eq!(first, second);
    assert!(first.ends_with(".jpg"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
