//! MPRIS (`org.mpris.MediaPlayer2`) bridge.
//!
//! [`MprisHandle`] is the desktop's now-playing surface: the session manager
//! pushes entries into it and the D-Bus thread reads them back out. Remote
//! commands travel the other way as [`ControlCmd`]s and are answered by the
//! runtime loop, which owns the session manager.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::object_server::SignalEmitter;
use zbus::{Connection, fdo, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::audio::{CommandStatus, NowPlayingInfo, NowPlayingSurface, PlaybackState, RemoteCommand};
use crate::library::Artwork;

const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.tapedeck";
const NO_TRACK: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);
const NOTIFY_POLL: Duration = Duration::from_millis(100);

/// Requests from the D-Bus side to the runtime loop.
#[derive(Debug)]
pub enum ControlCmd {
    Quit,
    Remote {
        cmd: RemoteCommand,
        reply: Sender<CommandStatus>,
    },
}

/// Which groups of properties need a `PropertiesChanged` signal, or a
/// `Seeked` signal for a position jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Changed {
    Status,
    Metadata,
    Seeked,
}

/// Notifications collected between two emission rounds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Pending {
    status: bool,
    metadata: bool,
    seeked: bool,
}

impl Pending {
    fn mark(&mut self, changed: Changed) {
        match changed {
            Changed::Status => self.status = true,
            Changed::Metadata => self.metadata = true,
            Changed::Seeked => self.seeked = true,
        }
    }

    fn any(&self) -> bool {
        self.status || self.metadata || self.seeked
    }
}

#[derive(Debug, Default)]
struct SharedState {
    status: PlaybackState,
    title: Option<String>,
    artist: Option<String>,
    length: Option<Duration>,
    position: Duration,
    position_at: Option<Instant>,
    rate: f64,
    track_id: Option<OwnedObjectPath>,
    art_url: Option<String>,
    generation: u64,
}

impl SharedState {
    /// Last reported position, advanced by the time since at the current rate.
    fn position_now(&self) -> Duration {
        let since = self.position_at.map(|t| t.elapsed()).unwrap_or_default();
        let pos = self.position + since.mul_f64(self.rate.max(0.0));
        match self.length {
            Some(len) => pos.min(len),
            None => pos,
        }
    }

    fn status_for(rate: f64) -> PlaybackState {
        if rate > 0.0 {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<Changed>,
    art_dir: PathBuf,
}

impl MprisHandle {
    fn signal(&self, changed: Changed) {
        let _ = self.notify.send(changed);
    }

    /// Record a new position and rate. Returns whether the status flipped.
    fn set_position(&self, elapsed: Duration, rate: f64) -> bool {
        let Ok(mut s) = self.state.lock() else {
            return false;
        };
        s.position = elapsed;
        s.position_at = Some(Instant::now());
        s.rate = rate;
        let status = SharedState::status_for(rate);
        let changed = s.status != status;
        s.status = status;
        changed
    }
}

impl NowPlayingSurface for MprisHandle {
    fn publish(&self, info: &NowPlayingInfo) {
        let art_url = info
            .artwork
            .as_ref()
            .and_then(|art| cache_artwork(&self.art_dir, art));

        if let Ok(mut s) = self.state.lock() {
            s.generation += 1;
            s.track_id = ObjectPath::try_from(format!("{MPRIS_PATH}/track/{}", s.generation))
                .ok()
                .map(OwnedObjectPath::from);
            s.title = Some(info.title.clone());
            s.artist = Some(info.artist.clone()).filter(|a| !a.is_empty());
            s.length = info.duration;
            s.position = info.elapsed;
            s.position_at = Some(Instant::now());
            s.rate = info.rate;
            s.status = SharedState::status_for(info.rate);
            s.art_url = art_url;
        }
        self.signal(Changed::Metadata);
        self.signal(Changed::Status);
    }

    fn update_progress(&self, elapsed: Duration, rate: f64) {
        if self.set_position(elapsed, rate) {
            self.signal(Changed::Status);
        }
    }

    fn seeked(&self, elapsed: Duration, rate: f64) {
        if self.set_position(elapsed, rate) {
            self.signal(Changed::Status);
        }
        self.signal(Changed::Seeked);
    }

    fn clear(&self) {
        if let Ok(mut s) = self.state.lock() {
            let generation = s.generation;
            *s = SharedState {
                generation,
                ..SharedState::default()
            };
        }
        self.signal(Changed::Metadata);
        self.signal(Changed::Status);
    }
}

/// Write cover art to `dir` under a content-derived name and return its
/// `file://` URL. Existing files are reused.
fn cache_artwork(dir: &Path, art: &Artwork) -> Option<String> {
    let ext = match art.mime_type.as_deref() {
        Some("image/png") => "png",
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/gif") => "gif",
        Some("image/bmp") => "bmp",
        _ => "img",
    };
    let path = dir.join(format!("{:x}.{ext}", md5::compute(&art.data)));

    if !path.exists() {
        let written = fs::create_dir_all(dir).and_then(|()| fs::write(&path, &art.data));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "failed to cache artwork");
            return None;
        }
    }
    Some(format!("file://{}", path.display()))
}

fn insert_value(map: &mut HashMap<String, OwnedValue>, key: &str, value: Value<'_>) {
    match OwnedValue::try_from(value) {
        Ok(v) => {
            map.insert(key.to_string(), v);
        }
        Err(e) => debug!(key, error = %e, "skipping metadata entry"),
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No window to raise.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "tapedeck"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

impl PlayerIface {
    /// Hand `cmd` to the runtime loop and wait for its verdict.
    fn remote(&self, cmd: RemoteCommand) -> fdo::Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(ControlCmd::Remote {
                cmd,
                reply: reply_tx,
            })
            .map_err(|_| fdo::Error::Failed("player is shutting down".to_string()))?;

        match reply_rx.recv_timeout(REPLY_TIMEOUT) {
            Ok(CommandStatus::Success) => Ok(()),
            Ok(CommandStatus::NoActiveSession) => {
                Err(fdo::Error::Failed("no active playback session".to_string()))
            }
            Ok(CommandStatus::Failed) => Err(fdo::Error::Failed("command failed".to_string())),
            Err(_) => Err(fdo::Error::Failed("player did not respond".to_string())),
        }
    }

    fn has_track(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.track_id.is_some())
            .unwrap_or(false)
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {}

    fn previous(&self) {}

    fn play(&self) -> fdo::Result<()> {
        self.remote(RemoteCommand::Play)
    }

    fn pause(&self) -> fdo::Result<()> {
        self.remote(RemoteCommand::Pause)
    }

    fn play_pause(&self) -> fdo::Result<()> {
        self.remote(RemoteCommand::PlayPause)
    }

    fn stop(&self) -> fdo::Result<()> {
        self.remote(RemoteCommand::Stop)
    }

    /// Relative seek in microseconds; clamped at the start of the track.
    fn seek(&self, offset: i64) -> fdo::Result<()> {
        let Some(current) = self.state.lock().ok().map(|s| s.position_now()) else {
            return Ok(());
        };
        let delta = Duration::from_micros(offset.unsigned_abs());
        let target = if offset >= 0 {
            current.saturating_add(delta)
        } else {
            current.saturating_sub(delta)
        };
        self.remote(RemoteCommand::SetPosition(target))
    }

    /// Ignored unless `track_id` names the current track and `position` lies
    /// within it.
    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) -> fdo::Result<()> {
        let valid = self
            .state
            .lock()
            .map(|s| {
                let same_track =
                    s.track_id.as_ref().map(|p| p.as_str()) == Some(track_id.as_str());
                let in_range = position >= 0
                    && s.length
                        .is_none_or(|len| position as u128 <= len.as_micros());
                same_track && in_range
            })
            .unwrap_or(false);

        if !valid {
            debug!(%track_id, position, "ignoring stale SetPosition");
            return Ok(());
        }
        self.remote(RemoteCommand::SetPosition(Duration::from_micros(
            position as u64,
        )))
    }

    /// Position in microseconds after a jump.
    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.status {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.state
            .lock()
            .map(|s| s.position_now().as_micros() as i64)
            .unwrap_or(0)
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        self.has_track()
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        self.has_track()
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        self.has_track()
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let track_id = s
            .track_id
            .clone()
            .map(OwnedObjectPath::into_inner)
            .unwrap_or_else(|| ObjectPath::from_static_str_unchecked(NO_TRACK));
        insert_value(&mut map, "mpris:trackid", Value::ObjectPath(track_id));

        if let Some(title) = &s.title {
            insert_value(&mut map, "xesam:title", Value::from(title.clone()));
        }
        if let Some(artist) = &s.artist {
            insert_value(&mut map, "xesam:artist", Value::from(vec![artist.clone()]));
        }
        if let Some(length) = s.length {
            insert_value(&mut map, "mpris:length", Value::from(length.as_micros() as i64));
        }
        if let Some(url) = &s.art_url {
            insert_value(&mut map, "mpris:artUrl", Value::from(url.clone()));
        }
        map
    }
}

async fn emit_changes(connection: &Connection, pending: Pending) -> zbus::Result<()> {
    let iface_ref = connection
        .object_server()
        .interface::<_, PlayerIface>(MPRIS_PATH)
        .await?;
    let iface = iface_ref.get().await;
    let emitter = iface_ref.signal_emitter();

    if pending.metadata {
        iface.metadata_changed(emitter).await?;
        iface.can_play_changed(emitter).await?;
        iface.can_pause_changed(emitter).await?;
        iface.can_seek_changed(emitter).await?;
    }
    if pending.status {
        iface.playback_status_changed(emitter).await?;
    }
    if pending.seeked {
        PlayerIface::seeked(emitter, iface.position()).await?;
    }
    Ok(())
}

/// Register the MPRIS service on the session bus from a background thread.
///
/// A missing bus is logged and otherwise ignored: the returned handle still
/// works as a surface, it just has nobody listening.
pub fn spawn_mpris(tx: Sender<ControlCmd>, art_dir: PathBuf) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Changed>();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("tapedeck-mpris".to_string())
        .spawn(move || {
            block_on(async move {
                let connection = match Connection::session().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "MPRIS: failed to connect to session bus");
                        return;
                    }
                };

                if let Err(e) = connection.request_name(BUS_NAME).await {
                    warn!(error = %e, "MPRIS: failed to acquire name");
                    return;
                }

                let object_server = connection.object_server();

                if let Err(e) = object_server
                    .at(MPRIS_PATH, RootIface { tx: tx.clone() })
                    .await
                {
                    warn!(error = %e, "MPRIS: failed to register root iface");
                    return;
                }

                if let Err(e) = object_server
                    .at(
                        MPRIS_PATH,
                        PlayerIface {
                            tx,
                            state: state_for_thread,
                        },
                    )
                    .await
                {
                    warn!(error = %e, "MPRIS: failed to register player iface");
                    return;
                }
                debug!(name = BUS_NAME, "MPRIS service registered");

                loop {
                    Timer::after(NOTIFY_POLL).await;

                    let mut pending = Pending::default();
                    loop {
                        match notify_rx.try_recv() {
                            Ok(changed) => pending.mark(changed),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => return,
                        }
                    }
                    if !pending.any() {
                        continue;
                    }
                    if let Err(e) = emit_changes(&connection, pending).await {
                        debug!(error = %e, "MPRIS: failed to emit change signals");
                    }
                }
            });
        });
    if let Err(e) = spawned {
        warn!(error = %e, "MPRIS: failed to start service thread");
    }

    MprisHandle {
        state,
        notify: notify_tx,
        art_dir,
    }
}

#[cfg(test)]
mod tests;
