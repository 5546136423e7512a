//! Process-wide map from secret key to live session, loaded lazily from the
//! game directory.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sgf_core::{Color, Game};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use super::{LiveError, Session};
use crate::store::{bounded, Directory, StoreError};

type SessionCell = Arc<OnceCell<Arc<Session>>>;

pub struct SessionRegistry {
    directory: Directory,
    timeout: Duration,
    sessions: DashMap<String, SessionCell>,
    // public key -> secret key, filled as sessions are resolved
    aliases: DashMap<String, String>,
}

impl SessionRegistry {
    pub fn new(directory: Directory, timeout: Duration) -> Self {
        Self {
            directory,
            timeout,
            sessions: DashMap::new(),
            aliases: DashMap::new(),
        }
    }

    /// Return the live session for `secret_key`, loading it on first access.
    ///
    /// Concurrent first accesses share one cell, so the directory is asked
    /// once and every caller gets the same instance.
    pub async fn resolve(&self, secret_key: &str) -> Result<Arc<Session>, LiveError> {
        loop {
            let cell = self
                .sessions
                .entry(secret_key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value()
                .clone();

            let loaded = cell
                .get_or_try_init(|| self.load(secret_key))
                .await
                .cloned();

            match loaded {
                Ok(session) => {
                    if !session.connections().is_retired().await {
                        return Ok(session);
                    }
                    // Lost a race with the sweeper; drop the stale cell and load again.
                    self.forget(secret_key, &cell);
                }
                Err(e) => {
                    self.forget(secret_key, &cell);
                    return Err(e);
                }
            }
        }
    }

    /// Resolve by public or secret key.
    pub async fn resolve_key(&self, key: &str) -> Result<Arc<Session>, LiveError> {
        if self.sessions.contains_key(key) {
            return self.resolve(key).await;
        }
        let known = self.aliases.get(key).map(|secret| secret.value().clone());
        if let Some(secret) = known {
            return self.resolve(&secret).await;
        }
        match bounded(self.timeout, self.directory.find_by_public_key(key)).await {
            Ok(game) => {
                self.aliases
                    .insert(game.public_key.clone(), game.secret_key.clone());
                self.resolve(&game.secret_key).await
            }
            // Not a public key; maybe a secret one.
            Err(StoreError::NotFound(_)) => self.resolve(key).await,
            Err(e) => Err(LiveError::Storage(e)),
        }
    }

    /// Seat held by `user_id`, re-reading the directory once on a miss in
    /// case the player joined after the session was loaded. A session whose
    /// game has finished seats nobody.
    pub async fn seat_for(&self, session: &Session, user_id: &str) -> Result<Color, LiveError> {
        let game = session.game().await;
        if game.is_completed() {
            return Err(LiveError::GameCompleted);
        }
        if let Some(seat) = game.seat_of(user_id) {
            return Ok(seat);
        }
        let fresh = bounded(
            self.timeout,
            self.directory.find_by_secret_key(session.secret_key()),
        )
        .await?;
        let seat = fresh.seat_of(user_id);
        let completed = fresh.is_completed();
        session.replace_game(fresh).await;
        if completed {
            return Err(LiveError::GameCompleted);
        }
        seat.ok_or(LiveError::SeatConflict)
    }

    /// Update the snapshot of a live session after a directory change.
    pub async fn refresh_game(&self, game: &Game) {
        let live = self
            .sessions
            .get(&game.secret_key)
            .and_then(|cell| cell.value().get().cloned());
        if let Some(session) = live {
            session.replace_game(game.clone()).await;
        }
    }

    /// Live session for `secret_key`, without loading.
    pub fn get(&self, secret_key: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(secret_key)
            .and_then(|cell| cell.value().get().cloned())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions whose seats have both been empty for at least `ttl`.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let live: Vec<(String, SessionCell, Arc<Session>)> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let session = entry.value().get()?.clone();
                Some((entry.key().clone(), entry.value().clone(), session))
            })
            .collect();

        let mut evicted = 0;
        for (key, cell, session) in live {
            if session.connections().retire_if_idle(ttl).await {
                self.forget(&key, &cell);
                let public_key = session.game().await.public_key;
                self.aliases.remove_if(&public_key, |_, secret| *secret == key);
                tracing::debug!(game = %key, "Evicted idle session");
                evicted += 1;
            }
        }
        evicted
    }

    pub fn spawn_sweeper(self: Arc<Self>, ttl: Duration, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(ttl).await;
                if evicted > 0 {
                    tracing::info!("Evicted {} idle sessions ({} live)", evicted, self.len());
                }
            }
        })
    }

    async fn load(&self, secret_key: &str) -> Result<Arc<Session>, LiveError> {
        let game = match bounded(self.timeout, self.directory.find_by_secret_key(secret_key)).await
        {
            Ok(game) => game,
            Err(StoreError::NotFound(_)) => return Err(LiveError::NotFound),
            Err(e) => return Err(LiveError::Storage(e)),
        };
        if game.is_completed() {
            return Err(LiveError::GameCompleted);
        }
        tracing::info!(game = %secret_key, public = %game.public_key, "Session created");
        self.aliases
            .insert(game.public_key.clone(), game.secret_key.clone());
        Ok(Arc::new(Session::new(game)))
    }

    fn forget(&self, secret_key: &str, cell: &SessionCell) {
        self.sessions
            .remove_if(secret_key, |_, current| Arc::ptr_eq(current, cell));
    }
}
