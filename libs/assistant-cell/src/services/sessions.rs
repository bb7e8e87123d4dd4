// libs/assistant-cell/src/services/sessions.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::error::AssistantError;
use crate::models::{SendMessageResponse, SessionView};
use crate::services::gemini::DialogueFactory;
use crate::services::orchestrator::{ConversationSession, HistoryRefresh, Orchestrator};

/// Bumps a per-session counter that clients watch to know when to re-fetch
/// their booking history.
struct HistoryVersion {
    sender: watch::Sender<u64>,
}

#[async_trait]
impl HistoryRefresh for HistoryVersion {
    async fn refresh(&self) {
        self.sender.send_modify(|version| *version += 1);
        debug!("Booking history version now {}", *self.sender.borrow());
    }
}

/// Bounds on how long and how many conversations are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub idle_ttl: Duration,
    pub max_per_user: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_per_user: 5,
        }
    }
}

impl SessionLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            idle_ttl: Duration::from_secs(config.assistant_session_idle_minutes * 60),
            max_per_user: config.assistant_max_sessions_per_user.max(1),
        }
    }
}

struct SessionSlot {
    owner: String,
    history: watch::Receiver<u64>,
    conversation: Mutex<ConversationSession>,
    /// Milliseconds since the registry epoch.
    last_used: AtomicU64,
}

impl SessionSlot {
    fn history_version(&self) -> u64 {
        *self.history.borrow()
    }

    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    fn in_flight(&self) -> bool {
        self.conversation.try_lock().is_err()
    }
}

/// In-memory conversations keyed by id, each owned by one user.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionSlot>>>,
    orchestrator: Orchestrator,
    dialogues: Arc<dyn DialogueFactory>,
    limits: SessionLimits,
    epoch: Instant,
}

impl SessionRegistry {
    pub fn new(orchestrator: Orchestrator, dialogues: Arc<dyn DialogueFactory>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            orchestrator,
            dialogues,
            limits: SessionLimits::default(),
            epoch: Instant::now(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn touch(&self, slot: &SessionSlot) {
        slot.last_used.store(self.now_ms(), Ordering::Relaxed);
    }

    /// Drops conversations idle for longer than the limit. Conversations
    /// with a message in flight are kept.
    pub async fn prune_idle(&self) -> usize {
        let ttl = self.limits.idle_ttl.as_millis() as u64;
        let now = self.now_ms();

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.in_flight() || now.saturating_sub(slot.last_used()) <= ttl);

        let pruned = before - sessions.len();
        if pruned > 0 {
            info!("Pruned {} idle assistant sessions", pruned);
        }
        pruned
    }

    /// Prunes idle conversations every `every` until the registry is dropped.
    pub fn spawn_eviction(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.prune_idle().await;
                    }
                    None => break,
                }
            }
        })
    }

    pub async fn create(&self, user: &User) -> SessionView {
        self.prune_idle().await;

        let (sender, history) = watch::channel(0);
        let refresh = Arc::new(HistoryVersion { sender });
        let conversation = ConversationSession::new(self.dialogues.open(), refresh);
        let transcript = conversation.transcript().to_vec();

        let id = Uuid::new_v4();
        let slot = Arc::new(SessionSlot {
            owner: user.id.clone(),
            history,
            conversation: Mutex::new(conversation),
            last_used: AtomicU64::new(self.now_ms()),
        });

        let mut sessions = self.sessions.write().await;
        let mut owned: Vec<(Uuid, u64)> = sessions
            .iter()
            .filter(|(_, slot)| slot.owner == user.id)
            .map(|(id, slot)| (*id, slot.last_used()))
            .collect();
        if owned.len() >= self.limits.max_per_user {
            owned.sort_by_key(|(_, last_used)| *last_used);
            let excess = owned.len() + 1 - self.limits.max_per_user;
            for (stale, _) in owned.into_iter().take(excess) {
                sessions.remove(&stale);
                info!("User {} at session limit, dropped session {}", user.id, stale);
            }
        }
        sessions.insert(id, slot);
        drop(sessions);

        info!("User {} started assistant session {}", user.id, id);
        SessionView {
            id,
            transcript,
            history_version: 0,
        }
    }

    async fn slot(&self, user: &User, id: Uuid) -> Result<Arc<SessionSlot>, AssistantError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(&id)
            .filter(|slot| slot.owner == user.id)
            .cloned()
            .ok_or(AssistantError::SessionNotFound)?;
        self.touch(&slot);
        Ok(slot)
    }

    /// Current transcript. Waits for an in-flight message to settle.
    pub async fn get(&self, user: &User, id: Uuid) -> Result<SessionView, AssistantError> {
        let slot = self.slot(user, id).await?;
        let conversation = slot.conversation.lock().await;

        Ok(SessionView {
            id,
            transcript: conversation.transcript().to_vec(),
            history_version: slot.history_version(),
        })
    }

    /// Runs one user message to completion. A second message for the same
    /// session while one is pending is refused.
    pub async fn send(&self, user: &User, id: Uuid, message: &str) -> Result<SendMessageResponse, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let slot = self.slot(user, id).await?;
        let mut conversation = slot
            .conversation
            .try_lock()
            .map_err(|_| AssistantError::TurnInProgress)?;

        let outcome = self.orchestrator.send_message(&mut conversation, message).await;
        self.touch(&slot);

        Ok(SendMessageResponse {
            reply: outcome.reply,
            transcript: conversation.transcript().to_vec(),
            history_refresh: outcome.history_refreshed,
            history_version: slot.history_version(),
        })
    }

    pub async fn remove(&self, user: &User, id: Uuid) -> Result<(), AssistantError> {
        let mut sessions = self.sessions.write().await;
        let owned = sessions.get(&id).is_some_and(|slot| slot.owner == user.id);
        if !owned {
            return Err(AssistantError::SessionNotFound);
        }

        sessions.remove(&id);
        info!("User {} reset assistant session {}", user.id, id);
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
