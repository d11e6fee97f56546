use std::{
    convert::Infallible,
    sync::{mpsc::RecvTimeoutError, Arc, Weak},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use partyplan_core::PlannedEventId;
use partyplan_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use partyplan_infra::{
    projections::registry_board::{RegistryBoardEntry, RegistryBoardProjection},
    read_model::InMemoryEventScopedStore,
    ClaimError, InMemoryLedger, LedgerError, PostgresLedger, PublishingLedger, RegistryConfig,
    ReservationLedger, ReservationService, StorageConfig,
};
use partyplan_registry::RegistryEvent;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

pub type RegistryBus = InMemoryEventBus<EventEnvelope<RegistryEvent>>;
pub type BoardStore = InMemoryEventScopedStore<partyplan_core::CatalogItemId, RegistryBoardEntry>;
pub type RegistryBoard = RegistryBoardProjection<Arc<BoardStore>>;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub planned_event_id: PlannedEventId,
    pub topic: String,
    pub payload: serde_json::Value,
}

const BOARD_UPDATED: &str = "registry.item_updated";
const BOARD_SNAPSHOT: &str = "registry.snapshot";
const BOARD_LAGGED: &str = "registry.lagged";

pub struct AppServices {
    service: ReservationService<Arc<dyn ReservationLedger>>,
    board: Arc<RegistryBoard>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    storage: &'static str,
}

pub async fn build_services(config: &RegistryConfig) -> Result<AppServices, LedgerError> {
    let bus: Arc<RegistryBus> = Arc::new(InMemoryEventBus::new());
    // Subscribe before anything can publish.
    let subscription = bus.subscribe();

    let (ledger, storage): (Arc<dyn ReservationLedger>, &'static str) = match &config.storage {
        StorageConfig::InMemory => (
            Arc::new(PublishingLedger::new(InMemoryLedger::new(), bus)),
            "in_memory",
        ),
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let pg = PostgresLedger::connect(database_url, *max_connections, config.claim_timeout).await?;
            pg.migrate().await?;
            tracing::info!(max_connections, "postgres ledger ready");
            (Arc::new(PublishingLedger::new(pg, bus)), "postgres")
        }
    };

    let board: Arc<RegistryBoard> = Arc::new(RegistryBoardProjection::new(Arc::new(BoardStore::new())));

    // Realtime channel (SSE): lossy broadcast, filtered by planned event in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    spawn_board_subscriber(subscription, Arc::downgrade(&board), realtime_tx.clone());

    Ok(AppServices {
        service: ReservationService::new(ledger, config.retry_policy(), config.claim_timeout),
        board,
        realtime_tx,
        storage,
    })
}

/// Background subscriber: bus -> board -> realtime feed.
///
/// Runs until the bus is dropped or the services holding the board are gone.
fn spawn_board_subscriber(
    sub: Subscription<EventEnvelope<RegistryEvent>>,
    board: Weak<RegistryBoard>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
) {
    tokio::task::spawn_blocking(move || loop {
        let env = match sub.recv_timeout(Duration::from_millis(250)) {
            Ok(env) => env,
            Err(RecvTimeoutError::Timeout) if board.strong_count() > 0 => continue,
            Err(_) => break,
        };
        let Some(projection) = board.upgrade() else { break };

        match projection.apply_envelope(&env) {
            Ok(Some(entry)) => {
                // Lossy; no backpressure on the ledger.
                let _ = realtime_tx.send(RealtimeMessage {
                    planned_event_id: entry.planned_event_id,
                    topic: BOARD_UPDATED.to_string(),
                    payload: serde_json::to_value(&entry).unwrap_or(serde_json::Value::Null),
                });
            }
            Ok(None) => {
                tracing::debug!(
                    item_id = %env.item_id(),
                    sequence_number = env.sequence_number(),
                    "stale board envelope skipped"
                );
            }
            Err(e) => tracing::warn!(event_type = env.event_type(), "board projection apply failed: {e}"),
        }
    });
}

impl AppServices {
    pub fn reservations(&self) -> &ReservationService<Arc<dyn ReservationLedger>> {
        &self.service
    }

    pub fn board(&self) -> &RegistryBoard {
        &self.board
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Storage backend name reported by `/health`.
    pub fn storage(&self) -> &'static str {
        self.storage
    }

    /// Board rows of a planned event, seeded from ledger snapshots first so a
    /// client connecting after a restart sees every item.
    pub async fn board_snapshot(
        &self,
        planned_event_id: PlannedEventId,
    ) -> Result<Vec<RegistryBoardEntry>, ClaimError> {
        let summaries = self.service.list_items(planned_event_id).await?;
        self.board
            .seed(planned_event_id, &summaries)
            .map_err(|e| ClaimError::Internal(e.to_string()))
    }
}

/// Build the SSE stream for one planned event's registry board.
///
/// The first message is a full snapshot; every later message is one updated
/// row. Slow clients that fall behind get a `registry.lagged` hint and should
/// refetch.
pub async fn registry_sse_stream(
    services: Arc<AppServices>,
    planned_event_id: PlannedEventId,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>, ClaimError> {
    // Subscribe before reading the snapshot so no update falls in between.
    let rx = services.realtime_tx().subscribe();
    let rows = services.board_snapshot(planned_event_id).await?;

    let snapshot = serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string());
    let first = tokio_stream::once(Ok(SseEvent::default().event(BOARD_SNAPSHOT).data(snapshot)));

    let updates = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.planned_event_id == planned_event_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        Ok(_) => None,
        Err(_lagged) => Some(Ok(SseEvent::default().event(BOARD_LAGGED).data("{}"))),
    });

    Ok(Sse::new(first.chain(updates)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
