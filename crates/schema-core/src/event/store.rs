use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{FlowEvent, FlowEventKind};

/// Almacenamiento de eventos append-only.
///
/// Las ramas de un fan-out registran eventos en paralelo, por eso `append_kind`
/// toma `&self`.
pub trait EventStore: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&self, run_id: Uuid, kind: FlowEventKind) -> FlowEvent;
    /// Lista eventos de una corrida (orden ascendente por seq).
    fn list(&self, run_id: Uuid) -> Vec<FlowEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<FlowEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, run_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        let mut events = self.inner.entry(run_id).or_default();
        let ev = FlowEvent { seq: events.len() as u64,
                             run_id,
                             kind,
                             ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, run_id: Uuid) -> Vec<FlowEvent> {
        self.inner.get(&run_id).map(|v| v.value().clone()).unwrap_or_default()
    }
}

impl<T: EventStore> EventStore for std::sync::Arc<T> {
    fn append_kind(&self, run_id: Uuid, kind: FlowEventKind) -> FlowEvent {
        (**self).append_kind(run_id, kind)
    }

    fn list(&self, run_id: Uuid) -> Vec<FlowEvent> {
        (**self).list(run_id)
    }
}
