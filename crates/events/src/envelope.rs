use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pharmastock_core::ProductId;

use crate::event::Event;

/// Envelope for an event, carrying stream metadata.
///
/// This is the unit a store appends to a product's stream. `sequence_number`
/// is monotonically increasing per stream and equals the aggregate version
/// reached after the event is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    product_id: ProductId,
    aggregate_type: String,
    event_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    pub fn new(
        product_id: ProductId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            product_id,
            aggregate_type: aggregate_type.into(),
            event_type: payload.event_type().to_string(),
            sequence_number,
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
