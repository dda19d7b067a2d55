use booking_engine::{
    booking_objects::{AcceptOutcome, HandoffOutcome},
    db_types::{Actor, BookingId, CustomerId, GeoPoint, PaymentMethod, ProviderId, ProviderReputation, Rating},
};
use serde::{Deserialize, Serialize};
use svc_common::Money;

/// The body for accept, decline and en-route requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAction {
    pub provider_id: ProviderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub provider_id: ProviderId,
    pub position: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub provider_id: ProviderId,
    pub final_amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    /// `customer:<id>`, `provider:<id>` or `system`
    pub actor: Actor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveFlag {
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferInboxParams {
    #[serde(default)]
    pub pending_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerParams {
    pub customer_id: CustomerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub booking_id: BookingId,
    pub outcome: AcceptOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffResponse {
    pub booking_id: BookingId,
    pub outcome: HandoffOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandoffCodeResponse {
    pub booking_id: BookingId,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingResponse {
    pub rating: Rating,
    pub reputation: ProviderReputation,
}
