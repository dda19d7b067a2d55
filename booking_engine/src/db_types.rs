use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
pub use svc_common::Money;
use svc_common::{Secret, BASIS_POINTS};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     Identifiers     ---------------------------------------------------------
macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.is_empty() {
                    Err(ConversionError(format!("{} cannot be empty", $prefix)))
                } else {
                    Ok(Self(s.to_string()))
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(BookingId, "booking id");
string_id!(ProviderId, "provider id");
string_id!(CustomerId, "customer id");

impl BookingId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

//--------------------------------------   ServiceCategory   ---------------------------------------------------------
/// A service category such as "plumbing". Categories are stored trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceCategory(String);

impl ServiceCategory {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServiceCategory {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s.is_empty() {
            return Err(ConversionError("Service category cannot be empty".into()));
        }
        if s.contains(',') {
            return Err(ConversionError(format!("Service category may not contain commas: {s}")));
        }
        Ok(Self(s))
    }
}

impl TryFrom<String> for ServiceCategory {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceCategory> for String {
    fn from(value: ServiceCategory) -> Self {
        value.0
    }
}

impl Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      GeoPoint       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ConversionError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ConversionError(format!("Latitude out of range: {lat}")));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ConversionError(format!("Longitude out of range: {lon}")));
        }
        Ok(Self { lat, lon })
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.lat, self.lon).is_ok()
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub point: GeoPoint,
    pub address: String,
}

impl Location {
    pub fn new<S: Into<String>>(point: GeoPoint, address: S) -> Self {
        Self { point, address: address.into() }
    }
}

//--------------------------------------  BookingStatusType  ---------------------------------------------------------
/// The canonical status of a booking. See [`crate::lifecycle`] for the legal transitions between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatusType {
    /// The booking has been created and is waiting to be dispatched.
    Requested,
    /// Offers are outstanding with one or more providers.
    Dispatching,
    /// There were no eligible providers when the booking was dispatched.
    NoMatch,
    /// A provider won the accept race.
    Accepted,
    /// The provider is on the way.
    EnRoute,
    /// The handoff code was verified and work has started.
    InProgress,
    /// The provider has finished the job.
    Completed,
    /// A receipt has been issued and payment has not been captured yet.
    PaymentPending,
    /// Payment has been captured.
    Paid,
    Cancelled,
    /// Providers were offered the booking, but nobody accepted in time.
    Expired,
}

impl BookingStatusType {
    pub const ALL: [BookingStatusType; 11] = [
        Self::Requested,
        Self::Dispatching,
        Self::NoMatch,
        Self::Accepted,
        Self::EnRoute,
        Self::InProgress,
        Self::Completed,
        Self::PaymentPending,
        Self::Paid,
        Self::Cancelled,
        Self::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Dispatching => "DISPATCHING",
            Self::NoMatch => "NO_MATCH",
            Self::Accepted => "ACCEPTED",
            Self::EnRoute => "EN_ROUTE",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl Display for BookingStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ConversionError(format!("Invalid booking status: {s}")))
    }
}

//--------------------------------------   OfferStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatusType {
    Pending,
    Accepted,
    Rejected,
    Expired,
    /// The provider turned the offer down.
    Declined,
}

impl Display for OfferStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Declined => write!(f, "DECLINED"),
        }
    }
}

//--------------------------------------        Actor         ---------------------------------------------------------
/// Whoever requested a state change. Stored as `customer:<id>`, `provider:<id>` or `system`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Actor {
    Customer(CustomerId),
    Provider(ProviderId),
    System,
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer:{id}"),
            Actor::Provider(id) => write!(f, "provider:{id}"),
            Actor::System => write!(f, "system"),
        }
    }
}

impl FromStr for Actor {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("customer", id)) => Ok(Actor::Customer(id.parse()?)),
            Some(("provider", id)) => Ok(Actor::Provider(id.parse()?)),
            None if s == "system" => Ok(Actor::System),
            _ => Err(ConversionError(format!("Invalid actor: {s}"))),
        }
    }
}

impl TryFrom<String> for Actor {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Actor> for String {
    fn from(value: Actor) -> Self {
        value.to_string()
    }
}

//--------------------------------------       Booking        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub category: ServiceCategory,
    /// The price locked in when the booking was created
    pub price: Money,
    pub location: Location,
    pub status: BookingStatusType,
    /// Set when a provider wins the accept race. Never changes afterwards.
    pub provider_id: Option<ProviderId>,
    #[serde(skip)]
    pub handoff_code: Option<Secret<String>>,
    pub handoff_attempts: i64,
    /// The amount reported by the provider on completion
    pub final_amount: Option<Money>,
    pub cancelled_by: Option<Actor>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
    /// The offer deadline while the booking is dispatching
    pub expires_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_assigned_to(&self, provider_id: &ProviderId) -> bool {
        self.provider_id.as_ref() == Some(provider_id)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatusType::Dispatching && self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

//--------------------------------------      NewBooking      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub customer_id: CustomerId,
    pub category: ServiceCategory,
    pub location: Location,
    pub price: Money,
}

impl NewBooking {
    pub fn new(customer_id: CustomerId, category: ServiceCategory, location: Location, price: Money) -> Self {
        Self { customer_id, category, location, price }
    }
}

//--------------------------------------        Offer         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Offer {
    pub id: i64,
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub status: OfferStatusType,
    pub distance_km: f64,
    /// Position of the provider in the candidate list, starting at 1 for the closest
    pub rank: i64,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_pending(&self) -> bool {
        self.status == OfferStatusType::Pending
    }
}

//--------------------------------------    ProviderTier      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderTier {
    #[sqlx(rename = "TIER_1")]
    #[serde(rename = "TIER_1")]
    Tier1,
    #[default]
    #[sqlx(rename = "TIER_2")]
    #[serde(rename = "TIER_2")]
    Tier2,
    #[sqlx(rename = "TIER_3")]
    #[serde(rename = "TIER_3")]
    Tier3,
}

impl ProviderTier {
    /// The platform commission charged on a job, in basis points
    pub fn commission_bps(&self) -> i64 {
        match self {
            ProviderTier::Tier1 => 1_200,
            ProviderTier::Tier2 | ProviderTier::Tier3 => 1_500,
        }
    }

    pub fn commission_on(&self, amount: Money) -> Money {
        debug_assert!(self.commission_bps() <= BASIS_POINTS);
        amount.share_bps(self.commission_bps())
    }
}

impl Display for ProviderTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderTier::Tier1 => write!(f, "TIER_1"),
            ProviderTier::Tier2 => write!(f, "TIER_2"),
            ProviderTier::Tier3 => write!(f, "TIER_3"),
        }
    }
}

//--------------------------------------       Provider       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provider {
    pub id: ProviderId,
    pub display_name: String,
    pub categories: Vec<ServiceCategory>,
    /// The provider's last known position
    pub position: GeoPoint,
    pub service_radius_km: f64,
    pub is_active: bool,
    pub tier: ProviderTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn offers(&self, category: &ServiceCategory) -> bool {
        self.categories.contains(category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProvider {
    pub id: ProviderId,
    pub display_name: String,
    pub categories: Vec<ServiceCategory>,
    pub position: GeoPoint,
    pub service_radius_km: f64,
    #[serde(default)]
    pub tier: ProviderTier,
}

impl NewProvider {
    pub fn new<S: Into<String>>(id: ProviderId, display_name: S, position: GeoPoint, service_radius_km: f64) -> Self {
        Self { id, display_name: display_name.into(), categories: vec![], position, service_radius_km, tier: ProviderTier::default() }
    }

    pub fn with_category(mut self, category: ServiceCategory) -> Self {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    pub fn with_tier(mut self, tier: ProviderTier) -> Self {
        self.tier = tier;
        self
    }
}

//--------------------------------------  ProviderReputation  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ProviderReputation {
    pub provider_id: ProviderId,
    pub rated_jobs: i64,
    pub average_rating: f64,
    pub updated_at: DateTime<Utc>,
}

impl ProviderReputation {
    pub fn new(provider_id: ProviderId, at: DateTime<Utc>) -> Self {
        Self { provider_id, rated_jobs: 0, average_rating: 0.0, updated_at: at }
    }

    /// Folds one more rating into the running mean without revisiting earlier ratings.
    pub fn with_rating(&self, rating: u8, at: DateTime<Utc>) -> Self {
        let count = self.rated_jobs + 1;
        #[allow(clippy::cast_precision_loss)]
        let average_rating = self.average_rating + (f64::from(rating) - self.average_rating) / count as f64;
        Self { provider_id: self.provider_id.clone(), rated_jobs: count, average_rating, updated_at: at }
    }
}

//--------------------------------------   ProviderEarnings   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ProviderEarnings {
    pub provider_id: ProviderId,
    pub total_earned: Money,
    pub paid_jobs: i64,
    pub updated_at: DateTime<Utc>,
}

impl ProviderEarnings {
    pub fn new(provider_id: ProviderId, at: DateTime<Utc>) -> Self {
        Self { provider_id, total_earned: Money::default(), paid_jobs: 0, updated_at: at }
    }
}

//--------------------------------------        Rating        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Rating {
    pub id: i64,
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub customer_id: CustomerId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub customer_id: CustomerId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Upi,
    /// Collected by the provider in person. Recorded, never captured through a gateway.
    Cash,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "CARD"),
            PaymentMethod::Upi => write!(f, "UPI"),
            PaymentMethod::Cash => write!(f, "CASH"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CARD" => Ok(Self::Card),
            "UPI" => Ok(Self::Upi),
            "CASH" => Ok(Self::Cash),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Captured,
}

//--------------------------------------       Receipt        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Receipt {
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub amount: Money,
    pub method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    /// The platform's share of `amount`
    pub commission: Money,
    /// `amount` less `commission`
    pub provider_earnings: Money,
    pub gateway_reference: Option<String>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReceipt {
    pub booking_id: BookingId,
    pub provider_id: ProviderId,
    pub amount: Money,
    pub commission: Money,
    pub provider_earnings: Money,
    pub created_at: DateTime<Utc>,
}

impl NewReceipt {
    pub fn new(booking_id: BookingId, provider_id: ProviderId, amount: Money, tier: ProviderTier, at: DateTime<Utc>) -> Self {
        let commission = tier.commission_on(amount);
        let provider_earnings = amount - commission;
        Self { booking_id, provider_id, amount, commission, provider_earnings, created_at: at }
    }
}

//--------------------------------------     BookingEvent     ---------------------------------------------------------
/// One row of the lifecycle audit log. Every committed transition writes exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingEvent {
    pub id: i64,
    pub booking_id: BookingId,
    pub version: i64,
    /// `None` for the event that created the booking
    pub from_status: Option<BookingStatusType>,
    pub to_status: BookingStatusType,
    pub actor: Actor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
