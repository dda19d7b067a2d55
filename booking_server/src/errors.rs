use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use booking_engine::BookingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentGatewayError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<BookingError> for ServerError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::BookingNotFound(_) | BookingError::ProviderNotFound(_) => Self::NoRecordFound(e.to_string()),
            BookingError::IllegalTransition { .. } |
            BookingError::StaleVersion { .. } |
            BookingError::DuplicateOperation(_) |
            BookingError::Conflict(_) |
            BookingError::InvalidState { .. } |
            BookingError::OfferNotPending => Self::Conflict(e.to_string()),
            BookingError::NotAssignedProvider(_) | BookingError::NotBookingCustomer(_) => {
                Self::InsufficientPermissions(e.to_string())
            },
            BookingError::InvalidInput(_) | BookingError::InvalidRating(_) => Self::InvalidRequestBody(e.to_string()),
            BookingError::PaymentCaptureFailed(_) => Self::PaymentGatewayError(e.to_string()),
            BookingError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use booking_engine::db_types::{BookingId, BookingStatusType, ProviderId};

    use super::*;

    #[test]
    fn booking_errors_map_to_status_codes() {
        let cases = [
            (BookingError::BookingNotFound(BookingId::from("b1")), StatusCode::NOT_FOUND),
            (BookingError::StaleVersion { expected: 2, actual: 3 }, StatusCode::CONFLICT),
            (
                BookingError::IllegalTransition { from: BookingStatusType::Paid, to: BookingStatusType::Cancelled },
                StatusCode::CONFLICT,
            ),
            (BookingError::NotAssignedProvider(ProviderId::from("p1")), StatusCode::FORBIDDEN),
            (BookingError::InvalidRating(9), StatusCode::BAD_REQUEST),
            (BookingError::PaymentCaptureFailed("timeout".into()), StatusCode::BAD_GATEWAY),
            (BookingError::DatabaseError("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status_code(), status);
        }
    }
}
