//! # Booking server
//! The HTTP front end for the booking engine. It is responsible for:
//! Accepting booking requests from customers and offer responses from providers.
//! Streaming live booking status to anyone who is watching a booking.
//! Expiring dispatch rounds that nobody accepted in time.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/bookings/...`: The booking lifecycle. Creating, accepting, handing off, completing, paying and rating.
//! * `/providers/...`: The provider directory, a provider's offer inbox and reputation.
//!
//! Identity is taken from the request body or query string. Authentication is left to whatever sits in front of the
//! server.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod dispatch_sweeper;
pub mod errors;
pub mod notifications;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
