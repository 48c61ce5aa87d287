//! HTTP transport port and response classification

pub mod classification;
pub mod ports;

pub use classification::{classify_response, classify_transport_error, ServerErrorEnvelope};
pub use ports::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
