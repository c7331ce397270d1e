// restmodel-api: transport contract and reqwest-backed HTTP transport

pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use error::Error;
pub use http::HttpTransport;
pub use request::{Body, HttpRequest, HttpResponse, Method, encode_pairs};
pub use transport::{TlsMode, Transport, TransportConfig};
