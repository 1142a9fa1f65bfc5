pub mod auth_gate;
pub mod auto_auth_session;
pub mod download;
pub mod dto;
pub mod formulary_session;
pub mod token;
pub mod transport;
pub mod urls;

pub use auth_gate::{AuthGate, AuthMarkerStore, AuthState};
pub use auto_auth_session::AutoAuthSession;
pub use download::Download;
pub use formulary_session::FormularySession;
pub use token::{CommandTokenSource, TokenSource};
pub use transport::{ApiTransport, HttpTransport, RequestDescriptor, UploadFile};
pub use urls::*;
