mod auth;
mod bearer;
pub mod claims;
pub mod codec;
mod error;
mod routes;
mod types;

pub use auth::*;
pub use bearer::bearer_token;
pub use claims::{ClaimValue, Claims};
pub use codec::{Clock, Expiry, FixedClock, SystemClock, TokenCodec};
pub use error::*;
pub use routes::*;
pub use types::*;
