//! Signing capabilities used to authenticate OMAPI messages.

mod authenticator;

pub use authenticator::{Authenticator, ALGORITHM_HMAC_MD5};
