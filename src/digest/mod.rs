pub mod composer;
pub mod sender;

pub use composer::{compose, Digest};
pub use sender::{DigestSender, SendOutcome};
