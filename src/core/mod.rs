pub mod dump;
pub mod error;
pub mod message;
pub mod metadata;
pub mod time;
