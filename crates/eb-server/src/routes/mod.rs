//! Route handlers for the HTTP front door.

pub mod encode;
pub mod health;
pub mod subscribe;
