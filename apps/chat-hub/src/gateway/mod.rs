pub mod connection;
pub mod events;
pub mod hub;
pub mod pump;
pub mod server;
