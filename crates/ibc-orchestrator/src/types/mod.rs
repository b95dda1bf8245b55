// Protocol data types shared by the handshake drivers

pub mod channel;
pub mod client;
pub mod connection;
pub mod height;
pub mod msgs;

pub use channel::{Channel, Order, Packet, PacketKey};
pub use client::ClientType;
pub use connection::{ConnectionEnd, Version};
pub use height::Height;
