//! Domain layer: records, value objects, the order state machine and the
//! ports the application layer depends on.

pub mod carrier;
pub mod clock;
pub mod code;
pub mod ids;
pub mod machine;
pub mod money;
pub mod notification;
pub mod order;
pub mod ports;
pub mod product;
pub mod wallet;
