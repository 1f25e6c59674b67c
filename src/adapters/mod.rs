//! Live event adapters
//!
//! The live stream connector itself (transport, auth, reconnects) runs
//! outside this crate and feeds typed `LiveEvent`s into `GiftIntake`.

pub mod intake;
pub mod types;

pub use intake::{GiftIntake, MANUAL_GIFT_LABEL};
pub use types::{ConnectionState, GiftNotification, LiveEvent, NormalizedGift};
