//! Core module - weighted draws, spin queue, viewer fan-out, winners
//!
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{BroadcastHub, SpinQueue, ProbabilityEngine};
//! ```

pub mod broadcast;
pub mod engine;
pub mod pacing;
pub mod queue;
pub mod types;
pub mod winners;

pub use broadcast::{BroadcastHub, SubscriberId, Subscription};

pub use engine::{DrawSource, ProbabilityEngine, RandomDraw, ScriptedDraw};

pub use pacing::{pacing_delay, Pacer, TokioPacer};

pub use queue::SpinQueue;

pub use types::{
    spins_for_coins, PrizeItem, QueueStatus, ServerEvent, SpinBatchRequest, Winner,
    COINS_PER_SPIN,
};

pub use winners::WinnerLog;
