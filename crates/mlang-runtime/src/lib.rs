//! mlang runtime
//!
//! The library that code emitted by the mlang compiler links against.
//!
//! - [`Value`]: dynamic values
//! - [`pack`], [`unpack`], [`convert`]: the serialization contract driven by
//!   coercion plans
//! - [`Port`]: communication nodes with two-phase rendezvous
//! - [`Unit`]: party token and guarded-choice random source of one automaton
//! - [`TaskGroup`]: structured concurrency scope of a system
//!
//! Emitted code imports [`prelude`].

mod error;
mod port;
mod serial;
mod task;
mod unit;
mod value;

pub use error::{Result, RuntimeError};
pub use mlang_core::Coercion;
pub use port::Port;
pub use serial::{Packed, convert, pack, pack_key, unpack};
pub use task::TaskGroup;
pub use unit::{PartyId, Unit};
pub use value::Value;

/// Everything emitted code refers to.
pub mod prelude {
    pub use crate::{
        Coercion, PartyId, Port, RuntimeError, TaskGroup, Unit, Value, convert, pack, unpack,
    };
}
