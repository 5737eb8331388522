//! # ouro-net
//!
//! A socket listener driven by an [`ouro::Ring`]: the listening
//! descriptor is watched with poll-add entries, ready sockets are
//! accepted and handed to the caller as a stream of connections, and the
//! poll is re-armed for the next arrival.

mod listener;
mod stream;

pub use listener::{Incoming, ListenOptions, RingListener};
pub use stream::RingStream;
