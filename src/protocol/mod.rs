//! Wire protocol spoken with the analysis server.
//!
//! - `codec`: [`ContentLengthCodec`](codec::ContentLengthCodec), header-framed
//!   JSON messages for [`tokio_util::codec::Framed`].
//! - `client`: [`Connection`](client::Connection) with `send`, bounded
//!   `receive` and `wait_for_method`.

pub mod client;
pub mod codec;

pub use client::{connect, connect_timeout, Connection};
pub use codec::ContentLengthCodec;
