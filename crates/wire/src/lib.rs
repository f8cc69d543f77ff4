//! Wire types of the streamed read protocol
//!
//! A read call produces one or more [`ReadResponse`] messages. Each message
//! is an ordered list of [`Frame`]s: a series header followed by the points
//! frames of that series, then the next series, and so on. A series whose
//! points do not fit in one message continues in the next message with
//! points frames only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod frame;

pub use codec::{decode_message, encode_message, read_message, write_message, MAX_MESSAGE_LEN};
pub use frame::{FloatPointsFrame, Frame, FrameKind, IntegerPointsFrame, ReadResponse, SeriesFrame};
