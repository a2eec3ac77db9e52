//! Protocol module containing the transceiver's line-based text framing.

pub mod frame;

pub use frame::{encode_command, is_ack, parse_signal_frame, DeviceCommand, DeviceSetting, FrameError};
