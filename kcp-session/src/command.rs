//! Wire format for control-plane commands.
//!
//! Control commands share the UDP socket with KCP data segments.  A data
//! segment always starts with its `conv`, and every valid `conv` is at least
//! [`crate::config::SessionConfig::min_conv`], so the leading 32-bit word of a
//! datagram tells the two planes apart: below the threshold it is a command
//! tag decoded here, at or above it the whole datagram belongs to the
//! reliable-delivery engine.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All integers are **little-endian**, the same order KCP uses for its own
//! segment header.
//!
//! ```text
//! ConnectReq                          [cmd: u32 = 0]              (4 bytes)
//! ConnectAck / Disconnect / Heartbeat [cmd: u32][conv: u32]       (8 bytes)
//! ```

use thiserror::Error;

/// Length of the command tag (and of a bare `ConnectReq`).
pub const TAG_LEN: usize = 4;

/// Length of a command that carries a `conv` field.
pub const COMMAND_LEN: usize = 8;

/// Control-plane command tags.
///
/// The numeric values are the on-wire tags; any other tag is rejected by
/// [`ControlCommand::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandKind {
    /// Client asks the server to allocate a session.
    ConnectReq = 0,
    /// Server answers with the allocated `conv`.
    ConnectAck = 1,
    /// Either side tears the session down.
    Disconnect = 2,
    /// Keep-alive.
    Heartbeat = 3,
}

impl CommandKind {
    /// Map a raw tag to a kind, or `None` for an unknown tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::ConnectReq),
            1 => Some(Self::ConnectAck),
            2 => Some(Self::Disconnect),
            3 => Some(Self::Heartbeat),
            _ => None,
        }
    }

    /// Whether this command carries a trailing `conv` field.
    pub fn has_conv(self) -> bool {
        self != Self::ConnectReq
    }

    /// Encoded length of a command of this kind.
    pub fn encoded_len(self) -> usize {
        if self.has_conv() {
            COMMAND_LEN
        } else {
            TAG_LEN
        }
    }
}

/// A decoded control command.
///
/// `conv` is meaningless for [`CommandKind::ConnectReq`] (the requester has no
/// session yet); it is neither written nor read for that kind and decodes as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCommand {
    pub kind: CommandKind,
    pub conv: u32,
}

impl ControlCommand {
    pub fn connect_req() -> Self {
        Self { kind: CommandKind::ConnectReq, conv: 0 }
    }

    pub fn connect_ack(conv: u32) -> Self {
        Self { kind: CommandKind::ConnectAck, conv }
    }

    pub fn disconnect(conv: u32) -> Self {
        Self { kind: CommandKind::Disconnect, conv }
    }

    pub fn heartbeat(conv: u32) -> Self {
        Self { kind: CommandKind::Heartbeat, conv }
    }

    /// Serialise into `buf`, returning the number of bytes written.
    ///
    /// Fails with [`CommandError::BufferTooSmall`] if `buf` cannot hold the
    /// encoded command; `buf` is left untouched in that case.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, CommandError> {
        let len = self.kind.encoded_len();
        if buf.len() < len {
            return Err(CommandError::BufferTooSmall { needed: len, available: buf.len() });
        }

        buf[..TAG_LEN].copy_from_slice(&(self.kind as u32).to_le_bytes());
        if self.kind.has_conv() {
            buf[TAG_LEN..COMMAND_LEN].copy_from_slice(&self.conv.to_le_bytes());
        }
        Ok(len)
    }

    /// Serialise into a newly allocated byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.kind.encoded_len()];
        // The buffer is sized from the kind, so this cannot fail.
        let n = self.encode(&mut buf).unwrap_or(0);
        buf.truncate(n);
        buf
    }

    /// Parse a command from a raw datagram.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than the 4-byte tag,
    /// - the tag is not a known [`CommandKind`], or
    /// - the kind carries a `conv` but `buf` ends before it.
    ///
    /// Trailing bytes beyond the command are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, CommandError> {
        let tag = read_u32(buf).ok_or(CommandError::Truncated { needed: TAG_LEN, got: buf.len() })?;
        let kind = CommandKind::from_tag(tag).ok_or(CommandError::InvalidCommand(tag))?;

        let conv = if kind.has_conv() {
            read_u32(&buf[TAG_LEN..])
                .ok_or(CommandError::Truncated { needed: COMMAND_LEN, got: buf.len() })?
        } else {
            0
        };

        Ok(Self { kind, conv })
    }
}

/// Read the leading little-endian `u32` of `buf`.
///
/// This is also the plane discriminator of a raw datagram: command tag for
/// control packets, `conv` for data packets.
pub fn read_u32(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Errors that can arise when encoding or parsing a control command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("command truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("unknown command tag {0}")]
    InvalidCommand(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_req_is_tag_only() {
        let mut buf = [0xAAu8; 8];
        let n = ControlCommand::connect_req().encode(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
        // Bytes past the tag are not touched.
        assert_eq!(&buf[4..], &[0xAA; 4]);
    }

    #[test]
    fn commands_with_conv_are_eight_bytes() {
        for cmd in [
            ControlCommand::connect_ack(1000),
            ControlCommand::disconnect(1000),
            ControlCommand::heartbeat(1000),
        ] {
            assert_eq!(cmd.to_bytes().len(), 8, "{cmd:?}");
        }
    }

    #[test]
    fn conv_is_little_endian_on_wire() {
        let bytes = ControlCommand::connect_ack(0x0102_0304).to_bytes();
        assert_eq!(bytes, vec![1, 0, 0, 0, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn connect_req_fits_in_four_bytes() {
        let mut buf = [0u8; 4];
        assert_eq!(ControlCommand::connect_req().encode(&mut buf), Ok(4));
    }

    #[test]
    fn encode_into_small_buffer_fails() {
        let mut buf = [0u8; 7];
        assert_eq!(
            ControlCommand::disconnect(1234).encode(&mut buf),
            Err(CommandError::BufferTooSmall { needed: 8, available: 7 })
        );
        let mut tiny = [0u8; 3];
        assert!(ControlCommand::connect_req().encode(&mut tiny).is_err());
    }

    #[test]
    fn decode_short_buffers_fail() {
        for len in 0..4 {
            let buf = vec![0u8; len];
            assert_eq!(
                ControlCommand::decode(&buf),
                Err(CommandError::Truncated { needed: 4, got: len })
            );
        }
    }

    #[test]
    fn decode_unknown_tag_fails() {
        let buf = 4u32.to_le_bytes();
        assert_eq!(ControlCommand::decode(&buf), Err(CommandError::InvalidCommand(4)));
        let buf = 999u32.to_le_bytes();
        assert_eq!(ControlCommand::decode(&buf), Err(CommandError::InvalidCommand(999)));
    }

    #[test]
    fn decode_missing_conv_fails() {
        let buf = [2u8, 0, 0, 0, 0xE8, 0x03];
        assert_eq!(
            ControlCommand::decode(&buf),
            Err(CommandError::Truncated { needed: 8, got: 6 })
        );
    }

    #[test]
    fn decode_connect_req_ignores_trailing_bytes() {
        let cmd = ControlCommand::decode(&[0, 0, 0, 0, 9, 9, 9, 9]).unwrap();
        assert_eq!(cmd, ControlCommand::connect_req());
    }

    #[test]
    fn decode_reads_back_ack() {
        let cmd = ControlCommand::decode(&ControlCommand::connect_ack(4242).to_bytes()).unwrap();
        assert_eq!(cmd.kind, CommandKind::ConnectAck);
        assert_eq!(cmd.conv, 4242);
    }

    #[test]
    fn read_u32_needs_four_bytes() {
        assert_eq!(read_u32(&[1, 2, 3]), None);
        assert_eq!(read_u32(&[0xE8, 0x03, 0, 0, 7]), Some(1000));
    }
}
