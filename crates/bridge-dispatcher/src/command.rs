//! Channel 2's in-band command subprotocol: right now, just "what is
//! the MCU's address?".

use bridge_core::constants::{CMD_OPCODE_ADDRESS_REPLY, CMD_OPCODE_GET_ADDRESS, IPV6_ADDR_LEN};
use std::net::Ipv6Addr;

/// Builds the payload for a GET_ADDRESS request.
#[must_use]
pub fn get_address_request() -> Vec<u8> {
    vec![CMD_OPCODE_GET_ADDRESS]
}

/// Builds the payload for an ADDRESS_REPLY carrying `addr`.
#[must_use]
pub fn address_reply(addr: Ipv6Addr) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + IPV6_ADDR_LEN);
    out.push(CMD_OPCODE_ADDRESS_REPLY);
    out.extend_from_slice(&addr.octets());
    out
}

/// A decoded command-channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMessage {
    GetAddress,
    AddressReply(Ipv6Addr),
    Unknown(u8),
}

/// Parses a payload received on the command channel.
#[must_use]
pub fn parse(payload: &[u8]) -> Option<CommandMessage> {
    let (&opcode, rest) = payload.split_first()?;
    match opcode {
        CMD_OPCODE_GET_ADDRESS => Some(CommandMessage::GetAddress),
        CMD_OPCODE_ADDRESS_REPLY => {
            let octets: [u8; IPV6_ADDR_LEN] = rest.get(..IPV6_ADDR_LEN)?.try_into().ok()?;
            Some(CommandMessage::AddressReply(Ipv6Addr::from(octets)))
        }
        other => Some(CommandMessage::Unknown(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_address_request_is_one_byte() {
        assert_eq!(get_address_request(), vec![CMD_OPCODE_GET_ADDRESS]);
    }

    #[test]
    fn address_reply_round_trips() {
        let addr: Ipv6Addr = "fd00::1".parse().unwrap();
        let payload = address_reply(addr);
        assert_eq!(parse(&payload), Some(CommandMessage::AddressReply(addr)));
    }

    #[test]
    fn get_address_round_trips() {
        let payload = get_address_request();
        assert_eq!(parse(&payload), Some(CommandMessage::GetAddress));
    }

    #[test]
    fn truncated_address_reply_is_rejected() {
        let payload = vec![CMD_OPCODE_ADDRESS_REPLY, 0, 1, 2];
        assert_eq!(parse(&payload), None);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(parse(&[]), None);
    }

    #[test]
    fn unrecognized_opcode_is_unknown() {
        assert_eq!(parse(&[0xFF]), Some(CommandMessage::Unknown(0xFF)));
    }
}
