//! Additive packet checksum shared by both entities.

use sr_lab_abstract::Packet;

/// Contribution of an absent header field (the classic `-1` sentinel).
const NOT_IN_USE: u32 = u32::MAX;

fn field(value: Option<u32>) -> u32 {
    value.unwrap_or(NOT_IN_USE)
}

/// Wrapping sum of the sequence field, the ACK field and every payload byte.
pub fn compute_checksum(packet: &Packet) -> u32 {
    packet
        .payload
        .iter()
        .fold(field(packet.seq_num).wrapping_add(field(packet.ack_num)), |sum, &b| {
            sum.wrapping_add(u32::from(b))
        })
}

/// Stamp `packet` with its checksum.
pub fn seal(mut packet: Packet) -> Packet {
    packet.checksum = compute_checksum(&packet);
    packet
}

pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute_checksum(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_lab_abstract::PAYLOAD_SIZE;

    #[test]
    fn matches_classic_arithmetic() {
        // seq 3 + ack -1 + 20 * 'a'
        let packet = Packet::data(3, [b'a'; PAYLOAD_SIZE]);
        let expected = (3i64 - 1 + 20 * i64::from(b'a')) as u32;
        assert_eq!(compute_checksum(&packet), expected);

        // seq -1 + ack 5 + 20 * '0'
        let ack = Packet::ack(5);
        let expected = (-1i64 + 5 + 20 * i64::from(b'0')) as u32;
        assert_eq!(compute_checksum(&ack), expected);
    }

    #[test]
    fn sealed_packet_is_intact() {
        let packet = seal(Packet::data(11, *b"abcdefghijklmnopqrst"));
        assert!(!is_corrupted(&packet));
    }

    #[test]
    fn any_field_change_is_detected() {
        let packet = seal(Packet::data(11, *b"abcdefghijklmnopqrst"));

        let mut payload = packet.clone();
        payload.payload[0] = b'Z';
        assert!(is_corrupted(&payload));

        let mut seq = packet.clone();
        seq.seq_num = Some(12);
        assert!(is_corrupted(&seq));

        let mut ack = packet.clone();
        ack.ack_num = Some(0);
        assert!(is_corrupted(&ack));

        let ack = seal(Packet::ack(4));
        let mut bad_ack = ack.clone();
        bad_ack.ack_num = Some(999_999);
        assert!(is_corrupted(&bad_ack));
    }
}
