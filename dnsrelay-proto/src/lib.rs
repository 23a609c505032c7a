pub mod buffer;
pub mod packet;

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::buffer::BytePacketBuffer;
    use crate::packet::{question::Question, record::Record, DnsPacket, QueryType};

    #[test]
    fn should_round_trip_a_query_packet() {
        let mut packet = DnsPacket {
            questions: vec![Question {
                name: "google.com".into(),
                qtype: QueryType::A,
                qclass: crate::packet::question::DnsClass::Internet,
            }],
            ..Default::default()
        };
        packet.header.id = 38005;
        packet.header.recursion_desired = true;

        let mut buffer = packet.clone().create_buffer().unwrap();
        buffer.pos = 0;

        let decoded = DnsPacket::try_from(buffer).unwrap();
        assert_eq!(decoded.header.id, 38005);
        assert!(decoded.header.recursion_desired);
        assert!(!decoded.header.truncated_message);
        assert_eq!(decoded.questions.len(), 1);
        assert_eq!(decoded.questions[0].name, "google.com");
        assert_eq!(decoded.questions[0].qtype, QueryType::A);
        assert!(decoded.answers.is_empty());
    }

    #[test]
    fn should_round_trip_a_cname_chain_response() {
        let mut packet = DnsPacket {
            questions: vec![Question {
                name: "app.example.com".into(),
                qtype: QueryType::A,
                qclass: crate::packet::question::DnsClass::Internet,
            }],
            answers: vec![
                Record::CNAME {
                    domain: "app.example.com".into(),
                    host: "lb.example.com".into(),
                    ttl: 39,
                },
                Record::A {
                    domain: "lb.example.com".into(),
                    addr: Ipv4Addr::new(3, 233, 151, 184),
                    ttl: 60,
                },
            ],
            ..Default::default()
        };
        packet.header.id = 45838;
        packet.header.response = true;
        packet.header.recursion_desired = true;
        packet.header.recursion_available = true;

        let mut buffer = packet.clone().create_buffer().unwrap();
        buffer.pos = 0;

        let decoded = DnsPacket::try_from(buffer).unwrap();
        assert_eq!(decoded.answers.len(), 2);
        assert_eq!(decoded.answers, packet.answers);
    }
}
