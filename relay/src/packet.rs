use crate::RelayErrors;
use byteorder::{BigEndian, ReadBytesExt};
use nalgebra::Vector3;
use rotations::prelude::UnitQuaternion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketTag {
    Command = 0x01,
    Imu = 0x02,
    RequestTelemetry = 0x03,
}

impl PacketTag {
    fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x01 => Some(PacketTag::Command),
            0x02 => Some(PacketTag::Imu),
            0x03 => Some(PacketTag::RequestTelemetry),
            _ => None,
        }
    }

    /// Payload size after the tag byte.
    fn body_len(&self) -> usize {
        match self {
            PacketTag::Command => CommandPacket::LEN,
            PacketTag::Imu => ImuPacket::LEN,
            PacketTag::RequestTelemetry => 0,
        }
    }
}

/// Command for one thruster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandPacket {
    pub index: u32,
    pub command: f64,
}

impl CommandPacket {
    pub const LEN: usize = 12;
}

/// Vehicle attitude (x, y, z, w) and body acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuPacket {
    pub attitude: UnitQuaternion,
    pub acceleration: Vector3<f64>,
}

impl ImuPacket {
    pub const LEN: usize = 56;
}

impl Default for ImuPacket {
    fn default() -> Self {
        Self {
            attitude: UnitQuaternion::IDENTITY,
            acceleration: Vector3::zeros(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Command(CommandPacket),
    Imu(ImuPacket),
    RequestTelemetry,
}

impl Packet {
    pub fn tag(&self) -> PacketTag {
        match self {
            Packet::Command(_) => PacketTag::Command,
            Packet::Imu(_) => PacketTag::Imu,
            Packet::RequestTelemetry => PacketTag::RequestTelemetry,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let tag = self.tag();
        let mut buf = Vec::with_capacity(1 + tag.body_len());
        buf.push(tag as u8);
        match self {
            Packet::Command(p) => {
                buf.extend_from_slice(&p.index.to_be_bytes());
                buf.extend_from_slice(&p.command.to_be_bytes());
            }
            Packet::Imu(p) => {
                let q = p.attitude.0;
                for v in [q.x, q.y, q.z, q.w].iter().chain(p.acceleration.iter()) {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            Packet::RequestTelemetry => {}
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, RelayErrors> {
        let (&tag_byte, mut body) = bytes.split_first().ok_or(RelayErrors::EmptyPacket)?;
        let tag = PacketTag::from_u8(tag_byte).ok_or(RelayErrors::UnknownTag(tag_byte))?;
        if body.len() != tag.body_len() {
            return Err(RelayErrors::BadLength(tag_byte, tag.body_len(), body.len()));
        }

        let packet = match tag {
            PacketTag::Command => {
                let index = body.read_u32::<BigEndian>()?;
                let command = body.read_f64::<BigEndian>()?;
                if !command.is_finite() {
                    return Err(RelayErrors::NonFinite);
                }
                Packet::Command(CommandPacket { index, command })
            }
            PacketTag::Imu => {
                let mut v = [0.0; 7];
                for value in &mut v {
                    *value = body.read_f64::<BigEndian>()?;
                }
                if !v.iter().all(|x| x.is_finite()) {
                    return Err(RelayErrors::NonFinite);
                }
                Packet::Imu(ImuPacket {
                    attitude: UnitQuaternion::new(v[0], v[1], v[2], v[3])?,
                    acceleration: Vector3::new(v[4], v[5], v[6]),
                })
            }
            PacketTag::RequestTelemetry => Packet::RequestTelemetry,
        };
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_layout() {
        let bytes = Packet::Command(CommandPacket {
            index: 2,
            command: -0.25,
        })
        .encode();
        assert_eq!(bytes.len(), 1 + CommandPacket::LEN);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 2]);
        assert_eq!(&bytes[5..], &(-0.25f64).to_be_bytes());
    }

    #[test]
    fn test_imu_decode() {
        let packet = Packet::Imu(ImuPacket {
            attitude: UnitQuaternion::from_yaw(0.3),
            acceleration: Vector3::new(0.5, -1.0, 9.8),
        });
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 1 + ImuPacket::LEN);
        assert_eq!(&bytes[25..33], &UnitQuaternion::from_yaw(0.3).0.w.to_be_bytes());
        assert_eq!(&bytes[49..], &9.8f64.to_be_bytes());
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_malformed_packets() {
        assert!(matches!(Packet::decode(&[]), Err(RelayErrors::EmptyPacket)));
        assert!(matches!(
            Packet::decode(&[0x7f]),
            Err(RelayErrors::UnknownTag(0x7f))
        ));
        assert!(matches!(
            Packet::decode(&[0x01, 0, 0]),
            Err(RelayErrors::BadLength(0x01, 12, 2))
        ));
        let mut zero_quat = vec![0x02];
        zero_quat.extend(std::iter::repeat_n(0u8, ImuPacket::LEN));
        assert!(matches!(
            Packet::decode(&zero_quat),
            Err(RelayErrors::Quaternion(_))
        ));
    }
}
