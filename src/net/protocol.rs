use std::io::{Cursor, Error, ErrorKind, Read, Result};

pub type EntityId = u32;

/// Wire packets for pose synchronization. Every packet is framed with a
/// u16 little-endian length prefix covering the id byte and payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Hello {
        username: String,
    },
    HelloAck {
        entity_id: EntityId,
    },
    /// Animation state of one entity: where it stands, which keyframe
    /// pair it is blending and how far along the blend is.
    Pose {
        entity_id: EntityId,
        x: f32,
        y: f32,
        z: f32,
        yaw: f32,
        frame: u16,
        next_frame: u16,
        factor: f32,
    },
    Disconnect {
        entity_id: EntityId,
    },
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
}

impl Packet {
    fn packet_id(&self) -> u8 {
        match self {
            Packet::Hello { .. } => 0x01,
            Packet::HelloAck { .. } => 0x02,
            Packet::Pose { .. } => 0x10,
            Packet::Disconnect { .. } => 0x40,
            Packet::Ping { .. } => 0xFE,
            Packet::Pong { .. } => 0xFF,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.push(self.packet_id());

        match self {
            Packet::Hello { username } => {
                write_string(&mut buf, username);
            }
            Packet::HelloAck { entity_id } => {
                buf.extend_from_slice(&entity_id.to_le_bytes());
            }
            Packet::Pose {
                entity_id,
                x,
                y,
                z,
                yaw,
                frame,
                next_frame,
                factor,
            } => {
                buf.extend_from_slice(&entity_id.to_le_bytes());
                buf.extend_from_slice(&x.to_le_bytes());
                buf.extend_from_slice(&y.to_le_bytes());
                buf.extend_from_slice(&z.to_le_bytes());
                buf.extend_from_slice(&yaw.to_le_bytes());
                buf.extend_from_slice(&frame.to_le_bytes());
                buf.extend_from_slice(&next_frame.to_le_bytes());
                buf.extend_from_slice(&factor.to_le_bytes());
            }
            Packet::Disconnect { entity_id } => {
                buf.extend_from_slice(&entity_id.to_le_bytes());
            }
            Packet::Ping { timestamp } | Packet::Pong { timestamp } => {
                buf.extend_from_slice(&timestamp.to_le_bytes());
            }
        }

        let len = buf.len() as u16;
        let mut result = Vec::with_capacity(2 + buf.len());
        result.extend_from_slice(&len.to_le_bytes());
        result.extend(buf);
        result
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(Error::new(ErrorKind::InvalidData, "Packet too short"));
        }

        let mut cursor = Cursor::new(data);

        let mut len_bytes = [0u8; 2];
        cursor.read_exact(&mut len_bytes)?;
        let _len = u16::from_le_bytes(len_bytes);
        let mut id = [0u8; 1];
        cursor.read_exact(&mut id)?;

        match id[0] {
            0x01 => {
                let username = read_string(&mut cursor)?;
                Ok(Packet::Hello { username })
            }
            0x02 => {
                let entity_id = read_u32(&mut cursor)?;
                Ok(Packet::HelloAck { entity_id })
            }
            0x10 => {
                let entity_id = read_u32(&mut cursor)?;
                let x = read_f32(&mut cursor)?;
                let y = read_f32(&mut cursor)?;
                let z = read_f32(&mut cursor)?;
                let yaw = read_f32(&mut cursor)?;
                let frame = read_u16(&mut cursor)?;
                let next_frame = read_u16(&mut cursor)?;
                let factor = read_f32(&mut cursor)?;
                Ok(Packet::Pose {
                    entity_id,
                    x,
                    y,
                    z,
                    yaw,
                    frame,
                    next_frame,
                    factor,
                })
            }
            0x40 => {
                let entity_id = read_u32(&mut cursor)?;
                Ok(Packet::Disconnect { entity_id })
            }
            0xFE => {
                let timestamp = read_u64(&mut cursor)?;
                Ok(Packet::Ping { timestamp })
            }
            0xFF => {
                let timestamp = read_u64(&mut cursor)?;
                Ok(Packet::Pong { timestamp })
            }
            _ => Err(Error::new(ErrorKind::InvalidData, "Unknown packet ID")),
        }
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let mut len_bytes = [0u8; 2];
    cursor.read_exact(&mut len_bytes)?;
    let len = u16::from_le_bytes(len_bytes) as usize;

    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;

    String::from_utf8(buf).map_err(|_| Error::new(ErrorKind::InvalidData, "Invalid UTF-8"))
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16> {
    let mut bytes = [0u8; 2];
    cursor.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    let mut bytes = [0u8; 4];
    cursor.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut bytes = [0u8; 8];
    cursor.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn read_f32(cursor: &mut Cursor<&[u8]>) -> Result<f32> {
    let mut bytes = [0u8; 4];
    cursor.read_exact(&mut bytes)?;
    Ok(f32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_roundtrip() {
        let packet = Packet::Pose {
            entity_id: 7,
            x: 1.5,
            y: -2.0,
            z: 10.25,
            yaw: 1.2,
            frame: 3,
            next_frame: 4,
            factor: 0.75,
        };

        let bytes = packet.to_bytes();
        let decoded = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_hello_roundtrip() {
        let packet = Packet::Hello {
            username: "player one".to_string(),
        };
        let decoded = Packet::from_bytes(&packet.to_bytes()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_length_prefix_matches_body() {
        let packet = Packet::HelloAck { entity_id: 42 };
        let bytes = packet.to_bytes();
        let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        assert_eq!(len, bytes.len() - 2);
    }

    #[test]
    fn test_unknown_id_rejected() {
        let bytes = vec![1, 0, 0x77];
        assert!(Packet::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let packet = Packet::Ping { timestamp: 123456 };
        let bytes = packet.to_bytes();
        assert!(Packet::from_bytes(&bytes[..bytes.len() - 2]).is_err());
        assert!(Packet::from_bytes(&[]).is_err());
    }
}
