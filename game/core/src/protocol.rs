use crate::math::Vec2;
use flint::logging::{self, Logger};
use flint::{ObjectId, SessionId};
use harrow::net::codec::{CodecError, CodecResult, PayloadReader, PayloadWriter};
use harrow::net::packet::{Packet, PacketHeader, PacketPool};
use harrow::net::session::SessionRegistry;
use harrow::net::shared::MAX_PACKET_SIZE;

/// Authoritative protocol ids. The wire header carries these as u16.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u16)]
pub enum PacketId {
    CLogin = 100,
    SLogin = 101,
    CCreateRoom = 102,
    SCreateRoom = 103,
    CJoinRoom = 104,
    SJoinRoom = 105,
    CLeaveRoom = 112,
    SLeaveRoom = 113,
    CChat = 120,
    SChat = 121,
    SSpawnObject = 200,
    SDespawnObject = 201,
    SMoveObjectBatch = 202,
    CMove = 203,
    CUseSkill = 300,
    SSkillEffect = 301,
    SDamageEffect = 302,
    SPlayerDowned = 303,
    SPlayerRevive = 304,
    SExpChange = 400,
    SLevelUpOption = 401,
    CSelectLevelUp = 402,
    SGameWin = 500,
    SGameOver = 501,
}

/// A hand-encoded wire message. The body layout is little-endian and
/// packed; `byte_size` must match what `encode` writes exactly, because
/// packet buffers are sized from it.
pub trait Message: Sized {
    const ID: PacketId;

    fn byte_size(&self) -> usize;
    fn encode(&self, writer: &mut PayloadWriter<'_>) -> CodecResult<()>;
    fn decode(reader: &mut PayloadReader<'_>) -> CodecResult<Self>;
}

#[inline]
fn str_size(value: &str) -> usize {
    2 + value.len()
}

/// Frames `msg` into a pooled packet. `None` on pool exhaustion (a
/// resource condition the caller handles). A body that would exceed
/// [`MAX_PACKET_SIZE`] is a serialization bug, not a runtime condition,
/// and takes the process down.
pub fn build_packet<M: Message>(pool: &PacketPool, msg: &M) -> Option<Packet> {
    let total = PacketHeader::SIZE + msg.byte_size();
    if total > MAX_PACKET_SIZE {
        panic!(
            "serialized message {:?} is {} bytes, over the {} byte wire limit",
            M::ID,
            total,
            MAX_PACKET_SIZE
        );
    }

    let mut buf = pool.acquire(total)?;

    PacketHeader {
        size: total as u16,
        id: M::ID as u16,
    }
    .write_to(buf.as_mut());

    let mut writer = PayloadWriter::new(&mut buf.as_mut()[PacketHeader::SIZE..]);
    msg.encode(&mut writer).expect("buffer sized from byte_size");
    debug_assert_eq!(writer.position() + PacketHeader::SIZE, total);

    buf.set_used(total);
    Some(buf.freeze())
}

/// Builds and queues `msg` for one session. False when the session is gone
/// or the pool is exhausted; both are logged, neither is fatal.
pub fn send_to_session<M: Message>(
    sessions: &SessionRegistry,
    pool: &PacketPool,
    session_id: SessionId,
    msg: &M,
    log: &Logger,
) -> bool {
    let Some(packet) = build_packet(pool, msg) else {
        logging::warn!(log, "packet pool exhausted, response dropped";
                       "packet_id" => ?M::ID,
                       "session_id" => session_id);
        return false;
    };

    sessions
        .with_session(session_id, |session| session.send(packet.clone()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Shared wire fragments

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectInfo {
    pub object_id: ObjectId,
    pub kind: u8,
    pub type_id: i32,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
}

impl ObjectInfo {
    const SIZE: usize = 25;

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)?;
        w.put_u8(self.kind)?;
        w.put_i32(self.type_id)?;
        w.put_f32(self.x)?;
        w.put_f32(self.y)?;
        w.put_i32(self.hp)?;
        w.put_i32(self.max_hp)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<ObjectInfo> {
        Ok(ObjectInfo {
            object_id: r.get_i32()?,
            kind: r.get_u8()?,
            type_id: r.get_i32()?,
            x: r.get_f32()?,
            y: r.get_f32()?,
            hp: r.get_i32()?,
            max_hp: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectPos {
    pub object_id: ObjectId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl ObjectPos {
    const SIZE: usize = 20;

    pub fn new(object_id: ObjectId, pos: Vec2, velocity: Vec2) -> ObjectPos {
        ObjectPos {
            object_id,
            x: pos.x,
            y: pos.y,
            vx: velocity.x,
            vy: velocity.y,
        }
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)?;
        w.put_f32(self.x)?;
        w.put_f32(self.y)?;
        w.put_f32(self.vx)?;
        w.put_f32(self.vy)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<ObjectPos> {
        Ok(ObjectPos {
            object_id: r.get_i32()?,
            x: r.get_f32()?,
            y: r.get_f32()?,
            vx: r.get_f32()?,
            vy: r.get_f32()?,
        })
    }
}

fn encode_count(w: &mut PayloadWriter<'_>, len: usize) -> CodecResult<()> {
    if len > u16::MAX as usize {
        return Err(CodecError::Overflow);
    }
    w.put_u16(len as u16)
}

// ---------------------------------------------------------------------------
// Client -> server

#[derive(Debug, Clone, PartialEq)]
pub struct CLogin {
    pub username: String,
    pub password: String,
}

impl Message for CLogin {
    const ID: PacketId = PacketId::CLogin;

    fn byte_size(&self) -> usize {
        str_size(&self.username) + str_size(&self.password)
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_str(&self.username)?;
        w.put_str(&self.password)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CLogin {
            username: r.get_str()?,
            password: r.get_str()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CCreateRoom {
    pub title: String,
}

impl Message for CCreateRoom {
    const ID: PacketId = PacketId::CCreateRoom;

    fn byte_size(&self) -> usize {
        str_size(&self.title)
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_str(&self.title)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CCreateRoom { title: r.get_str()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CJoinRoom {
    pub room_id: i32,
}

impl Message for CJoinRoom {
    const ID: PacketId = PacketId::CJoinRoom;

    fn byte_size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.room_id)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CJoinRoom {
            room_id: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CLeaveRoom;

impl Message for CLeaveRoom {
    const ID: PacketId = PacketId::CLeaveRoom;

    fn byte_size(&self) -> usize {
        0
    }

    fn encode(&self, _w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        Ok(())
    }

    fn decode(_r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CLeaveRoom)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CChat {
    pub message: String,
}

impl Message for CChat {
    const ID: PacketId = PacketId::CChat;

    fn byte_size(&self) -> usize {
        str_size(&self.message)
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_str(&self.message)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CChat {
            message: r.get_str()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CMove {
    pub dir_x: f32,
    pub dir_y: f32,
}

impl Message for CMove {
    const ID: PacketId = PacketId::CMove;

    fn byte_size(&self) -> usize {
        8
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_f32(self.dir_x)?;
        w.put_f32(self.dir_y)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CMove {
            dir_x: r.get_f32()?,
            dir_y: r.get_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CUseSkill {
    pub skill_id: i32,
}

impl Message for CUseSkill {
    const ID: PacketId = PacketId::CUseSkill;

    fn byte_size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.skill_id)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CUseSkill {
            skill_id: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CSelectLevelUp {
    pub option_id: i32,
}

impl Message for CSelectLevelUp {
    const ID: PacketId = PacketId::CSelectLevelUp;

    fn byte_size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.option_id)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(CSelectLevelUp {
            option_id: r.get_i32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Server -> client

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SLogin {
    pub success: bool,
    pub user_id: i64,
    pub map_width: f32,
    pub map_height: f32,
}

impl Message for SLogin {
    const ID: PacketId = PacketId::SLogin;

    fn byte_size(&self) -> usize {
        17
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_u8(self.success as u8)?;
        w.put_i64(self.user_id)?;
        w.put_f32(self.map_width)?;
        w.put_f32(self.map_height)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SLogin {
            success: r.get_u8()? != 0,
            user_id: r.get_i64()?,
            map_width: r.get_f32()?,
            map_height: r.get_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SCreateRoom {
    pub success: bool,
    pub room_id: i32,
}

impl Message for SCreateRoom {
    const ID: PacketId = PacketId::SCreateRoom;

    fn byte_size(&self) -> usize {
        5
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_u8(self.success as u8)?;
        w.put_i32(self.room_id)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SCreateRoom {
            success: r.get_u8()? != 0,
            room_id: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SJoinRoom {
    pub success: bool,
    pub room_id: i32,
    pub my_object_id: ObjectId,
}

impl Message for SJoinRoom {
    const ID: PacketId = PacketId::SJoinRoom;

    fn byte_size(&self) -> usize {
        9
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_u8(self.success as u8)?;
        w.put_i32(self.room_id)?;
        w.put_i32(self.my_object_id)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SJoinRoom {
            success: r.get_u8()? != 0,
            room_id: r.get_i32()?,
            my_object_id: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SLeaveRoom {
    pub success: bool,
}

impl Message for SLeaveRoom {
    const ID: PacketId = PacketId::SLeaveRoom;

    fn byte_size(&self) -> usize {
        1
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_u8(self.success as u8)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SLeaveRoom {
            success: r.get_u8()? != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SChat {
    pub object_id: ObjectId,
    pub message: String,
}

impl Message for SChat {
    const ID: PacketId = PacketId::SChat;

    fn byte_size(&self) -> usize {
        4 + str_size(&self.message)
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)?;
        w.put_str(&self.message)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SChat {
            object_id: r.get_i32()?,
            message: r.get_str()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SSpawnObject {
    pub objects: Vec<ObjectInfo>,
}

impl Message for SSpawnObject {
    const ID: PacketId = PacketId::SSpawnObject;

    fn byte_size(&self) -> usize {
        2 + self.objects.len() * ObjectInfo::SIZE
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        encode_count(w, self.objects.len())?;
        for object in &self.objects {
            object.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        let count = r.get_u16()? as usize;
        let mut objects = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            objects.push(ObjectInfo::decode(r)?);
        }
        Ok(SSpawnObject { objects })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SDespawnObject {
    pub object_ids: Vec<ObjectId>,
}

impl Message for SDespawnObject {
    const ID: PacketId = PacketId::SDespawnObject;

    fn byte_size(&self) -> usize {
        2 + self.object_ids.len() * 4
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        encode_count(w, self.object_ids.len())?;
        for id in &self.object_ids {
            w.put_i32(*id)?;
        }
        Ok(())
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        let count = r.get_u16()? as usize;
        let mut object_ids = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            object_ids.push(r.get_i32()?);
        }
        Ok(SDespawnObject { object_ids })
    }
}

/// All movement of one tick, batched into a single broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct SMoveObjectBatch {
    pub moves: Vec<ObjectPos>,
}

impl Message for SMoveObjectBatch {
    const ID: PacketId = PacketId::SMoveObjectBatch;

    fn byte_size(&self) -> usize {
        2 + self.moves.len() * ObjectPos::SIZE
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        encode_count(w, self.moves.len())?;
        for entry in &self.moves {
            entry.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        let count = r.get_u16()? as usize;
        let mut moves = Vec::with_capacity(count.min(512));
        for _ in 0..count {
            moves.push(ObjectPos::decode(r)?);
        }
        Ok(SMoveObjectBatch { moves })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SSkillEffect {
    pub caster_id: ObjectId,
    pub skill_id: i32,
    pub x: f32,
    pub y: f32,
}

impl Message for SSkillEffect {
    const ID: PacketId = PacketId::SSkillEffect;

    fn byte_size(&self) -> usize {
        16
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.caster_id)?;
        w.put_i32(self.skill_id)?;
        w.put_f32(self.x)?;
        w.put_f32(self.y)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SSkillEffect {
            caster_id: r.get_i32()?,
            skill_id: r.get_i32()?,
            x: r.get_f32()?,
            y: r.get_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SDamageEffect {
    pub object_id: ObjectId,
    pub damage: i32,
    pub hp: i32,
}

impl Message for SDamageEffect {
    const ID: PacketId = PacketId::SDamageEffect;

    fn byte_size(&self) -> usize {
        12
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)?;
        w.put_i32(self.damage)?;
        w.put_i32(self.hp)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SDamageEffect {
            object_id: r.get_i32()?,
            damage: r.get_i32()?,
            hp: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SPlayerDowned {
    pub object_id: ObjectId,
}

impl Message for SPlayerDowned {
    const ID: PacketId = PacketId::SPlayerDowned;

    fn byte_size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SPlayerDowned {
            object_id: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SPlayerRevive {
    pub object_id: ObjectId,
    pub hp: i32,
}

impl Message for SPlayerRevive {
    const ID: PacketId = PacketId::SPlayerRevive;

    fn byte_size(&self) -> usize {
        8
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)?;
        w.put_i32(self.hp)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SPlayerRevive {
            object_id: r.get_i32()?,
            hp: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SExpChange {
    pub object_id: ObjectId,
    pub exp: i32,
    pub level: i32,
}

impl Message for SExpChange {
    const ID: PacketId = PacketId::SExpChange;

    fn byte_size(&self) -> usize {
        12
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        w.put_i32(self.object_id)?;
        w.put_i32(self.exp)?;
        w.put_i32(self.level)
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SExpChange {
            object_id: r.get_i32()?,
            exp: r.get_i32()?,
            level: r.get_i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SLevelUpOption {
    pub options: Vec<i32>,
}

impl Message for SLevelUpOption {
    const ID: PacketId = PacketId::SLevelUpOption;

    fn byte_size(&self) -> usize {
        2 + self.options.len() * 4
    }

    fn encode(&self, w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        encode_count(w, self.options.len())?;
        for option in &self.options {
            w.put_i32(*option)?;
        }
        Ok(())
    }

    fn decode(r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        let count = r.get_u16()? as usize;
        let mut options = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            options.push(r.get_i32()?);
        }
        Ok(SLevelUpOption { options })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SGameWin;

impl Message for SGameWin {
    const ID: PacketId = PacketId::SGameWin;

    fn byte_size(&self) -> usize {
        0
    }

    fn encode(&self, _w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        Ok(())
    }

    fn decode(_r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SGameWin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SGameOver;

impl Message for SGameOver {
    const ID: PacketId = PacketId::SGameOver;

    fn byte_size(&self) -> usize {
        0
    }

    fn encode(&self, _w: &mut PayloadWriter<'_>) -> CodecResult<()> {
        Ok(())
    }

    fn decode(_r: &mut PayloadReader<'_>) -> CodecResult<Self> {
        Ok(SGameOver)
    }
}

/// Decodes a message body, logging and discarding malformed payloads.
pub fn decode_body<M: Message>(body: &[u8], log: &Logger) -> Option<M> {
    let mut reader = PayloadReader::new(body);
    match M::decode(&mut reader) {
        Ok(msg) => Some(msg),
        Err(err) => {
            logging::warn!(log, "malformed payload dropped";
                           "packet_id" => ?M::ID,
                           "error" => ?err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<M: Message + PartialEq + std::fmt::Debug>(msg: M) {
        let pool = PacketPool::new(8);
        let packet = build_packet(&pool, &msg).unwrap();

        let header = packet.header().unwrap();
        assert_eq!(header.id, M::ID as u16);
        assert_eq!(header.size as usize, packet.bytes().len());

        let mut reader = PayloadReader::new(packet.body());
        let decoded = M::decode(&mut reader).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(reader.remaining(), 0, "byte_size must match encode exactly");
    }

    #[test]
    fn test_login_messages() {
        roundtrip(CLogin {
            username: "alice".to_string(),
            password: "x".to_string(),
        });
        roundtrip(SLogin {
            success: true,
            user_id: 42,
            map_width: 4000.0,
            map_height: 4000.0,
        });
    }

    #[test]
    fn test_room_messages() {
        roundtrip(CCreateRoom {
            title: "midnight run".to_string(),
        });
        roundtrip(SCreateRoom {
            success: true,
            room_id: 2,
        });
        roundtrip(CJoinRoom { room_id: 2 });
        roundtrip(SJoinRoom {
            success: true,
            room_id: 2,
            my_object_id: 1,
        });
        roundtrip(CLeaveRoom);
        roundtrip(SLeaveRoom { success: true });
    }

    #[test]
    fn test_movement_batch() {
        roundtrip(CMove {
            dir_x: 1.0,
            dir_y: 0.0,
        });
        roundtrip(SMoveObjectBatch {
            moves: vec![
                ObjectPos {
                    object_id: 1,
                    x: 10.0,
                    y: 0.0,
                    vx: 200.0,
                    vy: 0.0,
                },
                ObjectPos {
                    object_id: 9,
                    x: -3.5,
                    y: 7.25,
                    vx: 0.0,
                    vy: -80.0,
                },
            ],
        });
    }

    #[test]
    fn test_spawn_despawn() {
        roundtrip(SSpawnObject {
            objects: vec![ObjectInfo {
                object_id: 3,
                kind: 1,
                type_id: 2,
                x: 100.0,
                y: -40.0,
                hp: 60,
                max_hp: 60,
            }],
        });
        roundtrip(SDespawnObject {
            object_ids: vec![3, 4, 5],
        });
    }

    #[test]
    fn test_combat_and_progression() {
        roundtrip(CUseSkill { skill_id: 2 });
        roundtrip(SSkillEffect {
            caster_id: 1,
            skill_id: 2,
            x: 0.0,
            y: 0.0,
        });
        roundtrip(SDamageEffect {
            object_id: 7,
            damage: 14,
            hp: 46,
        });
        roundtrip(SPlayerDowned { object_id: 1 });
        roundtrip(SPlayerRevive { object_id: 1, hp: 50 });
        roundtrip(SExpChange {
            object_id: 1,
            exp: 13,
            level: 2,
        });
        roundtrip(SLevelUpOption {
            options: vec![1, 4, 6],
        });
        roundtrip(CSelectLevelUp { option_id: 4 });
        roundtrip(SGameWin);
        roundtrip(SGameOver);
    }

    #[test]
    fn test_decode_body_rejects_garbage() {
        let log = flint::logging::discard();
        assert!(decode_body::<SLogin>(&[1, 2], &log).is_none());
        assert!(decode_body::<CMove>(&[0; 8], &log).is_some());
    }

    #[test]
    fn test_chat_roundtrip() {
        roundtrip(CChat {
            message: "on your left".to_string(),
        });
        roundtrip(SChat {
            object_id: 4,
            message: "on your left".to_string(),
        });
    }
}
