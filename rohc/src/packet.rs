//! ROHC packet framing: CID encoding, packet-type discriminators, the
//! UO-0/UO-1/UO-2 base formats and their EXT-0/1/2/3 extensions.
//!
//! Static/dynamic chain encoding is profile-specific and lives in
//! [`crate::profiles`]; this module only knows about the
//! profile-independent envelope described in spec §6.

use crate::bits::{BitReader, BitWriter};
use crate::error::RohcError;
use crate::sdvl::{sdvl_decode, sdvl_encode};
use crate::types::Cid;

/// `1110cccc`, the Add-CID octet prefix used in small-CID mode for any
/// CID other than the implicit 0.
const ADD_CID_PREFIX: u8 = 0b1110_0000;
const ADD_CID_MASK: u8 = 0b1111_0000;

/// Whether `byte` is an Add-CID octet, and if so, which CID it carries.
pub fn parse_add_cid(byte: u8) -> Option<Cid> {
    if byte & ADD_CID_MASK == ADD_CID_PREFIX {
        Some((byte & 0x0f) as Cid)
    } else {
        None
    }
}

/// Encodes the CID prefix for `cid` under small-CID framing. Returns
/// `None` for CID 0 (implicit, no octet emitted) or `Some(byte)` for
/// CIDs 1..=15.
pub fn encode_small_cid_prefix(cid: Cid) -> Option<u8> {
    if cid == 0 {
        None
    } else {
        Some(ADD_CID_PREFIX | (cid as u8 & 0x0f))
    }
}

/// Encodes a CID under large-CID framing: SDVL bytes inserted right
/// after the packet-type octet.
pub fn encode_large_cid(cid: Cid) -> Result<Vec<u8>, RohcError> {
    let mut out = Vec::new();
    sdvl_encode(&mut out, cid as u32)?;
    Ok(out)
}

/// Decodes a large-CID SDVL field, returning `(cid, bytes_consumed)`.
pub fn decode_large_cid(data: &[u8]) -> Result<(Cid, usize), RohcError> {
    let (value, len) = sdvl_decode(data)?;
    Ok((value as Cid, len))
}

/// The profile-independent packet-type discriminator, detected from the
/// first non-CID byte of a ROHC packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDiscriminator {
    /// `1111110D`.
    Ir { dynamic_chain_present: bool },
    /// `11111000`.
    IrDyn,
    /// `0xxxxxxx`.
    Uo0,
    /// `10xxxxxx`.
    Uo1,
    /// `110xxxxx`.
    Uo2,
}

/// Classifies the first byte of a ROHC packet (after any Add-CID octet
/// and large-CID SDVL bytes have been stripped).
pub fn detect_packet_type(first_byte: u8) -> Result<PacketDiscriminator, RohcError> {
    if first_byte & 0b1111_1110 == 0b1111_1100 {
        Ok(PacketDiscriminator::Ir {
            dynamic_chain_present: first_byte & 0x01 != 0,
        })
    } else if first_byte == 0b1111_1000 {
        Ok(PacketDiscriminator::IrDyn)
    } else if first_byte & 0b1000_0000 == 0 {
        Ok(PacketDiscriminator::Uo0)
    } else if first_byte & 0b1100_0000 == 0b1000_0000 {
        Ok(PacketDiscriminator::Uo1)
    } else if first_byte & 0b1110_0000 == 0b1100_0000 {
        Ok(PacketDiscriminator::Uo2)
    } else {
        Err(RohcError::Malformed(format!(
            "unrecognized packet-type discriminator {first_byte:#010b}"
        )))
    }
}

/// Fields carried by a decoded UO-0 packet (before CRC verification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uo0Fields {
    pub sn_bits: u32,
    pub crc: u8,
}

pub fn encode_uo0(sn_lsbs: u32, crc3: u8) -> u8 {
    debug_assert!(sn_lsbs < 16);
    debug_assert!(crc3 < 8);
    ((sn_lsbs as u8) << 3) | crc3
}

pub fn decode_uo0(byte: u8) -> Uo0Fields {
    Uo0Fields {
        sn_bits: ((byte >> 3) & 0x0f) as u32,
        crc: byte & 0x07,
    }
}

/// Fields carried by a decoded UO-1 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uo1Fields {
    pub ip_id_bits: u32,
    pub sn_bits: u32,
    pub crc: u8,
}

pub fn encode_uo1(ip_id_lsbs: u32, sn_lsbs: u32, crc3: u8) -> [u8; 2] {
    debug_assert!(ip_id_lsbs < 64);
    debug_assert!(sn_lsbs < 32);
    debug_assert!(crc3 < 8);
    let byte0 = 0b1000_0000 | (ip_id_lsbs as u8 & 0x3f);
    let byte1 = ((sn_lsbs as u8) << 3) | crc3;
    [byte0, byte1]
}

pub fn decode_uo1(bytes: [u8; 2]) -> Uo1Fields {
    Uo1Fields {
        ip_id_bits: (bytes[0] & 0x3f) as u32,
        sn_bits: ((bytes[1] >> 3) & 0x1f) as u32,
        crc: bytes[1] & 0x07,
    }
}

/// Fields carried by a decoded UO-2 base (before any extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uo2Fields {
    pub sn_bits: u32,
    pub extension_present: bool,
    pub crc: u8,
}

pub fn encode_uo2(sn_lsbs: u32, extension_present: bool, crc7: u8) -> [u8; 2] {
    debug_assert!(sn_lsbs < 32);
    debug_assert!(crc7 < 128);
    let byte0 = 0b1100_0000 | (sn_lsbs as u8 & 0x1f);
    let byte1 = ((extension_present as u8) << 7) | crc7;
    [byte0, byte1]
}

pub fn decode_uo2(bytes: [u8; 2]) -> Uo2Fields {
    Uo2Fields {
        sn_bits: (bytes[0] & 0x1f) as u32,
        extension_present: bytes[1] & 0x80 != 0,
        crc: bytes[1] & 0x7f,
    }
}

/// Which UO-2 extension was chosen, spec §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    None,
    Ext0,
    Ext1,
    Ext2,
    Ext3,
}

/// Decoded contents of an extension, in terms of additional LSBs layered
/// on top of the UO-2 base fields. `ip_flags` is only populated by
/// EXT-3, the one extension able to carry static/dynamic field changes.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFields {
    pub extra_sn_bits: u32,
    pub extra_sn_width: u32,
    pub ip_id_bits: u32,
    pub ip_id_width: u32,
    pub ip_id2_bits: u32,
    pub ip_id2_width: u32,
    pub ip_flags: Option<Ext3IpFlags>,
    pub ip2_flags: Option<Ext3IpFlags>,
}

/// The optional per-header change block EXT-3 can carry, documented in
/// DESIGN.md as this crate's concrete (RFC-compatible but not literally
/// RFC-specified bit-for-bit) resolution of EXT-3's "variable
/// header-flags format".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ext3IpFlags {
    pub tos: Option<u8>,
    pub ttl: Option<u8>,
    pub protocol: Option<u8>,
    pub df: bool,
    pub rnd: bool,
    pub nbo: bool,
}

const EXT3_TOS_PRESENT: u8 = 0b1000_0000;
const EXT3_TTL_PRESENT: u8 = 0b0100_0000;
const EXT3_PROTOCOL_PRESENT: u8 = 0b0010_0000;
const EXT3_DF: u8 = 0b0001_0000;
const EXT3_RND: u8 = 0b0000_1000;
const EXT3_NBO: u8 = 0b0000_0100;

impl Ext3IpFlags {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.tos.is_some() {
            flags |= EXT3_TOS_PRESENT;
        }
        if self.ttl.is_some() {
            flags |= EXT3_TTL_PRESENT;
        }
        if self.protocol.is_some() {
            flags |= EXT3_PROTOCOL_PRESENT;
        }
        if self.df {
            flags |= EXT3_DF;
        }
        if self.rnd {
            flags |= EXT3_RND;
        }
        if self.nbo {
            flags |= EXT3_NBO;
        }
        out.push(flags);
        if let Some(tos) = self.tos {
            out.push(tos);
        }
        if let Some(ttl) = self.ttl {
            out.push(ttl);
        }
        if let Some(protocol) = self.protocol {
            out.push(protocol);
        }
    }

    fn decode(reader: &mut BitReader) -> Result<Self, RohcError> {
        let flags = reader.read_u8()?;
        let tos = if flags & EXT3_TOS_PRESENT != 0 {
            Some(reader.read_u8()?)
        } else {
            None
        };
        let ttl = if flags & EXT3_TTL_PRESENT != 0 {
            Some(reader.read_u8()?)
        } else {
            None
        };
        let protocol = if flags & EXT3_PROTOCOL_PRESENT != 0 {
            Some(reader.read_u8()?)
        } else {
            None
        };
        Ok(Ext3IpFlags {
            tos,
            ttl,
            protocol,
            df: flags & EXT3_DF != 0,
            rnd: flags & EXT3_RND != 0,
            nbo: flags & EXT3_NBO != 0,
        })
    }
}

/// Encodes EXT-0: `00 SN(3) IPID(3)`.
pub fn encode_ext0(sn_bits: u32, ip_id_bits: u32) -> u8 {
    debug_assert!(sn_bits < 8);
    debug_assert!(ip_id_bits < 8);
    (0b00 << 6) | ((sn_bits as u8) << 3) | ip_id_bits as u8
}

pub fn decode_ext0(byte: u8) -> ExtensionFields {
    ExtensionFields {
        extra_sn_bits: ((byte >> 3) & 0x07) as u32,
        extra_sn_width: 3,
        ip_id_bits: (byte & 0x07) as u32,
        ip_id_width: 3,
        ..Default::default()
    }
}

/// Encodes EXT-1: `01 SN(3) IPID(11)`.
pub fn encode_ext1(sn_bits: u32, ip_id_bits: u32) -> [u8; 2] {
    debug_assert!(sn_bits < 8);
    debug_assert!(ip_id_bits < 2048);
    let value: u32 = (0b01 << 14) | (sn_bits << 11) | ip_id_bits;
    [(value >> 8) as u8, value as u8]
}

pub fn decode_ext1(bytes: [u8; 2]) -> ExtensionFields {
    let value = ((bytes[0] as u32) << 8) | bytes[1] as u32;
    ExtensionFields {
        extra_sn_bits: (value >> 11) & 0x07,
        extra_sn_width: 3,
        ip_id_bits: value & 0x7ff,
        ip_id_width: 11,
        ..Default::default()
    }
}

/// Encodes EXT-2: `10 SN(3) IPID2(11) IPID(8)` (two IP headers only).
pub fn encode_ext2(sn_bits: u32, ip_id2_bits: u32, ip_id_bits: u32) -> [u8; 3] {
    debug_assert!(sn_bits < 8);
    debug_assert!(ip_id2_bits < 2048);
    debug_assert!(ip_id_bits < 256);
    let value: u32 = (0b10 << 22) | (sn_bits << 19) | (ip_id2_bits << 8) | ip_id_bits;
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

pub fn decode_ext2(bytes: [u8; 3]) -> ExtensionFields {
    let value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32;
    ExtensionFields {
        extra_sn_bits: (value >> 19) & 0x07,
        extra_sn_width: 3,
        ip_id2_bits: (value >> 8) & 0x7ff,
        ip_id2_width: 11,
        ip_id_bits: value & 0xff,
        ip_id_width: 8,
        ..Default::default()
    }
}

/// What EXT-3 should carry, decided by the compressor's extension
/// selection logic before encoding.
#[derive(Debug, Clone, Default)]
pub struct Ext3Plan {
    pub extra_sn_bits: Option<(u32, u32)>,
    pub ip_id: Option<(u32, u32)>,
    pub ip_id2: Option<(u32, u32)>,
    pub ip_flags: Option<Ext3IpFlags>,
    pub ip2_flags: Option<Ext3IpFlags>,
}

/// Encodes EXT-3's flags octet plus whichever variable-length fields the
/// plan selected.
pub fn encode_ext3(plan: &Ext3Plan) -> Vec<u8> {
    let mut out = Vec::new();
    let s = plan.extra_sn_bits.is_some();
    let m = plan.ip2_flags.is_some() || plan.ip_id2.is_some();
    let i = plan.ip_id.is_some();
    let ip = plan.ip_flags.is_some();
    let flags = (0b111 << 5) | ((s as u8) << 4) | ((m as u8) << 3) | ((i as u8) << 2) | ((ip as u8) << 1);
    out.push(flags);
    if let Some((bits, _width)) = plan.extra_sn_bits {
        out.push(bits as u8);
    }
    if let Some((bits, _width)) = plan.ip_id {
        out.extend_from_slice(&(bits as u16).to_be_bytes());
    }
    if let Some(f) = &plan.ip_flags {
        f.encode(&mut out);
    }
    if m {
        if let Some((bits, _width)) = plan.ip_id2 {
            out.extend_from_slice(&(bits as u16).to_be_bytes());
        }
        if let Some(f) = &plan.ip2_flags {
            f.encode(&mut out);
        }
    }
    out
}

/// Decodes an EXT-3 block starting at `reader`'s current (byte-aligned)
/// position.
pub fn decode_ext3(reader: &mut BitReader) -> Result<ExtensionFields, RohcError> {
    let flags = reader.read_u8()?;
    if flags & 0b1110_0000 != 0b1110_0000 {
        return Err(RohcError::Malformed("bad EXT-3 discriminator".into()));
    }
    let s = flags & 0b0001_0000 != 0;
    let m = flags & 0b0000_1000 != 0;
    let i = flags & 0b0000_0100 != 0;
    let ip = flags & 0b0000_0010 != 0;

    let mut fields = ExtensionFields::default();
    if s {
        fields.extra_sn_bits = reader.read_u8()? as u32;
        fields.extra_sn_width = 8;
    }
    if i {
        fields.ip_id_bits = reader.read_u16()? as u32;
        fields.ip_id_width = 16;
    }
    if ip {
        fields.ip_flags = Some(Ext3IpFlags::decode(reader)?);
    }
    if m {
        fields.ip_id2_bits = reader.read_u16()? as u32;
        fields.ip_id2_width = 16;
        fields.ip2_flags = Some(Ext3IpFlags::decode(reader)?);
    }
    Ok(fields)
}

/// Writes a big-endian `u16`, used by the IR/IR-DYN SN field.
pub fn write_sn(writer: &mut BitWriter, sn: u16) {
    writer.write_u16(sn);
}

pub fn read_sn(reader: &mut BitReader) -> Result<u16, RohcError> {
    reader.read_u16()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_cid_roundtrip() {
        for cid in 1..=15u16 {
            let byte = encode_small_cid_prefix(cid).unwrap();
            assert_eq!(parse_add_cid(byte), Some(cid));
        }
        assert_eq!(encode_small_cid_prefix(0), None);
    }

    #[test]
    fn large_cid_roundtrip() {
        for cid in [0u16, 1, 500, 16383] {
            let bytes = encode_large_cid(cid).unwrap();
            let (decoded, len) = decode_large_cid(&bytes).unwrap();
            assert_eq!(decoded, cid);
            assert_eq!(len, bytes.len());
        }
    }

    #[test]
    fn discriminators_are_distinguishable() {
        assert_eq!(
            detect_packet_type(0b1111_1101).unwrap(),
            PacketDiscriminator::Ir {
                dynamic_chain_present: true
            }
        );
        assert_eq!(
            detect_packet_type(0b1111_1000).unwrap(),
            PacketDiscriminator::IrDyn
        );
        assert_eq!(detect_packet_type(0b0101_0101).unwrap(), PacketDiscriminator::Uo0);
        assert_eq!(detect_packet_type(0b1001_0101).unwrap(), PacketDiscriminator::Uo1);
        assert_eq!(detect_packet_type(0b1101_0101).unwrap(), PacketDiscriminator::Uo2);
    }

    #[test]
    fn uo0_field_roundtrip() {
        let byte = encode_uo0(0b1011, 0b101);
        let fields = decode_uo0(byte);
        assert_eq!(fields.sn_bits, 0b1011);
        assert_eq!(fields.crc, 0b101);
    }

    #[test]
    fn uo1_field_roundtrip() {
        let bytes = encode_uo1(0b101011, 0b11001, 0b110);
        let fields = decode_uo1(bytes);
        assert_eq!(fields.ip_id_bits, 0b101011);
        assert_eq!(fields.sn_bits, 0b11001);
        assert_eq!(fields.crc, 0b110);
    }

    #[test]
    fn uo2_field_roundtrip() {
        let bytes = encode_uo2(0b10101, true, 0b1010101);
        let fields = decode_uo2(bytes);
        assert_eq!(fields.sn_bits, 0b10101);
        assert!(fields.extension_present);
        assert_eq!(fields.crc, 0b1010101);
    }

    #[test]
    fn ext0_roundtrip() {
        let byte = encode_ext0(0b101, 0b011);
        let f = decode_ext0(byte);
        assert_eq!(f.extra_sn_bits, 0b101);
        assert_eq!(f.ip_id_bits, 0b011);
    }

    #[test]
    fn ext1_roundtrip() {
        let bytes = encode_ext1(0b110, 0b10101010101);
        let f = decode_ext1(bytes);
        assert_eq!(f.extra_sn_bits, 0b110);
        assert_eq!(f.ip_id_bits, 0b10101010101);
    }

    #[test]
    fn ext2_roundtrip() {
        let bytes = encode_ext2(0b011, 0b11100001111, 0b10101010);
        let f = decode_ext2(bytes);
        assert_eq!(f.extra_sn_bits, 0b011);
        assert_eq!(f.ip_id2_bits, 0b11100001111);
        assert_eq!(f.ip_id_bits, 0b10101010);
    }

    #[test]
    fn ext3_roundtrip_with_ip_flags() {
        let plan = Ext3Plan {
            extra_sn_bits: Some((0x42, 8)),
            ip_id: Some((0x1234, 16)),
            ip_id2: None,
            ip_flags: Some(Ext3IpFlags {
                tos: None,
                ttl: Some(63),
                protocol: None,
                df: true,
                rnd: false,
                nbo: true,
            }),
            ip2_flags: None,
        };
        let bytes = encode_ext3(&plan);
        let mut reader = BitReader::new(&bytes);
        let decoded = decode_ext3(&mut reader).unwrap();
        assert_eq!(decoded.extra_sn_bits, 0x42);
        assert_eq!(decoded.ip_id_bits, 0x1234);
        let flags = decoded.ip_flags.unwrap();
        assert_eq!(flags.ttl, Some(63));
        assert!(flags.df);
        assert!(flags.nbo);
        assert!(!flags.rnd);
        assert_eq!(flags.tos, None);
    }

    #[test]
    fn ext3_minimal_plan_has_only_flags_byte() {
        let plan = Ext3Plan::default();
        let bytes = encode_ext3(&plan);
        assert_eq!(bytes.len(), 1);
        assert_eq!(bytes[0], 0b1110_0000);
    }
}
