//! The feedback channel: FEEDBACK-1 / FEEDBACK-2, spec §4.9 and §6.
//!
//! Feedback travels from decompressor back to compressor. FEEDBACK-1 is
//! a bare SN echo; FEEDBACK-2 additionally carries an ACK/NACK/
//! STATIC-NACK type, the operating mode, and a TLV option list. Both are
//! wrapped, on the wire, in the same outer envelope: a `11110000`
//! (long form, explicit length byte) or `111100ll` (short form, length
//! in the low two bits) prefix around the Code octet.

use crate::crc::{crc_calculate_masked, CrcType};
use crate::error::RohcError;
use crate::types::Mode;

const FEEDBACK_PREFIX_LONG: u8 = 0b1111_0000;
const FEEDBACK_PREFIX_SHORT_MASK: u8 = 0b1111_1100;
const FEEDBACK_PREFIX_SHORT: u8 = 0b1111_0000;

/// ACK type, the two high bits of a FEEDBACK-2 Code octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckType {
    Ack,
    Nack,
    StaticNack,
    Reserved,
}

impl AckType {
    fn bits(self) -> u8 {
        match self {
            AckType::Ack => 0b00,
            AckType::Nack => 0b01,
            AckType::StaticNack => 0b10,
            AckType::Reserved => 0b11,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => AckType::Ack,
            0b01 => AckType::Nack,
            0b10 => AckType::StaticNack,
            _ => AckType::Reserved,
        }
    }
}

fn mode_bits(mode: Mode) -> u8 {
    match mode {
        Mode::Unidirectional => 0b00,
        Mode::BidirectionalOptimistic => 0b01,
        Mode::BidirectionalReliable => 0b10,
    }
}

fn mode_from_bits(bits: u8) -> Mode {
    match bits & 0b11 {
        0b01 => Mode::BidirectionalOptimistic,
        0b10 => Mode::BidirectionalReliable,
        _ => Mode::Unidirectional,
    }
}

/// FEEDBACK-2 TLV options, spec §4.9. Repeated `Sn` options are
/// concatenated octet-wise, most-significant-first, into the running SN
/// — see DESIGN.md for why this resolves the source's open question on
/// combining them, and [`FeedbackOptions::combined_sn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOption {
    /// Extends the SN with further octets beyond the 12 bits already in
    /// the FEEDBACK-2 header.
    Sn(u8),
    /// The SN carried in the header is not to be trusted as a precise
    /// reference (e.g. decompressor guessed it).
    SnNotValid,
    /// CRC-8 over the whole feedback element (header + prior options),
    /// computed with this byte zeroed.
    Crc(u8),
    /// Decompressor asks the compressor to stop sending to this CID.
    Reject,
    /// Approximate count of packets lost since the last feedback.
    Loss(u8),
}

const OPT_TYPE_CRC: u8 = 1;
const OPT_TYPE_REJECT: u8 = 2;
const OPT_TYPE_SN_NOT_VALID: u8 = 3;
const OPT_TYPE_SN: u8 = 4;
const OPT_TYPE_LOSS: u8 = 5;

/// A fully decoded FEEDBACK-2 element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback2 {
    pub ack_type: AckType,
    pub mode: Mode,
    /// The 12-bit SN carried in the fixed header (4 high bits + 8 low
    /// bits, spec §6).
    pub sn: u16,
    pub options: Vec<FeedbackOption>,
}

impl Feedback2 {
    /// Every `Sn` option's octet, most-significant-first, folded onto
    /// the header's 12-bit SN to produce the full reference SN the
    /// compressor should treat this feedback as being about.
    pub fn combined_sn(&self) -> u32 {
        let mut sn = self.sn as u32;
        for opt in &self.options {
            if let FeedbackOption::Sn(byte) = opt {
                sn = (sn << 8) | *byte as u32;
            }
        }
        sn
    }

    pub fn sn_not_valid(&self) -> bool {
        self.options.iter().any(|o| matches!(o, FeedbackOption::SnNotValid))
    }

    pub fn rejected(&self) -> bool {
        self.options.iter().any(|o| matches!(o, FeedbackOption::Reject))
    }

    pub fn loss_count(&self) -> Option<u8> {
        self.options.iter().find_map(|o| match o {
            FeedbackOption::Loss(n) => Some(*n),
            _ => None,
        })
    }
}

/// Builds a FEEDBACK-1 payload: the low 8 bits of the most recently
/// correctly decoded SN, spec §4.9/§6.
pub fn encode_feedback1(sn: u16) -> [u8; 1] {
    [sn as u8]
}

pub fn decode_feedback1(byte: u8) -> u8 {
    byte
}

/// Encodes a FEEDBACK-2 element's Code + option-list body (without the
/// outer `1111000x`-prefixed envelope; see [`wrap_feedback`]).
pub fn encode_feedback2(fb: &Feedback2) -> Vec<u8> {
    let mut body = Vec::new();
    let byte0 = (fb.ack_type.bits() << 6) | (mode_bits(fb.mode) << 4) | ((fb.sn >> 8) as u8 & 0x0f);
    let byte1 = fb.sn as u8;
    body.push(byte0);
    body.push(byte1);
    for opt in &fb.options {
        encode_option(&mut body, opt);
    }
    // Patch in the CRC option's value, if present, over the whole body
    // computed with that byte zeroed, per spec §4.9.
    if let Some(crc_offset) = fb
        .options
        .iter()
        .position(|o| matches!(o, FeedbackOption::Crc(_)))
        .map(|i| option_byte_offset(&fb.options, i) + 1)
    {
        let mut zeroed = body.clone();
        zeroed[crc_offset] = 0;
        let crc = crc_calculate_masked(CrcType::Crc8, &zeroed, CrcType::Crc8.init());
        body[crc_offset] = crc;
    }
    body
}

/// Byte offset (within the option-list portion) of option `index`,
/// accounting for every option's own length prefix.
fn option_byte_offset(options: &[FeedbackOption], index: usize) -> usize {
    options[..index].iter().map(option_len).sum::<usize>() + 2
}

fn option_len(opt: &FeedbackOption) -> usize {
    match opt {
        FeedbackOption::Sn(_) | FeedbackOption::Crc(_) | FeedbackOption::Loss(_) => 2,
        FeedbackOption::SnNotValid | FeedbackOption::Reject => 1,
    }
}

fn encode_option(out: &mut Vec<u8>, opt: &FeedbackOption) {
    match opt {
        FeedbackOption::Crc(v) => {
            out.push((OPT_TYPE_CRC << 4) | 1);
            out.push(*v);
        }
        FeedbackOption::Reject => {
            out.push((OPT_TYPE_REJECT << 4) | 0);
        }
        FeedbackOption::SnNotValid => {
            out.push((OPT_TYPE_SN_NOT_VALID << 4) | 0);
        }
        FeedbackOption::Sn(v) => {
            out.push((OPT_TYPE_SN << 4) | 1);
            out.push(*v);
        }
        FeedbackOption::Loss(v) => {
            out.push((OPT_TYPE_LOSS << 4) | 1);
            out.push(*v);
        }
    }
}

/// Decodes a FEEDBACK-2 Code + option-list body (the inverse of
/// [`encode_feedback2`]).
pub fn decode_feedback2(body: &[u8]) -> Result<Feedback2, RohcError> {
    if body.len() < 2 {
        return Err(RohcError::Malformed("FEEDBACK-2 too short".into()));
    }
    let ack_type = AckType::from_bits(body[0] >> 6);
    let mode = mode_from_bits(body[0] >> 4);
    let sn = (((body[0] & 0x0f) as u16) << 8) | body[1] as u16;
    let mut options = Vec::new();
    let mut pos = 2;
    while pos < body.len() {
        let opt_type = body[pos] >> 4;
        let opt_len = (body[pos] & 0x0f) as usize;
        pos += 1;
        if pos + opt_len > body.len() {
            return Err(RohcError::Malformed("truncated FEEDBACK-2 option".into()));
        }
        let payload = &body[pos..pos + opt_len];
        options.push(match opt_type {
            OPT_TYPE_CRC => FeedbackOption::Crc(*payload.first().unwrap_or(&0)),
            OPT_TYPE_REJECT => FeedbackOption::Reject,
            OPT_TYPE_SN_NOT_VALID => FeedbackOption::SnNotValid,
            OPT_TYPE_SN => FeedbackOption::Sn(*payload.first().unwrap_or(&0)),
            OPT_TYPE_LOSS => FeedbackOption::Loss(*payload.first().unwrap_or(&0)),
            other => {
                return Err(RohcError::Malformed(format!(
                    "unknown FEEDBACK-2 option type {other}"
                )))
            }
        });
        pos += opt_len;
    }
    Ok(Feedback2 { ack_type, mode, sn, options })
}

/// Wraps a feedback body (as produced by [`encode_feedback1`] or
/// [`encode_feedback2`]) in its outer envelope: the short form
/// (`111100ll`) when the body fits in 2 bits of length, else the long
/// form (`11110000` + explicit length byte).
pub fn wrap_feedback(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    if body.len() <= 0b11 && body.len() > 0 {
        out.push(FEEDBACK_PREFIX_SHORT | body.len() as u8);
    } else {
        out.push(FEEDBACK_PREFIX_LONG);
        out.push(body.len() as u8);
    }
    out.extend_from_slice(body);
    out
}

/// Parses a feedback envelope, returning `(body, bytes_consumed)`.
pub fn unwrap_feedback(data: &[u8]) -> Result<(&[u8], usize), RohcError> {
    let first = *data
        .first()
        .ok_or_else(|| RohcError::Malformed("empty feedback data".into()))?;
    if first == FEEDBACK_PREFIX_LONG {
        let len = *data
            .get(1)
            .ok_or_else(|| RohcError::Malformed("missing feedback length byte".into()))?
            as usize;
        let total = 2 + len;
        if data.len() < total {
            return Err(RohcError::Malformed("truncated feedback element".into()));
        }
        Ok((&data[2..total], total))
    } else if first & FEEDBACK_PREFIX_SHORT_MASK == FEEDBACK_PREFIX_SHORT {
        let len = (first & 0b11) as usize;
        let total = 1 + len;
        if data.len() < total {
            return Err(RohcError::Malformed("truncated feedback element".into()));
        }
        Ok((&data[1..total], total))
    } else {
        Err(RohcError::Malformed("not a feedback element".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback1_roundtrip() {
        let body = encode_feedback1(0xab);
        assert_eq!(decode_feedback1(body[0]), 0xab);
    }

    #[test]
    fn feedback2_roundtrip_no_options() {
        let fb = Feedback2 {
            ack_type: AckType::Ack,
            mode: Mode::BidirectionalOptimistic,
            sn: 0x0abc & 0x0fff,
            options: vec![],
        };
        let body = encode_feedback2(&fb);
        let decoded = decode_feedback2(&body).unwrap();
        assert_eq!(decoded, fb);
    }

    #[test]
    fn feedback2_roundtrip_with_options() {
        let fb = Feedback2 {
            ack_type: AckType::Nack,
            mode: Mode::Unidirectional,
            sn: 42,
            options: vec![FeedbackOption::SnNotValid, FeedbackOption::Loss(3)],
        };
        let body = encode_feedback2(&fb);
        let decoded = decode_feedback2(&body).unwrap();
        assert_eq!(decoded, fb);
        assert!(decoded.sn_not_valid());
        assert_eq!(decoded.loss_count(), Some(3));
    }

    #[test]
    fn feedback2_crc_option_verifies() {
        let fb = Feedback2 {
            ack_type: AckType::StaticNack,
            mode: Mode::BidirectionalReliable,
            sn: 7,
            options: vec![FeedbackOption::Crc(0)],
        };
        let body = encode_feedback2(&fb);
        let mut zeroed = body.clone();
        let crc_pos = body.len() - 1;
        zeroed[crc_pos] = 0;
        let expected = crc_calculate_masked(CrcType::Crc8, &zeroed, CrcType::Crc8.init());
        assert_eq!(body[crc_pos], expected);
    }

    #[test]
    fn combined_sn_concatenates_sn_options_msb_first() {
        let fb = Feedback2 {
            ack_type: AckType::Ack,
            mode: Mode::Unidirectional,
            sn: 0x0f,
            options: vec![FeedbackOption::Sn(0xaa), FeedbackOption::Sn(0xbb)],
        };
        assert_eq!(fb.combined_sn(), 0x0f_aa_bb);
    }

    #[test]
    fn envelope_short_form_roundtrip() {
        let body = encode_feedback1(0x55);
        let wrapped = wrap_feedback(&body);
        assert_eq!(wrapped.len(), 2);
        let (unwrapped, consumed) = unwrap_feedback(&wrapped).unwrap();
        assert_eq!(unwrapped, &body);
        assert_eq!(consumed, wrapped.len());
    }

    #[test]
    fn envelope_long_form_roundtrip_for_large_body() {
        let fb = Feedback2 {
            ack_type: AckType::Ack,
            mode: Mode::Unidirectional,
            sn: 1,
            options: vec![
                FeedbackOption::Sn(1),
                FeedbackOption::Sn(2),
                FeedbackOption::Loss(1),
            ],
        };
        let body = encode_feedback2(&fb);
        let wrapped = wrap_feedback(&body);
        assert_eq!(wrapped[0], FEEDBACK_PREFIX_LONG);
        let (unwrapped, consumed) = unwrap_feedback(&wrapped).unwrap();
        assert_eq!(unwrapped, &body);
        assert_eq!(consumed, wrapped.len());
    }
}
