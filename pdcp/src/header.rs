//! PDCP data PDU header codec
//!
//! Data PDU layouts (TS 38.323 section 6.2.2):
//!
//! ```text
//! 12 bit SN:  | D/C | R R R | SN (4) |  SN (8)  | data ... | MAC-I (4, optional) |
//! 18 bit SN:  | D/C | R R R R R | SN (2) | SN (8) | SN (8) | data ... | MAC-I |
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use common::types::SnSize;
use nom::bits::bits;
use nom::bits::complete::take;
use nom::IResult;

use crate::PdcpError;

/// Length of the MAC-I field in bytes
pub const MAC_I_LEN: usize = 4;

/// D/C bit value of a data PDU
const DC_DATA: u8 = 0x80;

type BitInput<'a> = (&'a [u8], usize);

fn sn_bits(sn_size: SnSize) -> impl Fn(BitInput<'_>) -> IResult<BitInput<'_>, u32> {
    move |input| {
        let reserved = sn_size.header_len() * 8 - sn_size.bits() as usize;
        let (input, _dc_and_reserved): (_, u8) = take(reserved)(input)?;
        take(sn_size.bits() as usize)(input)
    }
}

fn data_pdu_sn(sn_size: SnSize) -> impl Fn(&[u8]) -> IResult<&[u8], u32> {
    move |input| bits(sn_bits(sn_size))(input)
}

/// Read the SN of a data PDU
///
/// The PDU must be longer than the header, a header without payload is malformed.
pub fn parse_header(pdu: &[u8], sn_size: SnSize) -> Result<u32, PdcpError> {
    let header_len = sn_size.header_len();
    if pdu.len() <= header_len {
        return Err(PdcpError::MalformedPdu {
            len: pdu.len(),
            header_len,
        });
    }

    data_pdu_sn(sn_size)(pdu)
        .map(|(_, sn)| sn)
        .map_err(|_| PdcpError::MalformedPdu {
            len: pdu.len(),
            header_len,
        })
}

/// Remove the data PDU header
pub fn strip_header(buf: &mut Bytes, sn_size: SnSize) {
    let header_len = sn_size.header_len().min(buf.len());
    let _ = buf.split_to(header_len);
}

/// Remove and return the trailing MAC-I
pub fn strip_integrity_tag(buf: &mut BytesMut) -> Option<[u8; MAC_I_LEN]> {
    if buf.len() < MAC_I_LEN {
        return None;
    }

    let tail = buf.split_off(buf.len() - MAC_I_LEN);
    let mut mac = [0u8; MAC_I_LEN];
    mac.copy_from_slice(&tail);
    Some(mac)
}

/// Build a data PDU header carrying `sn`
pub fn write_header(sn_size: SnSize, sn: u32) -> BytesMut {
    let sn = sn & sn_size.sn_mask();
    let mut hdr = BytesMut::with_capacity(sn_size.header_len());
    match sn_size {
        SnSize::Size12 => {
            hdr.put_u8(DC_DATA | ((sn >> 8) & 0x0f) as u8);
            hdr.put_u8(sn as u8);
        }
        SnSize::Size18 => {
            hdr.put_u8(DC_DATA | ((sn >> 16) & 0x03) as u8);
            hdr.put_u8((sn >> 8) as u8);
            hdr.put_u8(sn as u8);
        }
    }
    hdr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_12bit_sn() {
        assert_eq!(parse_header(&[0x80, 0x00, 0xaa], SnSize::Size12), Ok(0));
        assert_eq!(parse_header(&[0x8a, 0xbc, 0xaa], SnSize::Size12), Ok(0xabc));
        // D/C and reserved bits are not part of the SN
        assert_eq!(parse_header(&[0xff, 0xff, 0x00], SnSize::Size12), Ok(0xfff));
    }

    #[test]
    fn test_parse_18bit_sn() {
        assert_eq!(parse_header(&[0x80, 0x00, 0x01, 0xaa], SnSize::Size18), Ok(1));
        assert_eq!(parse_header(&[0x83, 0x45, 0x67, 0xaa], SnSize::Size18), Ok(0x34567));
        assert_eq!(parse_header(&[0xfe, 0xff, 0xff, 0x00], SnSize::Size18), Ok(0x2ffff));
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            parse_header(&[0x80, 0x01], SnSize::Size12),
            Err(PdcpError::MalformedPdu { len: 2, header_len: 2 })
        );
        assert_eq!(
            parse_header(&[0x80, 0x01, 0x02], SnSize::Size18),
            Err(PdcpError::MalformedPdu { len: 3, header_len: 3 })
        );
        assert!(parse_header(&[], SnSize::Size12).is_err());
    }

    #[test]
    fn test_write_header() {
        assert_eq!(write_header(SnSize::Size12, 0xabc).as_ref(), &[0x8a, 0xbc]);
        assert_eq!(write_header(SnSize::Size18, 0x34567).as_ref(), &[0x83, 0x45, 0x67]);

        let mut pdu = write_header(SnSize::Size18, 0x2f00d);
        pdu.put_u8(0x55);
        assert_eq!(parse_header(&pdu, SnSize::Size18), Ok(0x2f00d));
    }

    #[test]
    fn test_strip_header_and_tag() {
        let mut buf = Bytes::from_static(&[0x80, 0x01, 0xde, 0xad, 0x01, 0x02, 0x03, 0x04]);
        strip_header(&mut buf, SnSize::Size12);
        assert_eq!(buf.as_ref(), &[0xde, 0xad, 0x01, 0x02, 0x03, 0x04]);

        let mut buf = BytesMut::from(buf.as_ref());
        let mac = strip_integrity_tag(&mut buf).unwrap();
        assert_eq!(mac, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(buf.as_ref(), &[0xde, 0xad]);

        let mut short = BytesMut::from(&[0x01, 0x02][..]);
        assert!(strip_integrity_tag(&mut short).is_none());
    }
}
