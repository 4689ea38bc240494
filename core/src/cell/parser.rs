use std::io::Cursor;

use bitstream_io::{BigEndian, BitRead, BitReader, Numeric, SignedNumeric};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::cell::util::*;
use crate::cell::{CellId, MapTonCellError, TonCellError};
use crate::types::{TonAddress, TonHash, TON_HASH_BYTES};

/// Sequential reader over the bits and references of a cell.
pub struct CellParser<'a> {
    pub(crate) bit_len: usize,
    pub(crate) bit_reader: BitReader<Cursor<&'a [u8]>, BigEndian>,
    references: &'a [CellId],
    next_ref: usize,
}

impl<'a> CellParser<'a> {
    pub fn new(bit_len: usize, data: &'a [u8], references: &'a [CellId]) -> Self {
        let bit_reader = BitReader::endian(Cursor::new(data), BigEndian);
        CellParser {
            bit_len,
            bit_reader,
            references,
            next_ref: 0,
        }
    }

    pub fn remaining_bits(&mut self) -> usize {
        let pos = self.bit_reader.position_in_bits().unwrap_or_default() as usize;
        self.bit_len.saturating_sub(pos)
    }

    pub fn remaining_refs(&self) -> usize {
        self.references.len() - self.next_ref
    }

    pub fn load_bit(&mut self) -> Result<bool, TonCellError> {
        self.ensure_enough_bits(1)?;
        self.bit_reader.read_bit().map_cell_parser_error()
    }

    pub fn load_u8(&mut self, bit_len: usize) -> Result<u8, TonCellError> {
        self.load_number(bit_len)
    }

    pub fn load_i8(&mut self, bit_len: usize) -> Result<i8, TonCellError> {
        self.load_signed_number(bit_len)
    }

    pub fn load_u32(&mut self, bit_len: usize) -> Result<u32, TonCellError> {
        self.load_number(bit_len)
    }

    pub fn load_i32(&mut self, bit_len: usize) -> Result<i32, TonCellError> {
        self.load_signed_number(bit_len)
    }

    pub fn load_u64(&mut self, bit_len: usize) -> Result<u64, TonCellError> {
        self.load_number(bit_len)
    }

    pub fn load_i64(&mut self, bit_len: usize) -> Result<i64, TonCellError> {
        self.load_signed_number(bit_len)
    }

    pub fn load_uint(&mut self, bit_len: usize) -> Result<BigUint, TonCellError> {
        let bytes = self.load_bits(bit_len)?;
        let padding = bytes.len() * 8 - bit_len;
        Ok(BigUint::from_bytes_be(&bytes) >> padding)
    }

    /// Reads a two's complement integer of `bit_len` bits.
    pub fn load_int(&mut self, bit_len: usize) -> Result<BigInt, TonCellError> {
        let unsigned = BigInt::from(self.load_uint(bit_len)?);
        if bit_len > 0 && unsigned.bit(bit_len as u64 - 1) {
            Ok(unsigned - (BigInt::one() << bit_len))
        } else {
            Ok(unsigned)
        }
    }

    pub fn load_slice(&mut self, slice: &mut [u8]) -> Result<(), TonCellError> {
        self.ensure_enough_bits(slice.len() * 8)?;
        self.bit_reader.read_bytes(slice).map_cell_parser_error()
    }

    pub fn load_bytes(&mut self, num_bytes: usize) -> Result<Vec<u8>, TonCellError> {
        let mut res = vec![0_u8; num_bytes];
        self.load_slice(res.as_mut_slice())?;
        Ok(res)
    }

    /// Reads `num_bits` bits, left-aligned in the returned bytes.
    pub fn load_bits(&mut self, num_bits: usize) -> Result<Vec<u8>, TonCellError> {
        self.ensure_enough_bits(num_bits)?;
        let mut res = vec![0_u8; (num_bits + 7) / 8];
        self.bit_reader.read_bits(num_bits, &mut res)?;
        Ok(res)
    }

    pub fn load_utf8(&mut self, num_bytes: usize) -> Result<String, TonCellError> {
        let bytes = self.load_bytes(num_bytes)?;
        String::from_utf8(bytes).map_cell_parser_error()
    }

    pub fn load_coins(&mut self) -> Result<BigUint, TonCellError> {
        let num_bytes = self.load_u8(4)?;
        if num_bytes == 0 {
            Ok(BigUint::zero())
        } else {
            self.load_uint(num_bytes as usize * 8)
        }
    }

    pub fn load_address(&mut self) -> Result<TonAddress, TonCellError> {
        self.load_maybe_address()?
            .ok_or_else(|| TonCellError::cell_parser_error("Expected address, got addr_none"))
    }

    pub fn load_maybe_address(&mut self) -> Result<Option<TonAddress>, TonCellError> {
        let tp = self.load_u8(2)?;
        match tp {
            0b00 => Ok(None),
            0b10 => {
                self.ensure_enough_bits(1 + 8 + TON_HASH_BYTES * 8)?;
                if self.load_bit()? {
                    return Err(TonCellError::cell_parser_error(
                        "Anycast addresses are not supported",
                    ));
                }
                let workchain = self.load_i8(8)?;
                let mut hash_part: TonHash = [0; TON_HASH_BYTES];
                self.load_slice(&mut hash_part)?;
                Ok(Some(TonAddress::new(workchain as i32, hash_part)?))
            }
            tp => Err(TonCellError::cell_parser_error(format!(
                "Unsupported address type: {:#04b}",
                tp
            ))),
        }
    }

    pub fn next_reference(&mut self) -> Result<CellId, TonCellError> {
        let reference = self.references.get(self.next_ref).copied().ok_or_else(|| {
            TonCellError::cell_parser_error(format!(
                "No more references (total: {})",
                self.references.len()
            ))
        })?;
        self.next_ref += 1;
        Ok(reference)
    }

    pub fn ensure_empty(&mut self) -> Result<(), TonCellError> {
        let remaining_bits = self.remaining_bits();
        let remaining_refs = self.remaining_refs();
        if remaining_bits == 0 && remaining_refs == 0 {
            Ok(())
        } else {
            Err(TonCellError::cell_parser_error(format!(
                "Non-empty parser (remaining bits: {}, remaining refs: {})",
                remaining_bits, remaining_refs
            )))
        }
    }

    pub fn skip_bits(&mut self, num_bits: usize) -> Result<(), TonCellError> {
        self.ensure_enough_bits(num_bits)?;
        self.bit_reader
            .skip(num_bits as u32)
            .map_cell_parser_error()
    }

    fn load_number<N: Numeric>(&mut self, bit_len: usize) -> Result<N, TonCellError> {
        self.ensure_enough_bits(bit_len)?;

        self.bit_reader
            .read::<N>(bit_len as u32)
            .map_cell_parser_error()
    }

    fn load_signed_number<S: SignedNumeric + Default>(
        &mut self,
        bit_len: usize,
    ) -> Result<S, TonCellError> {
        if bit_len == 0 {
            return Ok(S::default());
        }
        self.ensure_enough_bits(bit_len)?;

        self.bit_reader
            .read_signed::<S>(bit_len as u32)
            .map_cell_parser_error()
    }

    fn ensure_enough_bits(&mut self, bit_len: usize) -> Result<(), TonCellError> {
        if self.remaining_bits() < bit_len {
            return Err(TonCellError::cell_parser_error(format!(
                "Not enough bits to read (requested: {}, remaining: {})",
                bit_len,
                self.remaining_bits()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::{BigInt, BigUint};

    use crate::cell::{CellId, CellParser, TonCellError};

    #[test]
    fn fixed_width_readers_respect_bit_len() -> Result<(), TonCellError> {
        // 1 | 0110 | 1100 0011 | 1010 0101 1111 0000 | 000...
        let data = [0b1011_0110, 0b0001_1101, 0b0010_1111, 0b1000_0000, 0, 0, 0, 0, 0];
        let mut parser = CellParser::new(66, &data, &[]);
        assert!(parser.load_bit()?);
        assert_eq!(parser.load_u8(4)?, 0b0110);
        assert_eq!(parser.load_i8(8)?, 0b1100_0011u8 as i8);
        assert_eq!(parser.load_u32(16)?, 0b1010_0101_1111_0000);
        assert_eq!(parser.remaining_bits(), 37);
        assert_eq!(parser.load_u64(37)?, 0);
        assert!(parser.load_bit().is_err());
        Ok(())
    }

    #[test]
    fn signed_readers_sign_extend() -> Result<(), TonCellError> {
        let data = [0xf0, 0x0f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe];
        let mut parser = CellParser::new(72, &data, &[]);
        assert_eq!(parser.load_i8(4)?, -1);
        assert_eq!(parser.load_i32(4)?, 0);
        assert_eq!(parser.load_i64(64)?, 0x0fff_ffff_ffff_fffe);
        assert_eq!(parser.load_i8(0)?, 0);
        Ok(())
    }

    #[test]
    fn big_integers() -> Result<(), TonCellError> {
        let data = [0xff, 0xff, 0x80, 0x00];
        let mut parser = CellParser::new(26, &data, &[]);
        assert_eq!(parser.load_int(9)?, BigInt::from(-1));
        assert_eq!(parser.load_uint(17)?, BigUint::from(0b1111_1111_0000_0000_0u32));
        assert!(parser.load_uint(1).is_err());
        Ok(())
    }

    #[test]
    fn unaligned_bytes_and_bits() -> Result<(), TonCellError> {
        let data = [0b0110_0001, 0b1011_0001, 0b1000_0000];
        let mut parser = CellParser::new(20, &data, &[]);
        parser.skip_bits(1)?;
        assert_eq!(parser.load_bytes(1)?, [0b1100_0011]);
        assert_eq!(parser.load_bits(3)?, [0b0110_0000]);
        assert_eq!(parser.load_bits(8)?, [0b0001_1000]);
        assert!(parser.load_bytes(1).is_err());
        assert!(parser.skip_bits(1).is_err());
        Ok(())
    }

    #[test]
    fn utf8_text() -> Result<(), TonCellError> {
        let mut parser = CellParser::new(32, "tonk".as_bytes(), &[]);
        assert_eq!(parser.load_utf8(3)?, "ton");
        let mut invalid = CellParser::new(8, &[0xff], &[]);
        assert!(invalid.load_utf8(1).is_err());
        Ok(())
    }

    #[test]
    fn coins() -> Result<(), TonCellError> {
        // zero, then 2 bytes 0x0102
        let data = [0b0000_0010, 0b0000_0001, 0b0000_0010, 0b0000_0000];
        let mut parser = CellParser::new(24, &data, &[]);
        assert_eq!(parser.load_coins()?, BigUint::from(0u32));
        assert_eq!(parser.load_coins()?, BigUint::from(0x0102u32));
        assert!(parser.load_coins().is_err());
        Ok(())
    }

    #[test]
    fn addresses() -> Result<(), TonCellError> {
        let mut parser = CellParser::new(3, &[0], &[]);
        assert_eq!(parser.load_maybe_address()?, None);
        assert!(parser.load_maybe_address().is_err());

        // addr_std, no anycast, workchain -1, hash of 0x11 bytes shifted by 3 bits
        let mut data = vec![0b1001_1111, 0b1110_0010];
        data.extend_from_slice(&[0x22; 31]);
        data.push(0x20);
        let mut parser = CellParser::new(267, &data, &[]);
        let address = parser.load_address()?;
        assert_eq!(address.workchain(), -1);
        assert_eq!(address.hash_part(), &[0x11; 32]);
        assert_eq!(parser.remaining_bits(), 0);

        let mut none = CellParser::new(2, &[0], &[]);
        assert!(none.load_address().is_err());
        let mut var = CellParser::new(8, &[0b1100_0000], &[]);
        assert!(var.load_maybe_address().is_err());
        Ok(())
    }

    #[test]
    fn references_and_emptiness() -> Result<(), TonCellError> {
        let refs = [CellId::from_index(2), CellId::from_index(5)];
        let mut parser = CellParser::new(3, &[0b1010_0000], &refs);
        assert_eq!(parser.remaining_refs(), 2);
        assert_eq!(parser.next_reference()?, CellId::from_index(2));
        assert_eq!(parser.load_u8(3)?, 0b101);
        assert!(parser.ensure_empty().is_err());
        assert_eq!(parser.next_reference()?, CellId::from_index(5));
        assert!(parser.next_reference().is_err());
        parser.ensure_empty()
    }
}
