use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};

use crate::cell::error::TonCellError;
use crate::cell::{CellParser, MAX_CELL_BITS};
use crate::types::TonAddress;

/// Number of bits taken by `addr_std$10` without anycast.
pub(crate) const STD_ADDRESS_BITS: usize = 2 + 1 + 8 + 256;

const MAX_COINS_BYTES: usize = 15;

/// Bounded bit string with typed writers.
///
/// Bits are stored big-endian within bytes; bits past `bit_len` are always zero.
/// Reading goes through [`CellParser`], which keeps its own cursor.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BitBuffer {
    data: Vec<u8>,
    bit_len: usize,
    capacity: usize,
}

impl BitBuffer {
    pub fn new(capacity: usize) -> BitBuffer {
        BitBuffer {
            data: Vec::with_capacity((capacity + 7) / 8),
            bit_len: 0,
            capacity,
        }
    }

    /// Imports `bit_len` bits from `bytes`, ignoring any trailing bits.
    pub fn from_bytes(bytes: &[u8], bit_len: usize) -> Result<BitBuffer, TonCellError> {
        if bit_len > MAX_CELL_BITS {
            return Err(TonCellError::CellOverflow {
                capacity: MAX_CELL_BITS,
                requested: bit_len,
            });
        }
        let byte_len = (bit_len + 7) / 8;
        if bytes.len() < byte_len {
            return Err(TonCellError::encoding_range_error(format!(
                "{} bytes can't hold {} bits",
                bytes.len(),
                bit_len
            )));
        }
        let mut data = bytes[..byte_len].to_vec();
        let tail_bits = bit_len % 8;
        if tail_bits != 0 {
            data[byte_len - 1] &= 0xffu8 << (8 - tail_bits);
        }
        Ok(BitBuffer {
            data,
            bit_len,
            capacity: MAX_CELL_BITS,
        })
    }

    /// Imports bytes whose last byte carries a completion tag: the lowest set bit
    /// marks the end of data and is not part of it.
    pub fn from_padded_bytes(bytes: &[u8]) -> Result<BitBuffer, TonCellError> {
        let Some(&last) = bytes.last() else {
            return Ok(BitBuffer::default());
        };
        if last == 0 {
            return Err(TonCellError::encoding_range_error(
                "Last byte must carry a completion tag",
            ));
        }
        let bit_len = bytes.len() * 8 - last.trailing_zeros() as usize - 1;
        BitBuffer::from_bytes(bytes, bit_len)
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_bits(&self) -> usize {
        self.capacity - self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Data bytes, the unused bits of the last byte are zero.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_bit(&self, idx: usize) -> Option<bool> {
        if idx >= self.bit_len {
            return None;
        }
        Some(self.data[idx / 8] & (0x80 >> (idx % 8)) != 0)
    }

    /// Byte-aligned export: a partial last byte gets a single `1` bit followed by zeros.
    pub fn to_padded_bytes(&self) -> Vec<u8> {
        let mut bytes = self.data.clone();
        let tail_bits = self.bit_len % 8;
        if tail_bits != 0 {
            if let Some(last) = bytes.last_mut() {
                *last |= 0x80 >> tail_bits;
            }
        }
        bytes
    }

    /// Fift-style hex: full nibbles as is, otherwise the completion-tagged nibble and `_`.
    pub fn to_hex_string(&self) -> String {
        let nibbles = (self.bit_len + 3) / 4;
        let tagged = self.bit_len % 4 != 0;
        let mut bytes = self.data.clone();
        if tagged {
            bytes[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        let mut res: String = (0..nibbles)
            .map(|i| {
                let byte = bytes[i / 2];
                let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                format!("{:X}", nibble)
            })
            .collect();
        if tagged {
            res.push('_');
        }
        res
    }

    pub fn parser(&self) -> CellParser<'_> {
        CellParser::new(self.bit_len, &self.data, &[])
    }

    pub fn store_bit(&mut self, val: bool) -> Result<&mut Self, TonCellError> {
        self.ensure_capacity(1)?;
        self.push_bit(val);
        Ok(self)
    }

    pub fn store_u8(&mut self, bit_len: usize, val: u8) -> Result<&mut Self, TonCellError> {
        self.store_unsigned(bit_len, val as u64, 8)
    }

    pub fn store_u16(&mut self, bit_len: usize, val: u16) -> Result<&mut Self, TonCellError> {
        self.store_unsigned(bit_len, val as u64, 16)
    }

    pub fn store_u32(&mut self, bit_len: usize, val: u32) -> Result<&mut Self, TonCellError> {
        self.store_unsigned(bit_len, val as u64, 32)
    }

    pub fn store_u64(&mut self, bit_len: usize, val: u64) -> Result<&mut Self, TonCellError> {
        self.store_unsigned(bit_len, val, 64)
    }

    pub fn store_i8(&mut self, bit_len: usize, val: i8) -> Result<&mut Self, TonCellError> {
        self.store_signed(bit_len, val as i64, 8)
    }

    pub fn store_i32(&mut self, bit_len: usize, val: i32) -> Result<&mut Self, TonCellError> {
        self.store_signed(bit_len, val as i64, 32)
    }

    pub fn store_i64(&mut self, bit_len: usize, val: i64) -> Result<&mut Self, TonCellError> {
        self.store_signed(bit_len, val, 64)
    }

    pub fn store_uint(&mut self, bit_len: usize, val: &BigUint) -> Result<&mut Self, TonCellError> {
        let value_bits = val.bits() as usize;
        if value_bits > bit_len {
            return Err(TonCellError::encoding_range_error(format!(
                "Value {} doesn't fit in {} bits (takes {} bits)",
                val, bit_len, value_bits
            )));
        }
        self.ensure_capacity(bit_len)?;
        for _ in value_bits..bit_len {
            self.push_bit(false);
        }
        for i in (0..value_bits).rev() {
            self.push_bit(val.bit(i as u64));
        }
        Ok(self)
    }

    /// Two's complement of `val` in `bit_len` bits.
    pub fn store_int(&mut self, bit_len: usize, val: &BigInt) -> Result<&mut Self, TonCellError> {
        if bit_len == 0 {
            if val.is_zero() {
                return Ok(self);
            }
            return Err(TonCellError::encoding_range_error(format!(
                "Value {} doesn't fit in 0 bits",
                val
            )));
        }
        let half = BigInt::one() << (bit_len - 1);
        if *val >= half || *val < -&half {
            return Err(TonCellError::encoding_range_error(format!(
                "Value {} doesn't fit in {} signed bits",
                val, bit_len
            )));
        }
        let unsigned = if val.sign() == Sign::Minus {
            (BigInt::one() << bit_len) + val
        } else {
            val.clone()
        };
        let (_, magnitude) = unsigned.into_parts();
        self.store_uint(bit_len, &magnitude)
    }

    pub fn store_byte(&mut self, val: u8) -> Result<&mut Self, TonCellError> {
        self.store_u8(8, val)
    }

    pub fn store_slice(&mut self, slice: &[u8]) -> Result<&mut Self, TonCellError> {
        self.ensure_capacity(slice.len() * 8)?;
        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(slice);
            self.bit_len += slice.len() * 8;
        } else {
            for byte in slice {
                self.push_bits(8, *byte as u64);
            }
        }
        Ok(self)
    }

    /// Stores the first `bit_len` bits of `slice`.
    pub fn store_bits(&mut self, bit_len: usize, slice: &[u8]) -> Result<&mut Self, TonCellError> {
        if slice.len() * 8 < bit_len {
            return Err(TonCellError::encoding_range_error(format!(
                "{} bytes can't hold {} bits",
                slice.len(),
                bit_len
            )));
        }
        self.ensure_capacity(bit_len)?;
        let full_bytes = bit_len / 8;
        self.store_slice(&slice[..full_bytes])?;
        let last_byte_len = bit_len % 8;
        if last_byte_len != 0 {
            let last_byte = slice[full_bytes] >> (8 - last_byte_len);
            self.push_bits(last_byte_len, last_byte as u64);
        }
        Ok(self)
    }

    pub fn store_bit_buffer(&mut self, other: &BitBuffer) -> Result<&mut Self, TonCellError> {
        self.store_bits(other.bit_len, &other.data)
    }

    pub fn store_string(&mut self, val: &str) -> Result<&mut Self, TonCellError> {
        self.store_slice(val.as_bytes())
    }

    /// `VarUInteger 16`: 4-bit byte length, then the minimal big-endian bytes.
    pub fn store_coins(&mut self, val: &BigUint) -> Result<&mut Self, TonCellError> {
        let num_bytes = (val.bits() as usize + 7) / 8;
        if num_bytes > MAX_COINS_BYTES {
            return Err(TonCellError::encoding_range_error(format!(
                "Coins value {} takes {} bytes, max is {}",
                val, num_bytes, MAX_COINS_BYTES
            )));
        }
        self.ensure_capacity(4 + num_bytes * 8)?;
        self.push_bits(4, num_bytes as u64);
        self.store_uint(num_bytes * 8, val)
    }

    /// `addr_std$10 anycast:0 workchain_id:int8 address:bits256`
    pub fn store_address(&mut self, val: &TonAddress) -> Result<&mut Self, TonCellError> {
        self.ensure_capacity(STD_ADDRESS_BITS)?;
        self.push_bits(2, 0b10);
        self.push_bit(false);
        self.push_bits(8, val.workchain() as u8 as u64);
        self.store_slice(val.hash_part())
    }

    /// Same as [`BitBuffer::store_address`], `addr_none$00` for `None`.
    pub fn store_maybe_address(
        &mut self,
        val: Option<&TonAddress>,
    ) -> Result<&mut Self, TonCellError> {
        match val {
            Some(addr) => self.store_address(addr),
            None => self.store_u8(2, 0),
        }
    }

    fn store_unsigned(
        &mut self,
        bit_len: usize,
        val: u64,
        type_bits: usize,
    ) -> Result<&mut Self, TonCellError> {
        if bit_len > type_bits || (bit_len < 64 && val >> bit_len != 0) {
            return Err(TonCellError::encoding_range_error(format!(
                "Value {} doesn't fit in {} bits",
                val, bit_len
            )));
        }
        self.ensure_capacity(bit_len)?;
        self.push_bits(bit_len, val);
        Ok(self)
    }

    fn store_signed(
        &mut self,
        bit_len: usize,
        val: i64,
        type_bits: usize,
    ) -> Result<&mut Self, TonCellError> {
        let fits = match bit_len {
            0 => val == 0,
            1..=63 => {
                let half = 1i64 << (bit_len - 1);
                (-half..half).contains(&val)
            }
            _ => true,
        };
        if bit_len > type_bits || !fits {
            return Err(TonCellError::encoding_range_error(format!(
                "Value {} doesn't fit in {} signed bits",
                val, bit_len
            )));
        }
        self.ensure_capacity(bit_len)?;
        self.push_bits(bit_len, val as u64);
        Ok(self)
    }

    fn ensure_capacity(&self, bit_len: usize) -> Result<(), TonCellError> {
        if self.bit_len + bit_len > self.capacity {
            return Err(TonCellError::CellOverflow {
                capacity: self.capacity,
                requested: self.bit_len + bit_len,
            });
        }
        Ok(())
    }

    fn push_bits(&mut self, bit_len: usize, val: u64) {
        for i in (0..bit_len).rev() {
            self.push_bit((val >> i) & 1 == 1);
        }
    }

    fn push_bit(&mut self, val: bool) {
        let byte_idx = self.bit_len / 8;
        if byte_idx == self.data.len() {
            self.data.push(0);
        }
        if val {
            self.data[byte_idx] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }
}

impl Default for BitBuffer {
    fn default() -> Self {
        BitBuffer::new(MAX_CELL_BITS)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use num_bigint::{BigInt, BigUint};

    use crate::cell::{BitBuffer, TonCellError};
    use crate::types::TonAddress;

    #[test]
    fn write_bit() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_bit(true)?;
        assert_eq!(buffer.data(), [0b1000_0000]);
        assert_eq!(buffer.bit_len(), 1);
        assert!(buffer.parser().load_bit()?);
        Ok(())
    }

    #[test]
    fn write_u8() -> Result<(), TonCellError> {
        let value = 234u8;
        let mut buffer = BitBuffer::default();
        buffer.store_u8(8, value)?;
        assert_eq!(buffer.data(), [0b1110_1010]);
        assert_eq!(buffer.bit_len(), 8);
        assert_eq!(buffer.parser().load_u8(8)?, value);
        Ok(())
    }

    #[test]
    fn write_u32() -> Result<(), TonCellError> {
        let value = 0xFAD45AADu32;
        let mut buffer = BitBuffer::default();
        buffer.store_u32(32, value)?;
        assert_eq!(buffer.data(), [0xFA, 0xD4, 0x5A, 0xAD]);
        assert_eq!(buffer.parser().load_u32(32)?, value);
        Ok(())
    }

    #[test]
    fn write_u64_unaligned() -> Result<(), TonCellError> {
        let value = 0xFAD45AADAA12FF45;
        let mut buffer = BitBuffer::default();
        buffer.store_bit(false)?.store_u64(64, value)?;
        assert_eq!(buffer.bit_len(), 65);
        let mut parser = buffer.parser();
        assert!(!parser.load_bit()?);
        assert_eq!(parser.load_u64(64)?, value);
        Ok(())
    }

    #[test]
    fn write_out_of_range() {
        let mut buffer = BitBuffer::default();
        assert!(matches!(
            buffer.store_u8(3, 8),
            Err(TonCellError::EncodingRange(_))
        ));
        assert!(matches!(
            buffer.store_u8(9, 1),
            Err(TonCellError::EncodingRange(_))
        ));
        assert!(matches!(
            buffer.store_i8(4, 8),
            Err(TonCellError::EncodingRange(_))
        ));
        assert!(matches!(
            buffer.store_i8(4, -9),
            Err(TonCellError::EncodingRange(_))
        ));
        assert!(matches!(
            buffer.store_uint(8, &BigUint::from(256u32)),
            Err(TonCellError::EncodingRange(_))
        ));
        assert_eq!(buffer.bit_len(), 0);
    }

    #[test]
    fn write_signed() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_i8(8, -1)?.store_i32(5, -16)?.store_i64(3, 3)?;
        assert_eq!(buffer.bit_len(), 16);
        assert_eq!(buffer.data(), [0xff, 0b1000_0011]);
        let mut parser = buffer.parser();
        assert_eq!(parser.load_i8(8)?, -1);
        assert_eq!(parser.load_i32(5)?, -16);
        assert_eq!(parser.load_i64(3)?, 3);
        Ok(())
    }

    #[test]
    fn write_big_int() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_int(20, &BigInt::from(-2))?;
        buffer.store_uint(100, &BigUint::from(u64::MAX))?;
        assert_eq!(buffer.bit_len(), 120);
        let mut parser = buffer.parser();
        assert_eq!(parser.load_int(20)?, BigInt::from(-2));
        assert_eq!(parser.load_uint(100)?, BigUint::from(u64::MAX));

        let mut buffer = BitBuffer::default();
        assert!(buffer.store_int(8, &BigInt::from(128)).is_err());
        assert!(buffer.store_int(8, &BigInt::from(-129)).is_err());
        buffer.store_int(8, &BigInt::from(-128))?;
        assert_eq!(buffer.data(), [0x80]);
        Ok(())
    }

    #[test]
    fn write_slice_unaligned() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_u8(4, 0xf)?.store_slice(&[0x12, 0x34])?;
        assert_eq!(buffer.data(), [0xf1, 0x23, 0x40]);
        assert_eq!(buffer.bit_len(), 20);
        Ok(())
    }

    #[test]
    fn write_bits() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_bits(11, &[0xab, 0xe0])?;
        assert_eq!(buffer.data(), [0xab, 0xe0]);
        assert_eq!(buffer.bit_len(), 11);
        assert!(buffer.store_bits(17, &[0, 0]).is_err());
        Ok(())
    }

    #[test]
    fn write_str() -> Result<(), TonCellError> {
        let texts = ["hello", "Русский текст", "中华人民共和国", "\u{263A}😃"];
        for text in texts {
            let mut buffer = BitBuffer::default();
            buffer.store_string(text)?;
            let bytes = buffer.bit_len() / 8;
            assert_eq!(buffer.parser().load_utf8(bytes)?, text);
        }
        Ok(())
    }

    #[test]
    fn write_coins() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_coins(&BigUint::from(0u32))?;
        assert_eq!(buffer.bit_len(), 4);
        assert_eq!(buffer.data(), [0]);

        let mut buffer = BitBuffer::default();
        buffer.store_coins(&BigUint::from(255u32))?;
        assert_eq!(buffer.bit_len(), 12);
        assert_eq!(buffer.data(), [0x1f, 0xf0]);

        let mut buffer = BitBuffer::default();
        buffer.store_coins(&BigUint::from(256u32))?;
        assert_eq!(buffer.bit_len(), 20);
        assert_eq!(buffer.parser().load_coins()?, BigUint::from(256u32));

        let too_big = BigUint::from(1u32) << 120;
        assert!(matches!(
            buffer.store_coins(&too_big),
            Err(TonCellError::EncodingRange(_))
        ));
        Ok(())
    }

    #[test]
    fn write_address() -> anyhow::Result<()> {
        let addr = TonAddress::from_str("EQDk2VTvn04SUKJrW7rXahzdF8_Qi6utb0wj43InCu9vdjrR")?;
        let mut buffer = BitBuffer::default();
        buffer.store_address(&addr)?;
        assert_eq!(
            buffer.data(),
            [
                128, 28, 155, 42, 157, 243, 233, 194, 74, 20, 77, 107, 119, 90, 237, 67, 155, 162,
                249, 250, 17, 117, 117, 173, 233, 132, 124, 110, 68, 225, 93, 237, 238, 192
            ]
        );
        assert_eq!(buffer.bit_len(), 267);
        assert_eq!(buffer.parser().load_address()?, addr);
        Ok(())
    }

    #[test]
    fn write_none_address() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_maybe_address(None)?;
        assert_eq!(buffer.bit_len(), 2);
        assert_eq!(buffer.parser().load_maybe_address()?, None);
        Ok(())
    }

    #[test]
    fn overflow_is_rejected() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::new(10);
        buffer.store_u8(8, 1)?;
        assert_eq!(
            buffer.store_u8(3, 1).err(),
            Some(TonCellError::CellOverflow {
                capacity: 10,
                requested: 11
            })
        );
        assert_eq!(buffer.bit_len(), 8);
        buffer.store_u8(2, 3)?;
        assert_eq!(buffer.remaining_bits(), 0);

        let mut buffer = BitBuffer::default();
        buffer.store_slice(&[0xff; 127])?;
        assert!(buffer.store_u8(8, 0).is_err());
        buffer.store_u8(7, 0)?;
        assert_eq!(buffer.bit_len(), 1023);
        Ok(())
    }

    #[test]
    fn padding_round_trip() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_u8(5, 0b10110)?;
        assert_eq!(buffer.to_padded_bytes(), [0b1011_0100]);
        let restored = BitBuffer::from_padded_bytes(&buffer.to_padded_bytes())?;
        assert_eq!(restored, buffer);
        let restored = BitBuffer::from_bytes(&buffer.to_padded_bytes(), 5)?;
        assert_eq!(restored, buffer);

        let mut aligned = BitBuffer::default();
        aligned.store_u8(8, 0xa5)?;
        assert_eq!(aligned.to_padded_bytes(), [0xa5]);
        assert!(BitBuffer::from_padded_bytes(&[0x12, 0x00]).is_err());
        Ok(())
    }

    #[test]
    fn hex_string() -> Result<(), TonCellError> {
        let mut buffer = BitBuffer::default();
        buffer.store_u8(8, 0xa5)?;
        assert_eq!(buffer.to_hex_string(), "A5");
        buffer.store_u8(4, 0x3)?;
        assert_eq!(buffer.to_hex_string(), "A53");
        buffer.store_bit(true)?;
        assert_eq!(buffer.to_hex_string(), "A53C_");
        Ok(())
    }
}
