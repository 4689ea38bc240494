use std::io::Cursor;

use bitstream_io::{BigEndian, ByteRead, ByteReader, ByteWrite, ByteWriter};
use crc::Crc;
use lazy_static::lazy_static;

use crate::cell::util::number_of_bytes_to_fit;
use crate::cell::{MapTonCellError, TonCellError, MAX_CELL_REFERENCES};

lazy_static! {
    pub static ref CRC_32_ISCSI: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISCSI);
}

/// Raw representation of Cell.
///
/// References are stored as indices in the wire cell list.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub(crate) struct RawCell {
    pub(crate) data: Vec<u8>,
    pub(crate) bit_len: usize,
    pub(crate) references: Vec<usize>,
    pub(crate) is_exotic: bool,
    pub(crate) level_mask: u8,
}

/// Raw representation of BagOfCells.
///
/// `cells` must be topologically sorted: children after parents.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub(crate) struct RawBagOfCells {
    pub(crate) cells: Vec<RawCell>,
    pub(crate) roots: Vec<usize>,
}

pub(crate) const GENERIC_BOC_MAGIC: u32 = 0xb5ee9c72;
const INDEXED_BOC_MAGIC: u32 = 0x68ff65f3;
const INDEXED_CRC32_MAGIC: u32 = 0xacc3a728;

const MAX_REF_SIZE: u8 = 4;
const MAX_OFFSET_SIZE: u8 = 8;
const STORED_HASH_BYTES: usize = 32 + 2;

#[derive(Debug)]
struct BocHeader {
    has_idx: bool,
    has_crc32c: bool,
    has_cache_bits: bool,
    ref_size: u8,
    off_bytes: u8,
    cells: usize,
    roots: Vec<usize>,
    tot_cells_size: usize,
}

impl RawBagOfCells {
    pub(crate) fn parse(serial: &[u8]) -> Result<RawBagOfCells, TonCellError> {
        let mut reader: ByteReader<Cursor<&[u8]>, BigEndian> =
            ByteReader::endian(Cursor::new(serial), BigEndian);

        let header = read_header(&mut reader)?;
        log::trace!("BoC header: {:?}", header);

        //   index:has_idx?(cells * ##(off_bytes * 8))
        let mut index = Vec::new();
        if header.has_idx {
            index.reserve(header.cells.min(serial.len()));
            for _ in 0..header.cells {
                let mut offset = read_var_size(&mut reader, header.off_bytes)?;
                if header.has_cache_bits {
                    offset >>= 1;
                }
                index.push(offset);
            }
        }

        //   cell_data:(tot_cells_size * [ uint8 ])
        let data_start = position(&mut reader);
        let mut cells = Vec::with_capacity(header.cells.min(serial.len()));
        for cell_index in 0..header.cells {
            let cell = read_cell(&mut reader, header.ref_size, cell_index, header.cells)?;
            if let Some(&end) = index.get(cell_index) {
                let actual_end = position(&mut reader) - data_start;
                if end != actual_end {
                    return Err(TonCellError::boc_format_error(format!(
                        "Index mismatch for cell {}: expected end {}, actual {}",
                        cell_index, end, actual_end
                    )));
                }
            }
            cells.push(cell);
        }
        let data_size = position(&mut reader) - data_start;
        if data_size != header.tot_cells_size {
            return Err(TonCellError::boc_format_error(format!(
                "Declared cell data size {} doesn't match actual {}",
                header.tot_cells_size, data_size
            )));
        }

        //   crc32c:has_crc32c?uint32
        if header.has_crc32c {
            let consumed = position(&mut reader);
            let actual = CRC_32_ISCSI.checksum(&serial[..consumed]);
            let mut crc_bytes = [0u8; 4];
            reader
                .read_bytes(&mut crc_bytes)
                .map_boc_format_error()?;
            let expected = u32::from_le_bytes(crc_bytes);
            if expected != actual {
                return Err(TonCellError::ChecksumMismatch { expected, actual });
            }
        }

        let consumed = position(&mut reader);
        if consumed != serial.len() {
            return Err(TonCellError::boc_format_error(format!(
                "Too much bytes: {} trailing",
                serial.len() - consumed
            )));
        }

        log::trace!(
            "Parsed BoC: {} cells, {} roots",
            cells.len(),
            header.roots.len()
        );
        Ok(RawBagOfCells {
            cells,
            roots: header.roots,
        })
    }

    pub(crate) fn serialize(&self, has_idx: bool, has_crc32: bool) -> Result<Vec<u8>, TonCellError> {
        let cells_len = self.cells.len();
        let ref_size = number_of_bytes_to_fit(cells_len as u64);
        if ref_size > MAX_REF_SIZE as usize {
            return Err(TonCellError::boc_format_error(format!(
                "Too many cells: {}",
                cells_len
            )));
        }

        let mut full_size = 0usize;
        let mut index = Vec::<usize>::with_capacity(cells_len);
        for cell in &self.cells {
            full_size += raw_cell_size(cell, ref_size);
            index.push(full_size);
        }
        let off_bytes = number_of_bytes_to_fit(full_size as u64);

        let mut writer = ByteWriter::endian(Vec::new(), BigEndian);
        writer
            .write(GENERIC_BOC_MAGIC)
            .map_internal_error()?;

        // has_idx:(## 1) has_crc32c:(## 1) has_cache_bits:(## 1) flags:(## 2) size:(## 3)
        let flags = ((has_idx as u8) << 7) | ((has_crc32 as u8) << 6) | ref_size as u8;
        writer.write(flags).map_internal_error()?;
        writer.write(off_bytes as u8).map_internal_error()?;
        write_var_size(&mut writer, cells_len, ref_size)?;
        write_var_size(&mut writer, self.roots.len(), ref_size)?;
        // Complete BOCs only
        write_var_size(&mut writer, 0, ref_size)?;
        write_var_size(&mut writer, full_size, off_bytes)?;
        for root in &self.roots {
            write_var_size(&mut writer, *root, ref_size)?;
        }
        if has_idx {
            for offset in &index {
                write_var_size(&mut writer, *offset, off_bytes)?;
            }
        }
        for cell in &self.cells {
            write_raw_cell(&mut writer, cell, ref_size)?;
        }

        let mut bytes = writer.into_writer();
        if has_crc32 {
            let cs = CRC_32_ISCSI.checksum(bytes.as_slice());
            bytes.extend_from_slice(&cs.to_le_bytes());
        }
        log::trace!(
            "Serialized BoC: {} cells, {} roots, {} bytes",
            cells_len,
            self.roots.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

fn read_header(
    reader: &mut ByteReader<Cursor<&[u8]>, BigEndian>,
) -> Result<BocHeader, TonCellError> {
    let magic = reader.read::<u32>().map_boc_format_error()?;
    let first_byte = reader.read::<u8>().map_boc_format_error()?;

    let (has_idx, has_crc32c, has_cache_bits, ref_size) = match magic {
        GENERIC_BOC_MAGIC => {
            let has_idx = (first_byte >> 7) & 1 == 1;
            let has_crc32c = (first_byte >> 6) & 1 == 1;
            let has_cache_bits = (first_byte >> 5) & 1 == 1;
            let flags = (first_byte >> 3) & 0b11;
            if flags != 0 {
                return Err(TonCellError::boc_format_error(format!(
                    "Unsupported flags: {}",
                    flags
                )));
            }
            if has_cache_bits && !has_idx {
                return Err(TonCellError::boc_format_error(
                    "Cache bits require an index",
                ));
            }
            (has_idx, has_crc32c, has_cache_bits, first_byte & 0b0000_0111)
        }
        INDEXED_BOC_MAGIC => (true, false, false, first_byte),
        INDEXED_CRC32_MAGIC => (true, true, false, first_byte),
        magic => {
            return Err(TonCellError::boc_format_error(format!(
                "Unsupported BoC magic number: {:#010x}",
                magic
            )));
        }
    };
    if ref_size == 0 || ref_size > MAX_REF_SIZE {
        return Err(TonCellError::boc_format_error(format!(
            "Invalid reference size: {}",
            ref_size
        )));
    }

    //   off_bytes:(## 8) { off_bytes <= 8 }
    let off_bytes = reader.read::<u8>().map_boc_format_error()?;
    if off_bytes == 0 || off_bytes > MAX_OFFSET_SIZE {
        return Err(TonCellError::boc_format_error(format!(
            "Invalid offset size: {}",
            off_bytes
        )));
    }
    //   cells:(##(size * 8))
    let cells = read_var_size(reader, ref_size)?;
    //   roots:(##(size * 8)) { roots >= 1 }
    let roots = read_var_size(reader, ref_size)?;
    //   absent:(##(size * 8)) { roots + absent <= cells }
    let absent = read_var_size(reader, ref_size)?;
    if roots == 0 || roots + absent > cells {
        return Err(TonCellError::boc_format_error(format!(
            "Invalid counts: cells {}, roots {}, absent {}",
            cells, roots, absent
        )));
    }
    if absent != 0 {
        return Err(TonCellError::boc_format_error(
            "Absent cells are not supported",
        ));
    }
    //   tot_cells_size:(##(off_bytes * 8))
    let tot_cells_size = read_var_size(reader, off_bytes)?;

    //   root_list:(roots * ##(size * 8))
    let root_list = if magic == GENERIC_BOC_MAGIC {
        let mut root_list = Vec::with_capacity(roots.min(cells));
        for _ in 0..roots {
            let root = read_var_size(reader, ref_size)?;
            if root >= cells {
                return Err(TonCellError::boc_format_error(format!(
                    "Root index {} is out of range ({} cells)",
                    root, cells
                )));
            }
            root_list.push(root);
        }
        root_list
    } else {
        if roots > 1 {
            return Err(TonCellError::boc_format_error(format!(
                "Indexed BoC supports a single root, got {}",
                roots
            )));
        }
        vec![0]
    };

    Ok(BocHeader {
        has_idx,
        has_crc32c,
        has_cache_bits,
        ref_size,
        off_bytes,
        cells,
        roots: root_list,
        tot_cells_size,
    })
}

fn read_cell(
    reader: &mut ByteReader<Cursor<&[u8]>, BigEndian>,
    ref_size: u8,
    cell_index: usize,
    cell_count: usize,
) -> Result<RawCell, TonCellError> {
    let d1 = reader.read::<u8>().map_boc_format_error()?;
    let d2 = reader.read::<u8>().map_boc_format_error()?;

    let level_mask = d1 >> 5;
    let has_hashes = (d1 & 16) != 0;
    let is_exotic = (d1 & 8) != 0;
    let ref_num = (d1 & 0x07) as usize;
    if ref_num > MAX_CELL_REFERENCES {
        return Err(TonCellError::boc_format_error(format!(
            "Cell {} has {} references",
            cell_index, ref_num
        )));
    }
    let data_size = ((d2 >> 1) + (d2 & 1)) as usize;
    let full_bytes = (d2 & 0x01) == 0;

    if has_hashes {
        let hash_count = level_mask.count_ones() as usize + 1;
        reader
            .skip((hash_count * STORED_HASH_BYTES) as u32)
            .map_boc_format_error()?;
    }

    let mut data = vec![0u8; data_size];
    reader.read_bytes(&mut data).map_boc_format_error()?;

    let bit_len = if data_size > 0 && !full_bytes {
        // The lowest set bit of the last byte is the completion tag
        let last = data[data_size - 1];
        if last == 0 {
            return Err(TonCellError::boc_format_error(
                "Last byte of binary must not be zero if full_byte flag is not set",
            ));
        }
        let num_zeros = last.trailing_zeros() as usize;
        data[data_size - 1] &= !(1 << num_zeros);
        data_size * 8 - num_zeros - 1
    } else {
        data_size * 8
    };

    let mut references = Vec::with_capacity(ref_num);
    for _ in 0..ref_num {
        let ref_index = read_var_size(reader, ref_size)?;
        if ref_index <= cell_index || ref_index >= cell_count {
            return Err(TonCellError::DanglingReference {
                cell_index,
                ref_index,
                cell_count,
            });
        }
        references.push(ref_index);
    }

    Ok(RawCell {
        data,
        bit_len,
        references,
        is_exotic,
        level_mask,
    })
}

fn raw_cell_size(cell: &RawCell, ref_size: usize) -> usize {
    let data_len = (cell.bit_len + 7) / 8;
    2 + data_len + cell.references.len() * ref_size
}

fn write_raw_cell(
    writer: &mut ByteWriter<Vec<u8>, BigEndian>,
    cell: &RawCell,
    ref_size: usize,
) -> Result<(), TonCellError> {
    let d1 = cell.references.len() as u8 + (cell.is_exotic as u8) * 8 + cell.level_mask * 32;

    let padding_bits = cell.bit_len % 8;
    let full_bytes = padding_bits == 0;
    let data_len = (cell.bit_len + 7) / 8;
    let data = &cell.data[..data_len];
    // floor(bits / 8) + ceil(bits / 8), at most 255 for a 1023-bit cell
    let d2 = (cell.bit_len / 8 + data_len) as u8;

    writer.write(d1).map_internal_error()?;
    writer.write(d2).map_internal_error()?;
    if !full_bytes {
        writer
            .write_bytes(&data[..data_len - 1])
            .map_internal_error()?;
        let last_byte = data[data_len - 1] | 1 << (8 - padding_bits - 1);
        writer.write(last_byte).map_internal_error()?;
    } else {
        writer.write_bytes(data).map_internal_error()?;
    }

    for r in &cell.references {
        write_var_size(writer, *r, ref_size)?;
    }

    Ok(())
}

fn position(reader: &mut ByteReader<Cursor<&[u8]>, BigEndian>) -> usize {
    reader.reader().position() as usize
}

fn read_var_size(
    reader: &mut ByteReader<Cursor<&[u8]>, BigEndian>,
    n: u8,
) -> Result<usize, TonCellError> {
    let mut bytes = [0u8; 8];
    reader
        .read_bytes(&mut bytes[..n as usize])
        .map_boc_format_error()?;

    let mut result = 0usize;
    for &byte in &bytes[..n as usize] {
        result = result
            .checked_mul(256)
            .ok_or_else(|| TonCellError::boc_format_error("Size value overflow"))?
            | usize::from(byte);
    }
    Ok(result)
}

fn write_var_size(
    writer: &mut ByteWriter<Vec<u8>, BigEndian>,
    value: usize,
    n: usize,
) -> Result<(), TonCellError> {
    let bytes = (value as u64).to_be_bytes();
    writer.write_bytes(&bytes[8 - n..]).map_internal_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(data: &[u8], bit_len: usize) -> RawCell {
        RawCell {
            data: data.to_vec(),
            bit_len,
            references: vec![],
            is_exotic: false,
            level_mask: 0,
        }
    }

    #[test]
    fn header_layout() -> Result<(), TonCellError> {
        let raw = RawBagOfCells {
            cells: vec![leaf(&[0x12, 0x30], 12)],
            roots: vec![0],
        };
        let bytes = raw.serialize(false, false)?;
        // magic, flags (size 1), off_bytes, cells, roots, absent, tot_cells_size, root, d1, d2, data
        assert_eq!(
            bytes,
            [0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x01, 0x01, 0x00, 0x04, 0x00, 0x00, 0x03, 0x12, 0x38]
        );
        assert_eq!(RawBagOfCells::parse(&bytes)?, raw);
        Ok(())
    }

    #[test]
    fn crc_is_little_endian_and_checked() -> Result<(), TonCellError> {
        let raw = RawBagOfCells {
            cells: vec![leaf(&[0xab], 8)],
            roots: vec![0],
        };
        let bytes = raw.serialize(false, true)?;
        assert_eq!(bytes[4], 0b0100_0001);
        let body_len = bytes.len() - 4;
        let crc = CRC_32_ISCSI.checksum(&bytes[..body_len]);
        assert_eq!(bytes[body_len..], crc.to_le_bytes());
        assert_eq!(RawBagOfCells::parse(&bytes)?, raw);

        let mut corrupted = bytes.clone();
        corrupted[body_len - 1] ^= 0x01;
        assert!(matches!(
            RawBagOfCells::parse(&corrupted),
            Err(TonCellError::ChecksumMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn index_round_trip() -> Result<(), TonCellError> {
        let mut root = leaf(&[0xff, 0x00], 16);
        root.references = vec![1];
        let raw = RawBagOfCells {
            cells: vec![root, leaf(&[0x80], 1)],
            roots: vec![0],
        };
        let bytes = raw.serialize(true, true)?;
        assert_eq!(bytes[4], 0b1100_0001);
        assert_eq!(RawBagOfCells::parse(&bytes)?, raw);
        Ok(())
    }

    #[test]
    fn rejects_bad_magic_and_trailing_bytes() -> Result<(), TonCellError> {
        assert!(matches!(
            RawBagOfCells::parse(&[0xde, 0xad, 0xbe, 0xef, 0x01]),
            Err(TonCellError::InvalidBocFormat(_))
        ));
        assert!(matches!(
            RawBagOfCells::parse(&[0xb5, 0xee]),
            Err(TonCellError::InvalidBocFormat(_))
        ));

        let raw = RawBagOfCells {
            cells: vec![leaf(&[], 0)],
            roots: vec![0],
        };
        let mut bytes = raw.serialize(false, false)?;
        bytes.push(0);
        assert!(matches!(
            RawBagOfCells::parse(&bytes),
            Err(TonCellError::InvalidBocFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn rejects_backward_reference() -> Result<(), TonCellError> {
        let mut child = leaf(&[], 0);
        child.references = vec![0];
        let mut root = leaf(&[], 0);
        root.references = vec![1];
        let raw = RawBagOfCells {
            cells: vec![root, child],
            roots: vec![0],
        };
        let bytes = raw.serialize(false, false)?;
        assert_eq!(
            RawBagOfCells::parse(&bytes).err(),
            Some(TonCellError::DanglingReference {
                cell_index: 1,
                ref_index: 0,
                cell_count: 2
            })
        );
        Ok(())
    }

    #[test]
    fn full_size_cells_round_trip() -> Result<(), TonCellError> {
        for bit_len in [1016, 1017, 1020, 1023] {
            let mut data = vec![0xa5u8; (bit_len + 7) / 8];
            if bit_len % 8 != 0 {
                let last = data.len() - 1;
                data[last] &= 0xffu8 << (8 - bit_len % 8);
            }
            let raw = RawBagOfCells {
                cells: vec![leaf(&data, bit_len)],
                roots: vec![0],
            };
            let bytes = raw.serialize(false, true)?;
            // d2 is floor(bits / 8) + ceil(bits / 8)
            assert_eq!(bytes[12] as usize, bit_len / 8 + (bit_len + 7) / 8);
            assert_eq!(RawBagOfCells::parse(&bytes)?, raw);
        }
        Ok(())
    }

    #[test]
    fn rejects_reference_past_last_cell() -> Result<(), TonCellError> {
        let mut root = leaf(&[], 0);
        root.references = vec![1];
        let raw = RawBagOfCells {
            cells: vec![root, leaf(&[], 0)],
            roots: vec![0],
        };
        let mut bytes = raw.serialize(false, false)?;
        // header (10 bytes) and root list (1 byte), then d1, d2 and the reference
        assert_eq!(bytes[11..14], [0x01, 0x00, 0x01]);
        bytes[13] = 0x02;
        assert_eq!(
            RawBagOfCells::parse(&bytes).err(),
            Some(TonCellError::DanglingReference {
                cell_index: 0,
                ref_index: 2,
                cell_count: 2
            })
        );
        Ok(())
    }

    #[test]
    fn parses_lean_indexed_magic() -> Result<(), TonCellError> {
        // 68ff65f3, size 1, off_bytes 1, 1 cell, 1 root, 0 absent, 3 bytes, index [3], cell
        let bytes = [
            0x68, 0xff, 0x65, 0xf3, 0x01, 0x01, 0x01, 0x01, 0x00, 0x03, 0x03, 0x00, 0x02, 0xab,
        ];
        let raw = RawBagOfCells::parse(&bytes)?;
        assert_eq!(raw.roots, vec![0]);
        assert_eq!(raw.cells, vec![leaf(&[0xab], 8)]);
        Ok(())
    }
}
