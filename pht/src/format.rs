//! On-disk table format, version 1.
//!
//! A table file is a fixed 88-byte header, a data region and a trailer, all little-endian:
//!
//! | Offset | Size | Field                                   |
//! |-------:|-----:|-----------------------------------------|
//! |      0 |    8 | magic: `PPHT` `\r\n\x1a\n`              |
//! |      8 |    4 | header size (88)                        |
//! |     12 |    4 | format version (1)                      |
//! |     16 |    4 | algorithm id                            |
//! |     20 |    4 | hash function id                        |
//! |     24 |    4 | masking function id                     |
//! |     28 |    4 | number of keys                          |
//! |     32 |    4 | table size                              |
//! |     36 |    4 | number of vertices                      |
//! |     40 |    4 | number of seeds (4)                     |
//! |     44 |   16 | seeds                                   |
//! |     60 |    4 | flags (0)                               |
//! |     64 |    8 | data region offset                      |
//! |     72 |    8 | data region length                      |
//! |     80 |    8 | trailer length                          |
//!
//! The layout of the data region is chosen by the algorithm. The trailer is a sequence of records,
//! each a `u32` tag, a `u32` payload length and the payload. A checksum record is mandatory; unknown
//! tags are skipped, so records can be added without bumping the version.
//!
//! The checksum is a CRC32 over the header up to, but not including, the trailer length, followed by
//! the data region. Appending records therefore doesn't invalidate it.

use crate::algorithm::Algorithm;
use crate::allocator::Allocator;
use crate::context::ConstructionStats;
use crate::error::{Error, Result};
use crate::hash::NUMBER_OF_SEEDS;
use crate::table::PerfectHashTable;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

/// Low half of the magic number.
pub const MAGIC_LOW: u32 = 0x5448_5050;
/// High half of the magic number.
pub const MAGIC_HIGH: u32 = 0x0A1A_0A0D;
/// Size of the version 1 header.
pub const HEADER_SIZE: u32 = 88;
/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Offset of the trailer length field, where checksum coverage of the header ends.
const TRAILER_LENGTH_OFFSET: usize = 80;
/// Size of a trailer record's tag and length.
const RECORD_HEADER_SIZE: usize = 8;

/// Trailer record holding the checksum.
pub const TAG_CHECKSUM: u32 = 1;
/// Trailer record holding [`ConstructionStats`].
pub const TAG_STATS: u32 = 2;

/// Payload size of a [`TAG_STATS`] record.
const STATS_SIZE: usize = 32;

/// Decoded file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Header {
    /// Size of the header in bytes.
    pub size_of_header: u32,
    /// Format version.
    pub version: u32,
    /// [`Algorithm`] id.
    pub algorithm_id: u32,
    /// Hash function id.
    pub hash_function_id: u32,
    /// Masking function id.
    pub mask_function_id: u32,
    /// Number of keys.
    pub number_of_keys: u32,
    /// Number of value slots.
    pub table_size: u32,
    /// Number of graph vertices.
    pub number_of_vertices: u32,
    /// Number of seeds.
    pub number_of_seeds: u32,
    /// Seeds of the hash function.
    pub seeds: [u32; NUMBER_OF_SEEDS],
    /// Reserved.
    pub flags: u32,
    /// Offset of the data region.
    pub data_offset: u64,
    /// Length of the data region.
    pub data_length: u64,
    /// Length of the trailer.
    pub trailer_length: u64,
}

impl Header {
    /// Describe `table`.
    fn for_table(table: &PerfectHashTable<'_>, data_length: u64, trailer_length: u64) -> Self {
        Self {
            size_of_header: HEADER_SIZE,
            version: FORMAT_VERSION,
            algorithm_id: table.algorithm().id(),
            hash_function_id: table.hash_function().id(),
            mask_function_id: table.mask_function().id(),
            number_of_keys: table.number_of_keys(),
            table_size: table.table_size(),
            number_of_vertices: table.number_of_vertices(),
            number_of_seeds: NUMBER_OF_SEEDS as u32,
            seeds: *table.seeds().as_array(),
            flags: 0,
            data_offset: u64::from(HEADER_SIZE),
            data_length,
            trailer_length,
        }
    }

    /// Read a header, magic included.
    fn read_from(mut bytes: &[u8]) -> std::io::Result<Self> {
        bytes.read_u32::<LittleEndian>()?;
        bytes.read_u32::<LittleEndian>()?;
        let size_of_header = bytes.read_u32::<LittleEndian>()?;
        let version = bytes.read_u32::<LittleEndian>()?;
        let algorithm_id = bytes.read_u32::<LittleEndian>()?;
        let hash_function_id = bytes.read_u32::<LittleEndian>()?;
        let mask_function_id = bytes.read_u32::<LittleEndian>()?;
        let number_of_keys = bytes.read_u32::<LittleEndian>()?;
        let table_size = bytes.read_u32::<LittleEndian>()?;
        let number_of_vertices = bytes.read_u32::<LittleEndian>()?;
        let number_of_seeds = bytes.read_u32::<LittleEndian>()?;
        let mut seeds = [0; NUMBER_OF_SEEDS];
        bytes.read_u32_into::<LittleEndian>(&mut seeds)?;
        Ok(Self {
            size_of_header,
            version,
            algorithm_id,
            hash_function_id,
            mask_function_id,
            number_of_keys,
            table_size,
            number_of_vertices,
            number_of_seeds,
            seeds,
            flags: bytes.read_u32::<LittleEndian>()?,
            data_offset: bytes.read_u64::<LittleEndian>()?,
            data_length: bytes.read_u64::<LittleEndian>()?,
            trailer_length: bytes.read_u64::<LittleEndian>()?,
        })
    }

    /// Write the header, magic included.
    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(MAGIC_LOW)?;
        out.write_u32::<LittleEndian>(MAGIC_HIGH)?;
        for field in [
            self.size_of_header,
            self.version,
            self.algorithm_id,
            self.hash_function_id,
            self.mask_function_id,
            self.number_of_keys,
            self.table_size,
            self.number_of_vertices,
            self.number_of_seeds,
        ] {
            out.write_u32::<LittleEndian>(field)?;
        }
        for seed in self.seeds {
            out.write_u32::<LittleEndian>(seed)?;
        }
        out.write_u32::<LittleEndian>(self.flags)?;
        out.write_u64::<LittleEndian>(self.data_offset)?;
        out.write_u64::<LittleEndian>(self.data_length)?;
        out.write_u64::<LittleEndian>(self.trailer_length)
    }
}

impl ConstructionStats {
    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        out.write_u64::<LittleEndian>(self.attempts)?;
        out.write_u32::<LittleEndian>(self.resizes)?;
        out.write_u32::<LittleEndian>(self.winning_worker)?;
        out.write_u64::<LittleEndian>(self.winning_attempt)?;
        out.write_u64::<LittleEndian>(self.solve_micros)
    }

    fn read_from(mut bytes: &[u8]) -> std::io::Result<Self> {
        Ok(Self {
            attempts: bytes.read_u64::<LittleEndian>()?,
            resizes: bytes.read_u32::<LittleEndian>()?,
            winning_worker: bytes.read_u32::<LittleEndian>()?,
            winning_attempt: bytes.read_u64::<LittleEndian>()?,
            solve_micros: bytes.read_u64::<LittleEndian>()?,
        })
    }
}

/// Checksum of a header and data region laid out contiguously in `bytes`.
fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[..TRAILER_LENGTH_OFFSET]);
    hasher.update(&bytes[HEADER_SIZE as usize..]);
    hasher.finalize()
}

fn write_record(out: &mut Vec<u8>, tag: u32, payload: &[u8]) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(tag)?;
    out.write_u32::<LittleEndian>(u32::try_from(payload.len()).unwrap_or(u32::MAX))?;
    out.write_all(payload)
}

/// Serialize `table`.
///
/// # Errors
///
/// Propagates I/O errors of the in-memory writer.
pub fn serialize(table: &PerfectHashTable<'_>) -> Result<Vec<u8>> {
    let data_length = 4 * (u64::from(table.number_of_vertices()) + u64::from(table.table_size()));

    let mut stats_record = Vec::new();
    if let Some(stats) = table.stats() {
        let mut payload = Vec::with_capacity(STATS_SIZE);
        stats.write_to(&mut payload)?;
        write_record(&mut stats_record, TAG_STATS, &payload)?;
    }
    let checksum_record_size = RECORD_HEADER_SIZE + 4;
    let trailer_length = (stats_record.len() + checksum_record_size) as u64;

    let header = Header::for_table(table, data_length, trailer_length);
    let mut out = Vec::with_capacity(HEADER_SIZE as usize + (data_length + trailer_length) as usize);
    header.write_to(&mut out)?;
    for &value in table.assigned().iter().chain(table.values()) {
        out.write_u32::<LittleEndian>(value)?;
    }

    let crc = checksum(&out);
    out.extend_from_slice(&stats_record);
    write_record(&mut out, TAG_CHECKSUM, &crc.to_le_bytes())?;
    Ok(out)
}

/// Records found in a trailer.
struct Trailer {
    checksum: u32,
    stats: Option<ConstructionStats>,
}

fn parse_trailer(mut bytes: &[u8]) -> Result<Trailer> {
    let mut checksum = None;
    let mut stats = None;
    while !bytes.is_empty() {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(Error::CorruptFormat("partial trailer record"));
        }
        let tag = bytes.read_u32::<LittleEndian>()?;
        let length = bytes.read_u32::<LittleEndian>()? as usize;
        if bytes.len() < length {
            return Err(Error::CorruptFormat("trailer record overruns the file"));
        }
        let (payload, rest) = bytes.split_at(length);
        bytes = rest;
        match tag {
            TAG_CHECKSUM => {
                if length != 4 {
                    return Err(Error::CorruptFormat("bad checksum record"));
                }
                checksum = Some((&*payload).read_u32::<LittleEndian>()?);
            }
            TAG_STATS => {
                if length < STATS_SIZE {
                    return Err(Error::CorruptFormat("bad statistics record"));
                }
                stats = Some(ConstructionStats::read_from(payload)?);
            }
            _ => {}
        }
    }
    Ok(Trailer {
        checksum: checksum.ok_or(Error::CorruptFormat("missing checksum"))?,
        stats,
    })
}

const fn truncated(needed: u64, found: usize) -> Error {
    Error::TruncatedFile {
        needed,
        found: found as u64,
    }
}

/// Parse and validate a table file.
///
/// Checks run in this order: magic, header length, algorithm id, region lengths against the file
/// length, header size and version, algorithm-specific fields, checksum.
///
/// # Errors
///
/// - [`Error::TruncatedFile`] if the file is shorter than its header or declared regions.
/// - [`Error::CorruptFormat`] for a bad magic number, trailing bytes, inconsistent lengths or
///   dimensions, malformed trailer records or a checksum mismatch.
/// - [`Error::UnsupportedVersion`] for unknown algorithm, hash or masking ids, versions and header
///   sizes.
/// - [`Error::OutOfMemory`] if the allocator refuses the table's buffers.
pub fn deserialize<'a>(bytes: &[u8], allocator: &'a dyn Allocator) -> Result<PerfectHashTable<'a>> {
    if bytes.len() < 8 {
        return Err(truncated(8, bytes.len()));
    }
    let mut magic = bytes;
    if magic.read_u32::<LittleEndian>()? != MAGIC_LOW || magic.read_u32::<LittleEndian>()? != MAGIC_HIGH
    {
        return Err(Error::CorruptFormat("bad magic number"));
    }
    if bytes.len() < HEADER_SIZE as usize {
        return Err(truncated(u64::from(HEADER_SIZE), bytes.len()));
    }
    let header = Header::read_from(bytes)?;

    let algorithm = Algorithm::from_id(header.algorithm_id)
        .ok_or(Error::UnsupportedVersion("unknown algorithm"))?;

    let needed = header
        .data_offset
        .checked_add(header.data_length)
        .and_then(|end| end.checked_add(header.trailer_length))
        .ok_or(Error::CorruptFormat("region lengths overflow"))?;
    if (bytes.len() as u64) < needed {
        return Err(truncated(needed, bytes.len()));
    }
    if bytes.len() as u64 > needed {
        return Err(Error::CorruptFormat("trailing bytes after the trailer"));
    }

    if header.size_of_header != HEADER_SIZE {
        return Err(Error::UnsupportedVersion("header size"));
    }
    if header.version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion("format version"));
    }
    if header.data_offset != u64::from(HEADER_SIZE) {
        return Err(Error::CorruptFormat("data region does not follow the header"));
    }
    if header.number_of_seeds as usize != NUMBER_OF_SEEDS {
        return Err(Error::CorruptFormat("number of seeds"));
    }

    // `needed` fits in the slice length, so these conversions are lossless.
    let data_end = (header.data_offset + header.data_length) as usize;
    let trailer = parse_trailer(&bytes[data_end..])?;
    let data = &bytes[HEADER_SIZE as usize..data_end];

    let table = algorithm.load(&header, data, trailer.stats, allocator)?;
    if checksum(&bytes[..data_end]) != trailer.checksum {
        return Err(Error::CorruptFormat("checksum mismatch"));
    }
    Ok(table)
}
