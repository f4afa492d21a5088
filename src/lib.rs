// SPDX-License-Identifier: BSD-3-Clause

//! PDP-11 Linker Object File Parser
//!
//! This crate decodes the RT-11/RSX-11 `.OBJ` format produced by the
//! PDP-11 assemblers and language processors of the era, and renders a
//! human-readable dump of what a linker would see: the Global Symbol
//! Directory, text/data blocks, and the Relocation Directory (including
//! "complex relocation" bytecode programs).
//!
//! # Overview
//!
//! An object module is a stream of back-to-back *formatted binary blocks*.
//! Every block starts with the sentinel word `000001` and ends with a
//! checksum byte chosen so the byte-sum of the whole block is zero mod 256:
//!
//! | Offset | Type   | Description                                      |
//! |--------|--------|--------------------------------------------------|
//! | 0      | `u16`  | Sentinel: `000001`                               |
//! | 2      | `u16`  | Block length (bytes from sentinel, minus one)    |
//! | 4      | `u16`  | Block type ([blocktype])                         |
//! | 6      | `[u8]` | Type-specific payload                            |
//! | len    | `u8`   | Checksum byte                                    |
//!
//! The dump is strictly read-only: nothing is linked, relocated, or
//! written back. Decoding is lenient where the format allows it — a bad
//! checksum is a warning, and a malformed directory ends only that
//! block's decoding — and every diagnostic is reported inline, at the
//! point of failure, prefixed `?OBJ -`.
//!
//! # Quick Start
//!
//! Dumping a file:
//!
//! ```no_run
//! use std::path::Path;
//! use pdp11obj::io;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let image = io::read_image(Path::new("PROG.OBJ"))?;
//!     println!("{}", image.scan());
//!     Ok(())
//! }
//! ```
//!
//! Scanning a buffer directly:
//!
//! ```
//! // An ENDMOD block with a correct checksum.
//! let image = [0x01, 0x00, 0x06, 0x00, 0x06, 0x00, 0xF3];
//! let file = pdp11obj::scan(&image);
//! assert_eq!(file.blocks().len(), 1);
//! assert!(file.blocks()[0].checksum_ok());
//! ```

use std::fmt;
use std::str;

use binrw::binrw;
use binrw::{BinRead, Endian};

pub mod cli;
pub mod io;

/// The RAD50 alphabet. A character's index in this table is its RAD50
/// value; three characters pack into one word as `c0*1600 + c1*40 + c2`.
pub const RAD50: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ$.%0123456789";

/// A 6-character symbol name packed into two RAD50 words.
///
/// # Structure on Disk
///
/// | Offset | Type  | Description             |
/// |--------|-------|-------------------------|
/// | 0      | `u16` | First three characters  |
/// | 2      | `u16` | Second three characters |
///
/// Words are accepted unconditionally: every `% 40` result indexes the
/// alphabet, so a word at or above `40 * 1600` aliases a smaller value
/// instead of failing. Period tools behaved the same way.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rad50Name([u16; 2]);

impl Rad50Name {
    pub fn new(words: [u16; 2]) -> Self {
        Self(words)
    }

    pub fn words(&self) -> [u16; 2] {
        self.0
    }

    /// Unpacks the name into six alphabet characters. The first
    /// remainder of each word lands in the *last* slot of its
    /// 3-character group.
    pub fn chars(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        for (i, word) in self.0.iter().enumerate() {
            let mut w = *word;
            for j in 0..3 {
                out[3 * i + 2 - j] = RAD50[(w % 40) as usize];
                w /= 40;
            }
        }
        out
    }

    /// Packs up to six alphabet characters, padding with spaces.
    ///
    /// Returns `None` if `name` is longer than six bytes or contains a
    /// character outside the RAD50 alphabet.
    pub fn encode(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > 6 {
            return None;
        }
        let mut chars = [b' '; 6];
        chars[..bytes.len()].copy_from_slice(bytes);

        let mut words = [0u16; 2];
        for (i, group) in chars.chunks(3).enumerate() {
            let mut w = 0u16;
            for c in group {
                let value = RAD50.iter().position(|x| x == c)?;
                w = w * 40 + value as u16;
            }
            words[i] = w;
        }
        Some(Self(words))
    }
}

impl fmt::Display for Rad50Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let chars = self.chars();
        // the alphabet is pure ASCII
        f.write_str(str::from_utf8(&chars).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Rad50Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Rad50Name(\"{self}\")")
    }
}

/// The error produced by [Cursor] reads that run past the end of their
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated;

/// A bounds-checked reader over a window of the object image.
///
/// Every decoder reads through a `Cursor` rather than doing raw offset
/// arithmetic; running out of bytes surfaces as [Truncated] instead of
/// out-of-bounds access. Offsets reported by [Cursor::offset] are
/// absolute image offsets, which is what the dump prints.
pub struct Cursor<'a> {
    data: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor over `image[offset..offset + length]`, clamped
    /// to the image bounds.
    pub fn new(image: &'a [u8], offset: usize, length: usize) -> Self {
        let start = offset.min(image.len());
        let end = offset.saturating_add(length).min(image.len());
        Self {
            data: &image[start..end],
            base: start,
            pos: 0,
        }
    }

    /// The absolute image offset of the next byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn require(&self, count: usize) -> Result<(), Truncated> {
        if self.remaining() < count {
            Err(Truncated)
        } else {
            Ok(())
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, Truncated> {
        self.require(1)?;
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a little-endian word.
    pub fn read_word(&mut self) -> Result<u16, Truncated> {
        self.require(2)?;
        let word = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(word)
    }

    /// Reads a two-word RAD50 symbol name.
    pub fn read_name(&mut self) -> Result<Rad50Name, Truncated> {
        Ok(Rad50Name([self.read_word()?, self.read_word()?]))
    }

    /// Reads a fixed-layout [binrw] structure from the current position.
    pub fn read_record<T>(&mut self) -> Result<T, Truncated>
    where
        for<'r> T: BinRead<Args<'r> = ()>,
    {
        let mut reader = binrw::io::Cursor::new(&self.data[self.pos..]);
        let record = T::read_options(&mut reader, Endian::Little, ()).map_err(|_| Truncated)?;
        self.pos += reader.position() as usize;
        Ok(record)
    }

    /// Moves to an absolute image offset, clamped to the window.
    pub fn seek_to(&mut self, offset: usize) {
        self.pos = offset.saturating_sub(self.base).min(self.data.len());
    }
}

pub mod blocktype {
    //! Formatted binary block type codes.

    /// Global Symbol Directory.
    pub const GSD: u16 = 1;

    /// End of the Global Symbol Directory.
    pub const ENDGSD: u16 = 2;

    /// Text (code/data) block with a load address.
    pub const TXT: u16 = 3;

    /// Relocation Directory for the preceding text block.
    pub const RLD: u16 = 4;

    /// Internal Symbol Directory. Not further decoded.
    pub const ISD: u16 = 5;

    /// End of module.
    pub const ENDMOD: u16 = 6;

    /// Librarian start block.
    pub const LIB: u16 = 7;

    /// Librarian end block.
    pub const LIBEND: u16 = 8;

    const NAMES: [Option<&str>; 9] = [
        None,
        Some("GSD"),
        Some("ENDGSD"),
        Some("TXT"),
        Some("RLD"),
        Some("ISD"),
        Some("ENDMOD"),
        Some("LIB"),
        Some("LIBEND"),
    ];

    /// The display name for a block type code, if it has one. Codes
    /// outside the table print numerically only.
    pub fn name(code: u16) -> Option<&'static str> {
        NAMES.get(code as usize).copied().flatten()
    }
}

/// The fixed 6-byte header of a formatted binary block.
///
/// # Structure on Disk
///
/// | Offset | Type  | Description        |
/// |--------|-------|--------------------|
/// | 0      | `u16` | Sentinel: `000001` |
/// | 2      | `u16` | Block length       |
/// | 4      | `u16` | Block type         |
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    sentinel: u16,
    length: u16,
    block_type: u16,
}

/// A fully loaded, immutable object module image.
pub struct ObjectImage {
    data: Vec<u8>,
}

impl ObjectImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decodes every block in the image. See [scan].
    pub fn scan(&self) -> ObjectFile {
        scan(&self.data)
    }
}

/// How a [Diagnostic] affects decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Reported inline; decoding continues with the next record.
    Warning,
    /// Reported inline; the record stream it occurred in ends. A fatal
    /// block-framing diagnostic ends the whole scan, a fatal directory
    /// diagnostic ends that block's directory. Output already produced
    /// is always retained.
    Fatal,
}

/// A decode problem, rendered inline exactly where it occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// Fewer than six bytes remained after a sentinel word.
    TruncatedHeader { offset: usize },
    /// A block's declared length runs past the end of the image.
    TruncatedBlock { offset: usize },
    /// The byte-sum of a block is not zero mod 256.
    BadChecksum,
    TruncatedGsd,
    TruncatedText,
    TruncatedRld,
    /// A complex relocation program used an opcode outside the table.
    BadComplexOpcode { opcode: u8 },
    /// A relocation entry type outside 1..=15.
    UnknownRldType { code: u8 },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Self::BadChecksum => Severity::Warning,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TruncatedHeader { offset } => {
                write!(f, "?OBJ - Block at {offset:06o} has a truncated header.")
            }
            Self::TruncatedBlock { offset } => {
                write!(f, "?OBJ - Block at {offset:06o} is truncated.")
            }
            Self::BadChecksum => write!(f, "?OBJ - Block has an incorrect checksum."),
            Self::TruncatedGsd => write!(f, "?OBJ - GSD record is truncated."),
            Self::TruncatedText => write!(f, "?OBJ - This TXT record is truncated."),
            Self::TruncatedRld => write!(f, "?OBJ - RLD record is truncated."),
            Self::BadComplexOpcode { opcode } => {
                write!(f, "?OBJ - Invalid complex relocation opcode {opcode:03o}.")
            }
            Self::UnknownRldType { code } => {
                write!(f, "?OBJ - Unknown RLD entry type {code:03o}.")
            }
        }
    }
}

/// Every block of an object image, in file order, plus the diagnostic
/// that ended the scan early, if any.
///
/// Produced by [scan]. The `Display` rendering is the dump: block
/// summary lines, decoded directory entries, and inline `?OBJ -`
/// diagnostics, all offsets in zero-padded octal.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectFile {
    blocks: Vec<Block>,
    diagnostic: Option<Diagnostic>,
}

impl ObjectFile {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }
}

impl fmt::Display for ObjectFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        if let Some(diagnostic) = &self.diagnostic {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

/// One formatted binary block and its decoded payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    offset: usize,
    length: u16,
    block_type: u16,
    checksum_ok: bool,
    payload: Payload,
}

impl Block {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn block_type(&self) -> u16 {
        self.block_type
    }

    pub fn checksum_ok(&self) -> bool {
        self.checksum_ok
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:06o} | Length {:06o} Type {:06o}",
            self.offset, self.length, self.block_type
        )?;
        if let Some(name) = blocktype::name(self.block_type) {
            write!(f, " {name}")?;
        }
        writeln!(f)?;

        if !self.checksum_ok {
            writeln!(f, "{}", Diagnostic::BadChecksum)?;
        }

        match &self.payload {
            Payload::Gsd(directory) => write!(f, "{directory}"),
            Payload::Text(text) => write!(f, "{text}"),
            Payload::Rld(directory) => write!(f, "{directory}"),
            Payload::Opaque => Ok(()),
        }
    }
}

/// The decoded payload of a block. Types without a decoder (ENDGSD,
/// ISD, ENDMOD, LIB, LIBEND, and anything unrecognized) are
/// [Opaque](Payload::Opaque).
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Gsd(GsdDirectory),
    Text(TextBlock),
    Rld(RldDirectory),
    Opaque,
}

/// Decodes every block of `image`, left to right, in a single pass.
///
/// The scanner stops at the first word that is not the block sentinel,
/// at the end of the buffer, or at a truncated block header or body.
/// Whatever was decoded before the stopping point is always returned;
/// a late failure never discards earlier blocks.
pub fn scan(image: &[u8]) -> ObjectFile {
    let mut blocks = Vec::new();
    let mut diagnostic = None;
    let mut position = 0;

    // The relocation displacement base is derived from the most recent
    // text block and threaded into each RLD decode explicitly.
    let mut last_text_offset = 0;

    while let Some(1) = word_at(image, position) {
        let mut cur = Cursor::new(image, position, image.len() - position);
        let Ok(header) = cur.read_record::<BlockHeader>() else {
            diagnostic = Some(Diagnostic::TruncatedHeader { offset: position });
            break;
        };
        debug_assert_eq!(header.sentinel, 1);

        let end = position + header.length as usize + 1;
        if end > image.len() {
            diagnostic = Some(Diagnostic::TruncatedBlock { offset: position });
            break;
        }

        let checksum_ok = image[position..end]
            .iter()
            .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
            == 0;

        let payload_offset = position + 6;
        let payload_length = (header.length as usize).saturating_sub(6);
        let payload = match header.block_type {
            blocktype::GSD => {
                Payload::Gsd(GsdDirectory::decode(image, payload_offset, payload_length))
            }
            blocktype::TXT => {
                last_text_offset = position;
                Payload::Text(TextBlock::decode(image, payload_offset, payload_length))
            }
            blocktype::RLD => Payload::Rld(RldDirectory::decode(
                image,
                payload_offset,
                payload_length,
                last_text_offset + 4,
            )),
            _ => Payload::Opaque,
        };

        blocks.push(Block {
            offset: position,
            length: header.length,
            block_type: header.block_type,
            checksum_ok,
            payload,
        });
        position = end;
    }

    ObjectFile { blocks, diagnostic }
}

fn word_at(image: &[u8], offset: usize) -> Option<u16> {
    let bytes = image.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub mod gsdtype {
    //! Global Symbol Directory entry type codes.

    pub const MODULE_NAME: u8 = 0;
    pub const CSECT: u8 = 1;
    pub const INTERNAL_SYMBOL: u8 = 2;
    pub const TRANSFER: u8 = 3;
    pub const GLOBAL_SYMBOL: u8 = 4;
    pub const PSECT: u8 = 5;
    pub const IDENT: u8 = 6;
    pub const VSECT: u8 = 7;
}

/// The fixed prefix of a GSD sub-record.
///
/// # Structure on Disk
///
/// | Offset | Type        | Description                        |
/// |--------|-------------|------------------------------------|
/// | 0      | `Rad50Name` | Symbol or section name             |
/// | 4      | `u8`        | Flags byte                         |
/// | 5      | `u8`        | Entry type ([gsdtype])             |
/// | 6      | `u16`       | Argument word (type-dependent use) |
///
/// Sub-records are stored at a fixed 8-byte stride. The argument word
/// is present in the span for every type but only CSECT, TRANSFER,
/// PSECT, and VSECT give it meaning, so it is read separately.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GsdRecord {
    name: Rad50Name,
    flags: u8,
    kind: u8,
}

/// An on/off label pair for one flag bit. Bits with no label in either
/// direction render as nothing.
#[derive(Clone, Copy, Debug)]
pub struct FlagLabel {
    pub on: Option<&'static str>,
    pub off: Option<&'static str>,
}

/// Labels for the global-symbol flags byte, indexed by bit.
pub const GLOBAL_SYMBOL_FLAGS: [FlagLabel; 8] = [
    /* bit 0 */ FlagLabel { on: Some("WEAK"), off: None },
    /* bit 1 */ FlagLabel { on: None, off: None },
    /* bit 2 */ FlagLabel { on: None, off: None },
    /* bit 3 */ FlagLabel { on: Some("DEF"), off: Some("REF") },
    /* bit 4 */ FlagLabel { on: None, off: None },
    /* bit 5 */ FlagLabel { on: Some("REL"), off: Some("ABS") },
    /* bit 6 */ FlagLabel { on: None, off: None },
    /* bit 7 */ FlagLabel { on: None, off: None },
];

/// Labels for the PSECT attributes byte, indexed by bit.
pub const PSECT_FLAGS: [FlagLabel; 8] = [
    /* bit 0 */ FlagLabel { on: Some("SAV"), off: None },
    /* bit 1 */ FlagLabel { on: None, off: None },
    /* bit 2 */ FlagLabel { on: Some("OVR"), off: Some("CON") },
    /* bit 3 */ FlagLabel { on: None, off: None },
    /* bit 4 */ FlagLabel { on: Some("R/O"), off: Some("R/W") },
    /* bit 5 */ FlagLabel { on: Some("REL"), off: Some("ABS") },
    /* bit 6 */ FlagLabel { on: Some("GBL"), off: Some("LCL") },
    /* bit 7 */ FlagLabel { on: Some("D"), off: Some("I") },
];

/// Renders a flags byte against a label table: bits 7 down to 0, each
/// contributing its on or off label when one is defined, joined with `+`.
pub fn format_flags(flags: u8, labels: &[FlagLabel; 8]) -> String {
    let mut parts = Vec::new();
    for bit in (0..8).rev() {
        let label = if flags & (1 << bit) != 0 {
            labels[bit].on
        } else {
            labels[bit].off
        };
        if let Some(label) = label {
            parts.push(label);
        }
    }
    parts.join("+")
}

/// A decoded Global Symbol Directory block.
#[derive(Clone, Debug, PartialEq)]
pub struct GsdDirectory {
    entries: Vec<GsdEntry>,
    diagnostic: Option<Diagnostic>,
}

impl GsdDirectory {
    /// Decodes GSD sub-records from `image[offset..offset + length]`.
    ///
    /// Unknown entry types decode as [GsdKind::Unknown] and do not
    /// disturb the 8-byte stride; a record with fewer than six bytes
    /// ends the directory with a truncation diagnostic.
    pub fn decode(image: &[u8], offset: usize, length: usize) -> Self {
        let mut cur = Cursor::new(image, offset, length);
        let mut entries = Vec::new();
        let mut diagnostic = None;

        while cur.remaining() > 0 {
            let start = cur.offset();
            let Ok(record) = cur.read_record::<GsdRecord>() else {
                diagnostic = Some(Diagnostic::TruncatedGsd);
                break;
            };

            let kind = match record.kind {
                gsdtype::MODULE_NAME => GsdKind::ModuleName,
                gsdtype::CSECT => {
                    let Ok(max_length) = cur.read_word() else {
                        diagnostic = Some(Diagnostic::TruncatedGsd);
                        break;
                    };
                    GsdKind::CSect { max_length }
                }
                gsdtype::INTERNAL_SYMBOL => GsdKind::InternalSymbol,
                gsdtype::TRANSFER => {
                    let Ok(address) = cur.read_word() else {
                        diagnostic = Some(Diagnostic::TruncatedGsd);
                        break;
                    };
                    GsdKind::TransferAddress { offset: address }
                }
                gsdtype::GLOBAL_SYMBOL => GsdKind::GlobalSymbol { flags: record.flags },
                gsdtype::PSECT => {
                    let Ok(max_length) = cur.read_word() else {
                        diagnostic = Some(Diagnostic::TruncatedGsd);
                        break;
                    };
                    GsdKind::PSect {
                        max_length,
                        flags: record.flags,
                    }
                }
                gsdtype::IDENT => GsdKind::Ident,
                gsdtype::VSECT => {
                    let Ok(length) = cur.read_word() else {
                        diagnostic = Some(Diagnostic::TruncatedGsd);
                        break;
                    };
                    GsdKind::VSect { length }
                }
                code => GsdKind::Unknown { code },
            };

            entries.push(GsdEntry {
                offset: start,
                name: record.name,
                kind,
            });
            cur.seek_to(start + 8);
        }

        Self { entries, diagnostic }
    }

    pub fn entries(&self) -> &[GsdEntry] {
        &self.entries
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }
}

impl fmt::Display for GsdDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        if let Some(diagnostic) = &self.diagnostic {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

/// One GSD sub-record: a name plus its decoded meaning.
#[derive(Clone, Debug, PartialEq)]
pub struct GsdEntry {
    offset: usize,
    name: Rad50Name,
    kind: GsdKind,
}

impl GsdEntry {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn name(&self) -> &Rad50Name {
        &self.name
    }

    pub fn kind(&self) -> &GsdKind {
        &self.kind
    }
}

/// The meaning of a GSD sub-record, by entry type.
#[derive(Clone, Debug, PartialEq)]
pub enum GsdKind {
    /// Type 0: the module name.
    ModuleName,
    /// Type 1: a control section and its maximum length.
    CSect { max_length: u16 },
    /// Type 2: an internal symbol (contents otherwise undocumented).
    InternalSymbol,
    /// Type 3: the transfer (start) address, relative to a section.
    TransferAddress { offset: u16 },
    /// Type 4: a global symbol with [GLOBAL_SYMBOL_FLAGS] attributes.
    GlobalSymbol { flags: u8 },
    /// Type 5: a program section with [PSECT_FLAGS] attributes.
    PSect { max_length: u16, flags: u8 },
    /// Type 6: the program version identification.
    Ident,
    /// Type 7: a mapped array declaration.
    VSect { length: u16 },
    /// Any other type code. The 8-byte stride still applies.
    Unknown { code: u8 },
}

impl fmt::Display for GsdEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let offset = self.offset;
        let name = &self.name;
        match &self.kind {
            GsdKind::ModuleName => write!(f, "{offset:06o} |  GSD Module Name [{name}]"),
            GsdKind::CSect { max_length } => write!(
                f,
                "{offset:06o} |  GSD CSECT [{name}] Maximum Length {max_length:06o}"
            ),
            GsdKind::InternalSymbol => write!(f, "{offset:06o} |  GSD Internal Symbol [{name}]"),
            GsdKind::TransferAddress { offset: address } => write!(
                f,
                "{offset:06o} |  GSD Transfer Address [{name}]+{address:06o}"
            ),
            GsdKind::GlobalSymbol { flags } => write!(
                f,
                "{offset:06o} |  GSD Global Symbol [{name}] {}",
                format_flags(*flags, &GLOBAL_SYMBOL_FLAGS)
            ),
            GsdKind::PSect { max_length, flags } => write!(
                f,
                "{offset:06o} |  GSD PSECT [{name}] Maximum Length {max_length:06o} {}",
                format_flags(*flags, &PSECT_FLAGS)
            ),
            GsdKind::Ident => write!(f, "{offset:06o} |  GSD Program Version [{name}]"),
            GsdKind::VSect { length } => {
                write!(f, "{offset:06o} |  Mapped Array [{name}] Length {length:06o}")
            }
            GsdKind::Unknown { code } => write!(
                f,
                "{offset:06o} |  Unknown GSD Record [{name}] Type {code:03o}"
            ),
        }
    }
}

/// A decoded text block: a load address and the data words that follow.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    offset: usize,
    load_address: Option<u16>,
    words: Vec<u16>,
    diagnostic: Option<Diagnostic>,
}

impl TextBlock {
    /// Decodes a TXT payload from `image[offset..offset + length]`.
    ///
    /// A payload shorter than the two-byte load address produces only a
    /// truncation diagnostic. A single odd byte after the last whole
    /// word is silently dropped, as the original tools did.
    pub fn decode(image: &[u8], offset: usize, length: usize) -> Self {
        let mut cur = Cursor::new(image, offset, length);

        let Ok(load_address) = cur.read_word() else {
            return Self {
                offset,
                load_address: None,
                words: Vec::new(),
                diagnostic: Some(Diagnostic::TruncatedText),
            };
        };

        let mut words = Vec::new();
        while let Ok(word) = cur.read_word() {
            words.push(word);
        }

        Self {
            offset,
            load_address: Some(load_address),
            words,
            diagnostic: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn load_address(&self) -> Option<u16> {
        self.load_address
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }
}

impl fmt::Display for TextBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(load_address) = self.load_address {
            writeln!(f, "{:06o} |  Load Address {load_address:06o}", self.offset)?;
            for (i, line) in self.words.chunks(8).enumerate() {
                write!(f, "{:06o} | ", self.offset + 2 + i * 16)?;
                for word in line {
                    write!(f, " {word:06o}")?;
                }
                writeln!(f)?;
            }
        }
        if let Some(diagnostic) = &self.diagnostic {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

pub mod rldtype {
    //! Relocation Directory entry type codes.

    pub const INTERNAL: u8 = 0o1;
    pub const GLOBAL: u8 = 0o2;
    pub const INTERNAL_DISPLACED: u8 = 0o3;
    pub const GLOBAL_DISPLACED: u8 = 0o4;
    pub const GLOBAL_ADDITIVE: u8 = 0o5;
    pub const GLOBAL_ADDITIVE_DISPLACED: u8 = 0o6;
    pub const LOCATION_DEFINITION: u8 = 0o7;
    pub const LOCATION_MODIFICATION: u8 = 0o10;
    pub const PROGRAM_LIMITS: u8 = 0o11;
    pub const PSECT: u8 = 0o12;
    pub const PSECT_DISPLACED: u8 = 0o14;
    pub const PSECT_ADDITIVE: u8 = 0o15;
    pub const PSECT_ADDITIVE_DISPLACED: u8 = 0o16;
    pub const COMPLEX: u8 = 0o17;
}

/// The shape of one simple relocation entry type: its display name and
/// which operands follow the header word.
#[derive(Clone, Copy, Debug)]
pub struct RldKind {
    pub name: Option<&'static str>,
    pub symbol: bool,
    pub constant: bool,
    pub displacement: bool,
}

/// Entry shapes for relocation types 1 through 16 (octal), indexed by
/// type code. Index 0 is not a valid type. Index 013 is unused and
/// nameless in the DEC table yet marked displacement-carrying; the
/// value is reproduced as found rather than corrected.
pub const RLD_KINDS: [RldKind; 15] = [
    /* 000 */ RldKind { name: None, symbol: false, constant: false, displacement: false },
    /* 001 */ RldKind { name: Some("Internal Relocation"), symbol: false, constant: true, displacement: true },
    /* 002 */ RldKind { name: Some("Global Relocation"), symbol: true, constant: false, displacement: true },
    /* 003 */ RldKind { name: Some("Internal Displaced Relocation"), symbol: false, constant: true, displacement: true },
    /* 004 */ RldKind { name: Some("Global Displaced Relocation"), symbol: true, constant: false, displacement: true },
    /* 005 */ RldKind { name: Some("Global Additive Relocation"), symbol: true, constant: true, displacement: true },
    /* 006 */ RldKind { name: Some("Global Additive Displaced Relocation"), symbol: true, constant: true, displacement: true },
    /* 007 */ RldKind { name: Some("Location Counter Definition"), symbol: true, constant: true, displacement: false },
    /* 010 */ RldKind { name: Some("Location Counter Modification"), symbol: false, constant: true, displacement: false },
    /* 011 */ RldKind { name: Some("Program Limits"), symbol: false, constant: false, displacement: true },
    /* 012 */ RldKind { name: Some("P-Sect Relocation"), symbol: true, constant: false, displacement: true },
    /* 013 */ RldKind { name: None, symbol: false, constant: false, displacement: true },
    /* 014 */ RldKind { name: Some("P-Sect Displaced Relocation"), symbol: true, constant: false, displacement: true },
    /* 015 */ RldKind { name: Some("P-Sect Additive Relocation"), symbol: true, constant: true, displacement: true },
    /* 016 */ RldKind { name: Some("P-Sect Additive Displaced Relocation"), symbol: true, constant: true, displacement: true },
];

pub mod opcode {
    //! Complex relocation opcodes.
    //!
    //! A complex relocation entry carries a small stack-machine program
    //! expressing the patch value: operands are pushed, operators
    //! combine them, and a store terminates the program.

    pub const NOP: u8 = 0o0;
    pub const ADD: u8 = 0o1;
    pub const SUB: u8 = 0o2;
    pub const MUL: u8 = 0o3;
    pub const DIV: u8 = 0o4;
    pub const AND: u8 = 0o5;
    pub const OR: u8 = 0o6;
    pub const XOR: u8 = 0o7;
    pub const NEG: u8 = 0o10;
    pub const COM: u8 = 0o11;
    pub const STORE: u8 = 0o12;
    pub const STORE_DISPLACED: u8 = 0o13;
    pub const PUSH_SYMBOL: u8 = 0o16;
    pub const PUSH_SECTION: u8 = 0o17;
    pub const PUSH_CONSTANT: u8 = 0o20;
}

/// One operation of a complex relocation program.
///
/// # Structure on Disk
///
/// | Opcode | Operation        | Operands                            |
/// |--------|------------------|-------------------------------------|
/// | 000    | `Nop`            | —                                   |
/// | 001    | `Add`            | —                                   |
/// | 002    | `Sub`            | —                                   |
/// | 003    | `Mul`            | —                                   |
/// | 004    | `Div`            | —                                   |
/// | 005    | `And`            | —                                   |
/// | 006    | `Or`             | —                                   |
/// | 007    | `Xor`            | —                                   |
/// | 010    | `Neg`            | —                                   |
/// | 011    | `Com`            | —                                   |
/// | 012    | `Store`          | — (terminates the program)          |
/// | 013    | `StoreDisplaced` | — (terminates the program)          |
/// | 016    | `PushSymbol`     | 4-byte RAD50 name                   |
/// | 017    | `PushSection`    | 1-byte section number, `u16` offset |
/// | 020    | `PushConstant`   | `u16` constant                      |
///
/// Opcodes 014, 015, and anything above 020 are not defined; meeting
/// one aborts the whole RLD block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComplexOp {
    Nop,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    /// Negate the top of the stack.
    Neg,
    /// Complement the top of the stack.
    Com,
    Store,
    /// Store in PC-relative (displaced) mode.
    StoreDisplaced,
    /// Push the value of a global symbol.
    PushSymbol(Rad50Name),
    /// Push a section base plus a constant offset.
    PushSection { section: u8, constant: u16 },
    PushConstant(u16),
}

impl ComplexOp {
    /// Reads one operation, including its operands, advancing `cur`
    /// past exactly the bytes it encodes ([ComplexOp::size] of them).
    pub fn read(cur: &mut Cursor) -> Result<Self, Diagnostic> {
        let opcode = cur.read_byte().map_err(|_| Diagnostic::TruncatedRld)?;
        let op = match opcode {
            opcode::NOP => Self::Nop,
            opcode::ADD => Self::Add,
            opcode::SUB => Self::Sub,
            opcode::MUL => Self::Mul,
            opcode::DIV => Self::Div,
            opcode::AND => Self::And,
            opcode::OR => Self::Or,
            opcode::XOR => Self::Xor,
            opcode::NEG => Self::Neg,
            opcode::COM => Self::Com,
            opcode::STORE => Self::Store,
            opcode::STORE_DISPLACED => Self::StoreDisplaced,
            opcode::PUSH_SYMBOL => {
                Self::PushSymbol(cur.read_name().map_err(|_| Diagnostic::TruncatedRld)?)
            }
            opcode::PUSH_SECTION => {
                let section = cur.read_byte().map_err(|_| Diagnostic::TruncatedRld)?;
                let constant = cur.read_word().map_err(|_| Diagnostic::TruncatedRld)?;
                Self::PushSection { section, constant }
            }
            opcode::PUSH_CONSTANT => {
                Self::PushConstant(cur.read_word().map_err(|_| Diagnostic::TruncatedRld)?)
            }
            _ => return Err(Diagnostic::BadComplexOpcode { opcode }),
        };
        Ok(op)
    }

    /// The encoded size of this operation, opcode byte included.
    pub fn size(&self) -> usize {
        match self {
            Self::PushSymbol(_) => 5,
            Self::PushSection { .. } => 4,
            Self::PushConstant(_) => 3,
            _ => 1,
        }
    }

    /// Whether this operation terminates a complex program.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store | Self::StoreDisplaced)
    }
}

impl fmt::Display for ComplexOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nop => write!(f, "NOP"),
            Self::Add => write!(f, "ADD"),
            Self::Sub => write!(f, "SUB"),
            Self::Mul => write!(f, "MUL"),
            Self::Div => write!(f, "DIV"),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Xor => write!(f, "XOR"),
            Self::Neg => write!(f, "NEG"),
            Self::Com => write!(f, "COM"),
            Self::Store => write!(f, "STORE"),
            Self::StoreDisplaced => write!(f, "STORE DISPLACED"),
            Self::PushSymbol(name) => write!(f, "PUSH [{name}]"),
            Self::PushSection { section, constant } => {
                write!(f, "PUSH SECTION {section:03o} CONSTANT {constant:06o}")
            }
            Self::PushConstant(constant) => write!(f, "PUSH {constant:06o}"),
        }
    }
}

/// A decoded Relocation Directory block.
#[derive(Clone, Debug, PartialEq)]
pub struct RldDirectory {
    entries: Vec<RldEntry>,
    diagnostic: Option<Diagnostic>,
}

impl RldDirectory {
    /// Decodes RLD entries from `image[offset..offset + length]`.
    ///
    /// `displacement_base` is the patch-target base derived from the
    /// most recent text block (its start offset plus four); each
    /// entry's displacement byte is added to it. An unknown entry
    /// type, an invalid complex opcode, or running out of bytes
    /// mid-entry ends the whole directory with a fatal diagnostic;
    /// entries decoded before that point are kept.
    pub fn decode(image: &[u8], offset: usize, length: usize, displacement_base: usize) -> Self {
        let mut cur = Cursor::new(image, offset, length);
        let mut entries = Vec::new();
        let mut diagnostic = None;

        'entries: while cur.remaining() > 0 {
            let start = cur.offset();
            let Ok(header) = cur.read_word() else {
                diagnostic = Some(Diagnostic::TruncatedRld);
                break;
            };

            let code = (header & 0o177) as u8;
            let byte_mode = header & 0o200 != 0;
            // Treated as unsigned; check DEC documentation before
            // reading more into the value.
            let displacement = (header >> 8) as usize;

            match code {
                rldtype::COMPLEX => {
                    let mut ops = Vec::new();
                    loop {
                        let op_offset = cur.offset();
                        match ComplexOp::read(&mut cur) {
                            Ok(op) => {
                                let done = op.is_store();
                                ops.push((op_offset, op));
                                if done {
                                    break;
                                }
                            }
                            Err(d) => {
                                diagnostic = Some(d);
                                break 'entries;
                            }
                        }
                    }
                    entries.push(RldEntry::Complex {
                        offset: start,
                        byte_mode,
                        target: displacement_base + displacement,
                        ops,
                    });
                }
                1..=14 => {
                    let kind = &RLD_KINDS[code as usize];
                    let symbol = if kind.symbol {
                        match cur.read_name() {
                            Ok(name) => Some(name),
                            Err(_) => {
                                diagnostic = Some(Diagnostic::TruncatedRld);
                                break;
                            }
                        }
                    } else {
                        None
                    };
                    let constant = if kind.constant {
                        match cur.read_word() {
                            Ok(word) => Some(word),
                            Err(_) => {
                                diagnostic = Some(Diagnostic::TruncatedRld);
                                break;
                            }
                        }
                    } else {
                        None
                    };
                    let target = if kind.displacement {
                        Some(displacement_base + displacement)
                    } else {
                        None
                    };
                    entries.push(RldEntry::Simple {
                        offset: start,
                        code,
                        byte_mode,
                        symbol,
                        constant,
                        target,
                    });
                }
                _ => {
                    diagnostic = Some(Diagnostic::UnknownRldType { code });
                    break;
                }
            }
        }

        Self { entries, diagnostic }
    }

    pub fn entries(&self) -> &[RldEntry] {
        &self.entries
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }
}

impl fmt::Display for RldDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        if let Some(diagnostic) = &self.diagnostic {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

/// One Relocation Directory entry.
#[derive(Clone, Debug, PartialEq)]
pub enum RldEntry {
    /// A table-shaped entry (types 1 through 16 octal, complex
    /// excluded): the operands present are those its [RldKind]
    /// declares.
    Simple {
        offset: usize,
        code: u8,
        byte_mode: bool,
        symbol: Option<Rad50Name>,
        constant: Option<u16>,
        target: Option<usize>,
    },
    /// A complex relocation entry (type 017) and its program. The
    /// program's operations are kept with their absolute offsets.
    Complex {
        offset: usize,
        byte_mode: bool,
        target: usize,
        ops: Vec<(usize, ComplexOp)>,
    },
}

impl fmt::Display for RldEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Simple {
                offset,
                code,
                byte_mode,
                symbol,
                constant,
                target,
            } => {
                write!(f, "{offset:06o} |  RLD ")?;
                match RLD_KINDS[*code as usize].name {
                    Some(name) => write!(f, "{name}")?,
                    None => write!(f, "Type {code:03o}")?,
                }
                if let Some(symbol) = symbol {
                    write!(f, " [{symbol}]")?;
                }
                if let Some(constant) = constant {
                    write!(f, " Constant {constant:06o}")?;
                }
                if let Some(target) = target {
                    write!(f, " Target {target:06o}")?;
                }
                if *byte_mode {
                    write!(f, " (Byte)")?;
                }
                Ok(())
            }
            Self::Complex {
                offset,
                byte_mode,
                target,
                ops,
            } => {
                write!(f, "{offset:06o} |  RLD Complex Relocation Target {target:06o}")?;
                if *byte_mode {
                    write!(f, " (Byte)")?;
                }
                for (op_offset, op) in ops {
                    write!(f, "\n{op_offset:06o} |   {op}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rad50_known_words() {
        // A=1, B=2, C=3: 1*1600 + 2*40 + 3
        let name = Rad50Name::new([1683, 4 * 1600 + 5 * 40 + 6]);
        assert_eq!(name.to_string(), "ABCDEF");
        assert_eq!(Rad50Name::encode("ABCDEF"), Some(name));
        assert_eq!(name.chars(), *b"ABCDEF");
    }

    #[test]
    fn test_rad50_roundtrip_alphabet() {
        // every character survives every slot of its group
        for c in RAD50.iter() {
            for slot in 0..3 {
                let mut chars = [b' '; 3];
                chars[slot] = *c;
                let word = chars.iter().fold(0u16, |w, c| {
                    w * 40 + RAD50.iter().position(|x| x == c).unwrap() as u16
                });
                let name = Rad50Name::new([word, 0]);
                assert_eq!(&name.chars()[..3], &chars);
            }
        }
    }

    #[test]
    fn test_rad50_accepts_out_of_range_words() {
        // 0xFFFF is above 40*1600; it aliases instead of failing
        let name = Rad50Name::new([0xFFFF, 0xFFFF]);
        assert_eq!(name.to_string(), " 8O 8O");
    }

    #[test]
    fn test_rad50_encode_rejects() {
        assert_eq!(Rad50Name::encode("TOOLONGX"), None);
        assert_eq!(Rad50Name::encode("a"), None);
        assert_eq!(Rad50Name::encode("#"), None);
    }

    #[test]
    fn test_block_type_names() {
        assert_eq!(blocktype::name(blocktype::GSD), Some("GSD"));
        assert_eq!(blocktype::name(blocktype::LIBEND), Some("LIBEND"));
        assert_eq!(blocktype::name(0), None);
        assert_eq!(blocktype::name(9), None);
        assert_eq!(blocktype::name(0o177777), None);
    }

    #[test]
    fn test_flag_formatting() {
        assert_eq!(format_flags(0, &GLOBAL_SYMBOL_FLAGS), "ABS+REF");
        assert_eq!(format_flags(0o51, &GLOBAL_SYMBOL_FLAGS), "REL+DEF+WEAK");
        assert_eq!(format_flags(0, &PSECT_FLAGS), "I+LCL+ABS+R/W+CON");
        assert_eq!(format_flags(0xFF, &PSECT_FLAGS), "D+GBL+REL+R/O+OVR+SAV");
    }

    #[test]
    fn test_rld_kind_table() {
        assert_eq!(RLD_KINDS.len(), 15);

        // index 0 is not a type
        assert!(RLD_KINDS[0].name.is_none());
        assert!(!RLD_KINDS[0].displacement);

        // 013 is unused yet displacement-carrying in the DEC table
        assert!(RLD_KINDS[0o13].name.is_none());
        assert!(!RLD_KINDS[0o13].symbol);
        assert!(!RLD_KINDS[0o13].constant);
        assert!(RLD_KINDS[0o13].displacement);

        let additive = &RLD_KINDS[rldtype::GLOBAL_ADDITIVE as usize];
        assert!(additive.symbol && additive.constant && additive.displacement);

        let counter = &RLD_KINDS[rldtype::LOCATION_MODIFICATION as usize];
        assert!(!counter.symbol && counter.constant && !counter.displacement);
    }

    #[test]
    fn test_complex_op_sizes() {
        let bytes = [
            opcode::PUSH_CONSTANT, 0x05, 0x00,
            opcode::PUSH_SECTION, 0x03, 0x40, 0x00,
            opcode::PUSH_SYMBOL, 0x93, 0x06, 0xCE, 0x19,
            opcode::ADD,
        ];
        let mut cur = Cursor::new(&bytes, 0, bytes.len());

        let op = ComplexOp::read(&mut cur).unwrap();
        assert_eq!(op, ComplexOp::PushConstant(5));
        assert_eq!(op.size(), 3);
        assert_eq!(cur.offset(), 3);

        let op = ComplexOp::read(&mut cur).unwrap();
        assert_eq!(op, ComplexOp::PushSection { section: 3, constant: 0o100 });
        assert_eq!(op.size(), 4);
        assert_eq!(cur.offset(), 7);

        let op = ComplexOp::read(&mut cur).unwrap();
        assert_eq!(op.size(), 5);
        assert_eq!(cur.offset(), 12);

        let op = ComplexOp::read(&mut cur).unwrap();
        assert_eq!(op, ComplexOp::Add);
        assert_eq!(op.size(), 1);
        assert_eq!(cur.offset(), 13);
    }

    #[test]
    fn test_complex_op_errors() {
        // 014 and 015 are holes in the opcode table
        let bytes = [0o14];
        let mut cur = Cursor::new(&bytes, 0, 1);
        assert_eq!(
            ComplexOp::read(&mut cur),
            Err(Diagnostic::BadComplexOpcode { opcode: 0o14 })
        );

        let bytes = [0o21];
        let mut cur = Cursor::new(&bytes, 0, 1);
        assert_eq!(
            ComplexOp::read(&mut cur),
            Err(Diagnostic::BadComplexOpcode { opcode: 0o21 })
        );

        // operand truncated mid-word
        let bytes = [opcode::PUSH_CONSTANT, 0x05];
        let mut cur = Cursor::new(&bytes, 0, 2);
        assert_eq!(ComplexOp::read(&mut cur), Err(Diagnostic::TruncatedRld));

        let mut cur = Cursor::new(&[], 0, 0);
        assert_eq!(ComplexOp::read(&mut cur), Err(Diagnostic::TruncatedRld));
    }

    #[test]
    fn test_complex_program_stops_at_store() {
        // PushConstant(5), PushConstant(3), Add, Store -- and then
        // trailing bytes that must not be consumed by the program.
        let bytes = [
            0o17, 0x00, // header: type 017, no displacement
            opcode::PUSH_CONSTANT, 0x05, 0x00,
            opcode::PUSH_CONSTANT, 0x03, 0x00,
            opcode::ADD,
            opcode::STORE,
            0o1, 0x00, 0x22, 0x00, // a following Internal Relocation entry
        ];
        let rld = RldDirectory::decode(&bytes, 0, bytes.len(), 100);

        assert_eq!(rld.diagnostic(), None);
        assert_eq!(rld.entries().len(), 2);

        let RldEntry::Complex { offset, target, ops, .. } = &rld.entries()[0] else {
            panic!("expected a complex entry");
        };
        assert_eq!(*offset, 0);
        assert_eq!(*target, 100);
        let ops: Vec<&ComplexOp> = ops.iter().map(|(_, op)| op).collect();
        assert_eq!(
            ops,
            [
                &ComplexOp::PushConstant(5),
                &ComplexOp::PushConstant(3),
                &ComplexOp::Add,
                &ComplexOp::Store,
            ]
        );

        // the program consumed exactly 8 bytes after its header
        let RldEntry::Simple { offset, code, constant, .. } = &rld.entries()[1] else {
            panic!("expected a simple entry");
        };
        assert_eq!(*offset, 10);
        assert_eq!(*code, rldtype::INTERNAL);
        assert_eq!(*constant, Some(0o42));
    }

    #[test]
    fn test_complex_bad_opcode_aborts_block() {
        let bytes = [
            0o17, 0x00,
            opcode::PUSH_CONSTANT, 0x05, 0x00,
            0o15, // hole in the opcode table
            opcode::STORE,
        ];
        let rld = RldDirectory::decode(&bytes, 0, bytes.len(), 100);
        assert_eq!(
            rld.diagnostic(),
            Some(&Diagnostic::BadComplexOpcode { opcode: 0o15 })
        );
        // the aborted entry is dropped entirely
        assert!(rld.entries().is_empty());
    }

    #[test]
    fn test_rld_simple_operands() {
        let name = Rad50Name::encode("EXTERN").unwrap();
        let [w0, w1] = name.words();

        let mut bytes = Vec::new();
        // Global Additive Relocation, byte mode, displacement 012
        bytes.extend_from_slice(&(0o5u16 | 0o200 | (0o12 << 8)).to_le_bytes());
        bytes.extend_from_slice(&w0.to_le_bytes());
        bytes.extend_from_slice(&w1.to_le_bytes());
        bytes.extend_from_slice(&0o4321u16.to_le_bytes());

        let rld = RldDirectory::decode(&bytes, 0, bytes.len(), 0o100);
        assert_eq!(rld.diagnostic(), None);
        assert_eq!(
            rld.entries(),
            [RldEntry::Simple {
                offset: 0,
                code: 0o5,
                byte_mode: true,
                symbol: Some(name),
                constant: Some(0o4321),
                target: Some(0o112),
            }]
        );
        assert_eq!(
            rld.entries()[0].to_string(),
            "000000 |  RLD Global Additive Relocation [EXTERN] Constant 004321 Target 000112 (Byte)"
        );
    }

    #[test]
    fn test_rld_truncated_operand() {
        // Global Relocation wants a 4-byte name; only 2 bytes follow
        let bytes = [0o2, 0x00, 0x11, 0x22];
        let rld = RldDirectory::decode(&bytes, 0, bytes.len(), 4);
        assert_eq!(rld.diagnostic(), Some(&Diagnostic::TruncatedRld));
        assert!(rld.entries().is_empty());
    }

    #[test]
    fn test_rld_unknown_type() {
        let bytes = [0o30, 0x00];
        let rld = RldDirectory::decode(&bytes, 0, bytes.len(), 4);
        assert_eq!(
            rld.diagnostic(),
            Some(&Diagnostic::UnknownRldType { code: 0o30 })
        );
    }

    #[test]
    fn test_gsd_decode() {
        let module = Rad50Name::encode("MODNAM").unwrap();
        let section = Rad50Name::encode("CODE").unwrap();

        let mut bytes = Vec::new();
        for w in module.words() {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        bytes.push(0); // flags
        bytes.push(gsdtype::MODULE_NAME);
        bytes.extend_from_slice(&[0, 0]); // unused argument word
        for w in section.words() {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        bytes.push(0);
        bytes.push(gsdtype::CSECT);
        bytes.extend_from_slice(&0o100000u16.to_le_bytes());

        let gsd = GsdDirectory::decode(&bytes, 0, bytes.len());
        assert_eq!(gsd.diagnostic(), None);
        assert_eq!(gsd.entries().len(), 2);
        assert_eq!(gsd.entries()[0].kind(), &GsdKind::ModuleName);
        assert_eq!(gsd.entries()[0].name(), &module);
        assert_eq!(
            gsd.entries()[1].kind(),
            &GsdKind::CSect { max_length: 0o100000 }
        );
        assert_eq!(gsd.entries()[1].offset(), 8);
        assert_eq!(
            gsd.entries()[1].to_string(),
            "000010 |  GSD CSECT [CODE  ] Maximum Length 100000"
        );
    }

    #[test]
    fn test_gsd_unknown_type_keeps_stride() {
        let name = Rad50Name::encode("MYSTRY").unwrap();

        let mut bytes = Vec::new();
        for w in name.words() {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        bytes.push(0);
        bytes.push(9); // no such type
        bytes.extend_from_slice(&[0, 0]);
        for w in name.words() {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        bytes.push(0);
        bytes.push(gsdtype::IDENT);
        bytes.extend_from_slice(&[0, 0]);

        let gsd = GsdDirectory::decode(&bytes, 0, bytes.len());
        assert_eq!(gsd.diagnostic(), None);
        assert_eq!(gsd.entries().len(), 2);
        assert_eq!(gsd.entries()[0].kind(), &GsdKind::Unknown { code: 9 });
        assert_eq!(gsd.entries()[1].kind(), &GsdKind::Ident);
    }

    #[test]
    fn test_gsd_truncated() {
        let bytes = [0x11, 0x22, 0x33, 0x44, 0x00]; // five bytes, not six
        let gsd = GsdDirectory::decode(&bytes, 0, bytes.len());
        assert_eq!(gsd.diagnostic(), Some(&Diagnostic::TruncatedGsd));
        assert!(gsd.entries().is_empty());
    }

    #[test]
    fn test_text_decode_drops_trailing_byte() {
        // load address 001000, one full word, one odd byte
        let bytes = [0x00, 0x02, 0x9C, 0x02, 0xAA];
        let text = TextBlock::decode(&bytes, 0, bytes.len());
        assert_eq!(text.diagnostic(), None);
        assert_eq!(text.load_address(), Some(0o1000));
        assert_eq!(text.words(), [0o1234]);
        assert_eq!(
            text.to_string(),
            "000000 |  Load Address 001000\n000002 |  001234\n"
        );
    }

    #[test]
    fn test_text_truncated() {
        let text = TextBlock::decode(&[0x42], 0, 1);
        assert_eq!(text.diagnostic(), Some(&Diagnostic::TruncatedText));
        assert_eq!(text.load_address(), None);
        assert_eq!(text.to_string(), "?OBJ - This TXT record is truncated.\n");
    }

    #[test]
    fn test_text_line_breaks() {
        // ten words: eight on the first line, two on the second
        let mut bytes = vec![0x00, 0x10];
        for w in 1..=10u16 {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let text = TextBlock::decode(&bytes, 0o100, bytes.len());
        assert_eq!(
            text.to_string(),
            "000100 |  Load Address 010000\n\
             000102 |  000001 000002 000003 000004 000005 000006 000007 000010\n\
             000122 |  000011 000012\n"
        );
    }

    #[test]
    fn test_cursor_bounds() {
        let bytes = [1, 2, 3];
        let mut cur = Cursor::new(&bytes, 1, 10);
        assert_eq!(cur.offset(), 1);
        assert_eq!(cur.remaining(), 2);
        assert!(cur.require(2).is_ok());
        assert_eq!(cur.require(3), Err(Truncated));
        assert_eq!(cur.read_word(), Ok(0x0302));
        assert_eq!(cur.read_byte(), Err(Truncated));

        let mut cur = Cursor::new(&bytes, 5, 5);
        assert_eq!(cur.remaining(), 0);
        assert_eq!(cur.read_byte(), Err(Truncated));
    }

    #[test]
    fn test_scan_rejects_non_sentinel() {
        let file = scan(&[0x02, 0x00, 0x06, 0x00, 0x06, 0x00, 0xF2]);
        assert!(file.blocks().is_empty());
        assert_eq!(file.diagnostic(), None);

        let file = scan(&[]);
        assert!(file.blocks().is_empty());
        assert_eq!(file.diagnostic(), None);

        let file = scan(&[0x01]);
        assert!(file.blocks().is_empty());
        assert_eq!(file.diagnostic(), None);
    }

    #[test]
    fn test_scan_truncated_header() {
        let file = scan(&[0x01, 0x00, 0x06, 0x00]);
        assert!(file.blocks().is_empty());
        assert_eq!(
            file.diagnostic(),
            Some(&Diagnostic::TruncatedHeader { offset: 0 })
        );
    }

    #[test]
    fn test_severities() {
        assert_eq!(Diagnostic::BadChecksum.severity(), Severity::Warning);
        assert_eq!(
            Diagnostic::TruncatedBlock { offset: 0 }.severity(),
            Severity::Fatal
        );
        assert_eq!(Diagnostic::TruncatedRld.severity(), Severity::Fatal);
    }
}
