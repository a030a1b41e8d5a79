//! ISO9660 lookup of the `ALL;1` pack file.

use phal::Hardware;

use super::types::{File, Loc, Mode};
use super::SECTOR_WORDS;
use crate::system::System;

/// First volume descriptor.
const DESCRIPTOR_LBA: u32 = 16;
/// Volume descriptors scanned before giving up.
const DESCRIPTOR_LIMIT: u32 = 32;

const DESCRIPTOR_PRIMARY: u8 = 1;
const DESCRIPTOR_TERMINATOR: u8 = 0xFF;

/// Offset of the root directory record in the primary volume descriptor.
const ROOT_RECORD: usize = 0x9C;

const PACK_NAME: &[u8] = b"ALL;1";

/// One directory record.
struct Record<'a> {
    bytes: &'a [u8],
}

impl<'a> Record<'a> {
    /// The record at the start of `bytes`, or `None` at the end of the
    /// directory.
    fn parse(bytes: &'a [u8]) -> Option<Record<'a>> {
        let len = *bytes.first()? as usize;
        if len < 33 || len > bytes.len() {
            return None;
        }
        Some(Record { bytes: &bytes[..len] })
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Little-endian half of a both-endian 32-bit field.
    fn both32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    fn extent_lba(&self) -> u32 {
        self.both32(2)
    }

    fn extent_size(&self) -> u32 {
        self.both32(10)
    }

    fn name(&self) -> &'a [u8] {
        let len = self.bytes[32] as usize;
        let end = (33 + len).min(self.bytes.len());
        &self.bytes[33..end]
    }
}

fn as_bytes(words: &[u32]) -> &[u8] {
    // SAFETY: any `u32` slice is a valid byte slice of four times the length.
    unsafe { core::slice::from_raw_parts(words.as_ptr().cast::<u8>(), words.len() * 4) }
}

/// Find `name` among the records of one directory sector.
fn find_entry(directory: &[u8], name: &[u8]) -> Option<File> {
    let mut offset = 0;
    while let Some(record) = Record::parse(&directory[offset..]) {
        if record.name().starts_with(name) {
            return Some(File {
                loc: Loc::enc(record.extent_lba()),
                size: record.extent_size() as usize,
            });
        }
        offset += record.len();
    }
    None
}

impl<H: Hardware> System<H> {
    /// Locate `ALL;1` in the root directory of the disc.
    ///
    /// `scratch` receives the sectors read on the way. A disc without a
    /// primary volume descriptor, or without the file, is fatal. The
    /// result is also kept for [`System::cd_all`].
    pub fn cd_find_all(&mut self, scratch: &mut [u32; SECTOR_WORDS]) -> File {
        let mut lba = DESCRIPTOR_LBA;
        loop {
            self.cd_read(scratch, Loc::enc(lba), Mode::SPEED);
            match as_bytes(scratch)[0] {
                DESCRIPTOR_PRIMARY => break,
                DESCRIPTOR_TERMINATOR => panic!("ISO no primary volume descriptor"),
                _ if lba >= DESCRIPTOR_LBA + DESCRIPTOR_LIMIT => {
                    panic!("ISO no primary volume descriptor")
                }
                _ => lba += 1,
            }
        }

        let root = match Record::parse(&as_bytes(scratch)[ROOT_RECORD..]) {
            Some(record) => record.extent_lba(),
            None => panic!("ISO no primary volume descriptor"),
        };

        self.cd_read(scratch, Loc::enc(root), Mode::SPEED);
        let Some(file) = find_entry(as_bytes(scratch), PACK_NAME) else {
            panic!("ALL not found");
        };

        plog::debug!("ALL;1 at sector {}, {} bytes", file.loc.dec(), file.size);
        self.cd.all = Some(file);
        file
    }

    /// The pack file found by [`System::cd_find_all`].
    pub fn cd_all(&self) -> Option<File> {
        self.cd.all
    }
}
