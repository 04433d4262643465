//! Per-filter bookkeeping of which sections of a table have been seen.

use std::collections::HashMap;

use log::{debug, info};

use crate::si::PsiHeader;

/// Outcome of offering one section to an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The table_id does not belong to this filter.
    Rejected,
    /// The section number was already seen for the current version.
    Repeat,
    /// First sighting of this section; it must be decoded.
    Fresh,
}

/// Seen-bitmap for one (table_id_extension, version) pair.
#[derive(Debug, Clone, Default)]
struct SectionBitmap {
    table_id_ext: Option<u16>,
    version: Option<u8>,
    seen: [u64; 4],
    done: bool,
}

impl SectionBitmap {
    fn is_set(&self, n: u8) -> bool {
        self.seen[n as usize / 64] & (1 << (n % 64)) != 0
    }

    fn set(&mut self, n: u8) {
        self.seen[n as usize / 64] |= 1 << (n % 64);
    }

    fn reset_if_changed(&mut self, table_id_ext: u16, version: u8) {
        if self.version == Some(version) && self.table_id_ext == Some(table_id_ext) {
            return;
        }
        if let (Some(old_version), Some(old_ext)) = (self.version, self.table_id_ext) {
            debug!(
                "section version_number or table_id_ext changed {} -> {} / {:04x} -> {:04x}",
                old_version, version, old_ext, table_id_ext
            );
        }
        self.table_id_ext = Some(table_id_ext);
        self.version = Some(version);
        self.seen = [0; 4];
        self.done = false;
    }

    fn offer(&mut self, section_number: u8, last_section_number: u8) -> Progress {
        if self.is_set(section_number) {
            return Progress::Repeat;
        }
        self.set(section_number);
        self.done = (0..=last_section_number).all(|n| self.is_set(n));
        Progress::Fresh
    }
}

/// Completion state of one filter.
///
/// A version or table_id_extension change resets the bitmap. In segmented
/// mode every table_id_extension gets its own bitmap and the filter never
/// reports completion, since the number of sub-tables is not known.
#[derive(Debug, Clone)]
pub struct SectionAssembly {
    table_id: u8,
    segmented: bool,
    primary: SectionBitmap,
    segments: HashMap<u16, SectionBitmap>,
}

impl SectionAssembly {
    pub fn new(table_id: u8, table_id_ext: Option<u16>, segmented: bool) -> Self {
        SectionAssembly {
            table_id,
            segmented,
            primary: SectionBitmap {
                table_id_ext,
                ..Default::default()
            },
            segments: HashMap::new(),
        }
    }

    /// Record a section. The caller decodes the body only on
    /// [`Progress::Fresh`].
    pub fn offer(&mut self, header: &PsiHeader) -> Progress {
        if header.table_id != self.table_id {
            info!(
                "filter table_id {:X} got section with table_id {:X}",
                self.table_id, header.table_id
            );
            return Progress::Rejected;
        }

        let ext = header.table_id_extension;
        let bitmap = match self.primary.table_id_ext {
            Some(tracked) if self.segmented && tracked != ext => {
                let version = header.version_number;
                self.segments.entry(ext).or_insert_with(|| SectionBitmap {
                    table_id_ext: Some(ext),
                    version: Some(version),
                    ..Default::default()
                })
            }
            _ => &mut self.primary,
        };

        bitmap.reset_if_changed(ext, header.version_number);
        bitmap.offer(header.section_number, header.last_section_number)
    }

    /// Every section of the current version has been seen. Always false
    /// for segmented filters.
    pub fn is_complete(&self) -> bool {
        !self.segmented && self.primary.done
    }

    /// Completion of the sub-table with this table_id_extension.
    pub fn sub_table_complete(&self, table_id_ext: u16) -> Option<bool> {
        if self.primary.table_id_ext == Some(table_id_ext) {
            return Some(self.primary.done);
        }
        self.segments.get(&table_id_ext).map(|b| b.done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::si::table_id;

    fn header(table: u8, ext: u16, version: u8, number: u8, last: u8) -> PsiHeader {
        PsiHeader {
            table_id: table,
            section_syntax_indicator: true,
            section_length: 13,
            table_id_extension: ext,
            version_number: version,
            current_next_indicator: true,
            section_number: number,
            last_section_number: last,
        }
    }

    #[test]
    fn test_complete_after_all_sections() {
        let mut asm = SectionAssembly::new(table_id::SDT_ACTUAL, None, false);

        assert_eq!(asm.offer(&header(0x42, 1, 3, 1, 2)), Progress::Fresh);
        assert!(!asm.is_complete());
        assert_eq!(asm.offer(&header(0x42, 1, 3, 1, 2)), Progress::Repeat);
        assert_eq!(asm.offer(&header(0x42, 1, 3, 0, 2)), Progress::Fresh);
        assert!(!asm.is_complete());
        assert_eq!(asm.offer(&header(0x42, 1, 3, 2, 2)), Progress::Fresh);
        assert!(asm.is_complete());
    }

    #[test]
    fn test_wrong_table_id_rejected() {
        let mut asm = SectionAssembly::new(table_id::PAT, None, false);
        assert_eq!(asm.offer(&header(0x02, 1, 0, 0, 0)), Progress::Rejected);
        assert!(!asm.is_complete());
    }

    #[test]
    fn test_version_change_resets_bitmap() {
        let mut asm = SectionAssembly::new(table_id::PAT, None, false);

        assert_eq!(asm.offer(&header(0x00, 1, 4, 0, 1)), Progress::Fresh);
        assert_eq!(asm.offer(&header(0x00, 1, 5, 1, 1)), Progress::Fresh);
        // section 0 of version 5 is new even though version 4 had it
        assert!(!asm.is_complete());
        assert_eq!(asm.offer(&header(0x00, 1, 5, 0, 1)), Progress::Fresh);
        assert!(asm.is_complete());
    }

    #[test]
    fn test_segmented_nit_other_keeps_independent_bitmaps() {
        let mut asm = SectionAssembly::new(table_id::NIT_OTHER, None, true);

        assert_eq!(asm.offer(&header(0x41, 0x10, 0, 0, 1)), Progress::Fresh);
        assert_eq!(asm.offer(&header(0x41, 0x20, 0, 0, 1)), Progress::Fresh);
        assert_eq!(asm.offer(&header(0x41, 0x10, 0, 1, 1)), Progress::Fresh);

        assert_eq!(asm.sub_table_complete(0x10), Some(true));
        assert_eq!(asm.sub_table_complete(0x20), Some(false));

        // 0x20 section 1 is not marked by 0x10 section 1
        assert_eq!(asm.offer(&header(0x41, 0x20, 0, 1, 1)), Progress::Fresh);
        assert_eq!(asm.offer(&header(0x41, 0x10, 0, 0, 1)), Progress::Repeat);
        assert_eq!(asm.sub_table_complete(0x20), Some(true));

        assert!(!asm.is_complete());
    }
}
