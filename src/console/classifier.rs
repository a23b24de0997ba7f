//! Lookup tables mapping line prefixes to section types and section boundaries.

use crate::types::{PrefixCode, SectionType};

const fn mask(codes: &[PrefixCode]) -> u16 {
    let mut bits = 0;
    let mut i = 0;
    while i < codes.len() {
        bits |= codes[i].bit();
        i += 1;
    }
    bits
}

use PrefixCode::*;

/// Indexed by `PrefixCode as usize`.
const SECTION_TYPE: [SectionType; PrefixCode::COUNT] = [
    SectionType::Info,   // Info
    SectionType::Info,   // Alert
    SectionType::Prep,   // Prep
    SectionType::Prep,   // PrepErr
    SectionType::Task,   // TaskStart
    SectionType::Task,   // Out
    SectionType::Task,   // Err
    SectionType::Task,   // Pass
    SectionType::Task,   // Fail
    SectionType::Cancel, // CancelTaskStart
    SectionType::Cancel, // CancelTaskPass
    SectionType::Cancel, // CancelTaskFail
    SectionType::Result, // JobPass
    SectionType::Result, // JobFail
];

/// Prefixes that continue an already typed section, indexed by `SectionType as usize`.
const PART_OF_SECTION: [u16; SectionType::COUNT] = [
    mask(&[Info]),
    mask(&[Prep, PrepErr]),
    mask(&[Out, Err, Pass, Fail]),
    mask(&[Out, Err, CancelTaskPass, CancelTaskFail]),
    // a result line is always a section of its own
    0,
];

const EXPLICIT_END_BOUNDARY: u16 =
    mask(&[Pass, Fail, JobPass, JobFail, CancelTaskPass, CancelTaskFail]);

const ERROR_SIGNAL: u16 = mask(&[Fail, JobFail, CancelTaskFail]);

pub fn classify(prefix: PrefixCode) -> SectionType {
    SECTION_TYPE[prefix as usize]
}

/// Like [`classify`], with absent or unrecognized prefixes defaulting to `info`.
pub fn classify_prefix(prefix: Option<PrefixCode>) -> SectionType {
    prefix.map(classify).unwrap_or(SectionType::Info)
}

pub fn is_part_of_section(section_type: SectionType, prefix: Option<PrefixCode>) -> bool {
    prefix.is_some_and(|code| PART_OF_SECTION[section_type as usize] & code.bit() != 0)
}

pub fn is_explicit_end_boundary(prefix: Option<PrefixCode>) -> bool {
    prefix.is_some_and(|code| EXPLICIT_END_BOUNDARY & code.bit() != 0)
}

pub fn is_error_signal(prefix: Option<PrefixCode>) -> bool {
    prefix.is_some_and(|code| ERROR_SIGNAL & code.bit() != 0)
}
