use std::fmt::{self, Display, Formatter};

/// Specific reason a parse or attach operation failed.
///
/// Mirrors the error kinds a caller needs to distinguish; anything finer-grained is left to the
/// accompanying [`log`] diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// First byte of a packet wasn't the 0x47 sync byte.
    NotATsPacket,
    /// Continuity counter repeated the previous packet's value; the packet was dropped.
    Duplicate,
    /// Continuity counter skipped a value; any in-progress section was discarded.
    Discontinuity,
    /// A section's declared `length` exceeded `section_max_size - 3`.
    SectionTooLong,
    /// CRC-32 of a completed section did not match its trailing 4 bytes.
    BadCrc,
    /// Section's `table_id` is 0x72, which this layer always rejects.
    RejectedTableId,
    /// [`crate::Decoder::attach_bit`] (or cdt/ldt/sdtt) called for a `(table_id, extension)` pair
    /// that already has a subtable decoder.
    AlreadyAttached,
    /// A section arrived for a `(table_id, extension)` with no attached subtable decoder.
    UnknownSubtable,
    /// A later section's `version` differed from the building table's, without an intervening
    /// TS discontinuity.
    VersionMismatchWithoutDiscontinuity,
    /// A later section's `extension` differed from the building table's.
    ExtensionMismatch,
    /// A later section's `last_section_number` differed from the building table's.
    LastSectionNumberMismatch,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::NotATsPacket => "not a TS packet",
            ErrorKind::Duplicate => "duplicate TS packet",
            ErrorKind::Discontinuity => "TS discontinuity",
            ErrorKind::SectionTooLong => "PSI section too long",
            ErrorKind::BadCrc => "bad CRC_32",
            ErrorKind::RejectedTableId => "rejected table_id",
            ErrorKind::AlreadyAttached => "already a decoder for this (table_id, extension)",
            ErrorKind::UnknownSubtable => "no decoder for this (table_id, extension)",
            ErrorKind::VersionMismatchWithoutDiscontinuity => {
                "'version_number' differs whereas no discontinuity has occurred"
            }
            ErrorKind::ExtensionMismatch => {
                "'extension' differs whereas no discontinuity has occurred"
            }
            ErrorKind::LastSectionNumberMismatch => {
                "'last_section_number' differs whereas no discontinuity has occurred"
            }
        };
        f.write_str(msg)
    }
}

/// Error type for this crate.
///
/// Carries the byte offset (within the packet or section being processed) at which the error
/// was detected, in addition to the [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    /// Byte offset of the offending data.
    pub location: usize,
    /// What went wrong.
    pub kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(location: usize, kind: ErrorKind) -> Self {
        Self { location, kind }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.kind, self.location)
    }
}

impl std::error::Error for Error {}

/// [`std::result::Result`] alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
