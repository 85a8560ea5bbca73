use crate::slice_reader::SliceReader;
use smallvec::SmallVec;

/// An opaque `(tag, length, data)` descriptor embedded in a PSI payload.
///
/// The catalog of tag-specific descriptor bodies is out of scope here (see `SPEC_FULL.md` §1) —
/// this layer only needs to walk descriptor loops and carry the bytes along, not interpret them.
/// `data` is a [`SmallVec`] for the same reason the grounding crate's own `Descriptor` is: the
/// overwhelming majority of ISDB-T descriptors are a handful of bytes, so inline storage avoids
/// an allocation per descriptor in the common case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Descriptor tag byte.
    pub tag: u8,
    /// Descriptor body, exactly `length` bytes.
    pub data: SmallVec<[u8; 8]>,
}

impl Descriptor {
    /// Builds a descriptor from a tag and body bytes.
    pub fn new(tag: u8, data: impl Into<SmallVec<[u8; 8]>>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    /// Encoded size in bytes: 1 tag + 1 length + body.
    pub(crate) fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.push(self.tag);
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
    }

    /// Parses descriptors from `reader` until fewer than 2 bytes remain.
    ///
    /// `reader` must already be bounded to the enclosing descriptor loop's length (typically via
    /// [`SliceReader::new_sub_reader`]) — this never reads past what `reader` was given.
    pub(crate) fn parse_list(reader: &mut SliceReader) -> Vec<Descriptor> {
        let mut out = Vec::new();
        while reader.remaining_len() >= 2 {
            let tag = reader.read_u8();
            let length = reader.read_u8() as usize;
            let data = reader.read(length);
            out.push(Descriptor {
                tag,
                data: SmallVec::from_slice(data),
            });
        }
        out
    }
}

/// Total encoded size of a descriptor list.
pub(crate) fn list_encoded_len(descriptors: &[Descriptor]) -> usize {
    descriptors.iter().map(Descriptor::encoded_len).sum()
}

pub(crate) fn write_list(descriptors: &[Descriptor], out: &mut Vec<u8>) {
    for d in descriptors {
        d.write(out);
    }
}
