//! Netlink attribute (rtattr/nlattr) splitting.
//!
//! The bytes following the fixed inet_diag_msg header are a flat list of
//! type-length-value attributes, each padded to a 4-byte boundary. The
//! splitter is zero-copy: returned value slices alias the input buffer.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Netlink attribute header (mirrors struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

/// Iterator over attributes in a buffer.
///
/// Yields `(type, value)` pairs in wire order. A trailing fragment shorter
/// than the attribute header, or a declared length that overruns the
/// buffer, yields [`Error::TruncatedAttribute`].
pub struct AttrIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len() - self.offset;
        if remaining == 0 {
            return None;
        }
        if remaining < NLA_HDRLEN {
            let err = Error::TruncatedAttribute {
                offset: self.offset,
                remaining,
            };
            self.offset = self.data.len();
            return Some(Err(err));
        }

        let rest = &self.data[self.offset..];
        let attr = match NlAttr::read_from_prefix(rest) {
            Ok((a, _)) => a,
            Err(_) => {
                let err = Error::TruncatedAttribute {
                    offset: self.offset,
                    remaining,
                };
                self.offset = self.data.len();
                return Some(Err(err));
            }
        };

        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > remaining {
            let err = Error::TruncatedAttribute {
                offset: self.offset,
                remaining,
            };
            self.offset = self.data.len();
            return Some(Err(err));
        }

        let value = &self.data[self.offset + NLA_HDRLEN..self.offset + len];
        self.offset = (self.offset + nla_align(len)).min(self.data.len());

        Some(Ok((attr.kind(), value)))
    }
}

/// Split a buffer into its attributes, in wire order.
///
/// An empty buffer yields an empty list, not an error.
pub fn split(data: &[u8]) -> Result<Vec<(u16, &[u8])>> {
    AttrIter::new(data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::push_attr;

    #[test]
    fn test_empty_buffer_yields_no_attrs() {
        assert!(split(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_short_buffer_is_truncated() {
        let err = split(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedAttribute {
                offset: 0,
                remaining: 3
            }
        ));
    }

    #[test]
    fn test_split_two_attrs_with_padding() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 4, b"cubic\0"); // 6 bytes, padded to 8
        push_attr(&mut buf, 5, &[0x2a]); // 1 byte, padded to 4

        let attrs = split(&buf).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0], (4, &b"cubic\0"[..]));
        assert_eq!(attrs[1], (5, &[0x2a][..]));
    }

    #[test]
    fn test_declared_length_overrun() {
        let mut buf = Vec::new();
        buf.extend_from_slice(NlAttr::new(2, 100).as_bytes());
        buf.extend_from_slice(&[0u8; 8]); // far fewer than 100 value bytes

        let err = split(&buf).unwrap_err();
        assert!(matches!(err, Error::TruncatedAttribute { offset: 0, .. }));
    }

    #[test]
    fn test_declared_length_below_header() {
        let attr = NlAttr {
            nla_len: 2,
            nla_type: 1,
        };
        let buf = attr.as_bytes().to_vec();
        assert!(split(&buf).is_err());
    }

    #[test]
    fn test_values_alias_input() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 1, &[9, 9, 9, 9]);
        let attrs = split(&buf).unwrap();
        let (_, value) = attrs[0];
        // Zero-copy: the value slice points into the original buffer.
        assert_eq!(value.as_ptr(), buf[NLA_HDRLEN..].as_ptr());
    }

    #[test]
    fn test_unpadded_final_attr() {
        // Last attribute may legally end without its alignment padding.
        let mut buf = Vec::new();
        buf.extend_from_slice(NlAttr::new(5, 1).as_bytes());
        buf.push(0x2a);

        let attrs = split(&buf).unwrap();
        assert_eq!(attrs, vec![(5, &[0x2a][..])]);
    }

    #[test]
    fn test_type_flags_are_masked() {
        let mut buf = Vec::new();
        push_attr(&mut buf, 3 | NLA_F_NESTED, &[0u8; 4]);
        let attrs = split(&buf).unwrap();
        assert_eq!(attrs[0].0, 3);
    }
}
