//! dag-pb and UnixFS protobuf messages.
//!
//! Field order follows the canonical dag-pb form: links before data.

use dagadd_core::{Cid, UnixFsMeta};
use prost::Message;

/// UnixFS node types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DataType {
    Directory = 1,
    File = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UnixTime {
    #[prost(int64, required, tag = "1")]
    pub seconds: i64,
    #[prost(fixed32, optional, tag = "2")]
    pub fractional_nanoseconds: Option<u32>,
}

/// UnixFS `Data` message.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Data {
    #[prost(enumeration = "DataType", required, tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    pub filesize: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "4")]
    pub blocksizes: Vec<u64>,
    #[prost(uint32, optional, tag = "7")]
    pub mode: Option<u32>,
    #[prost(message, optional, tag = "8")]
    pub mtime: Option<UnixTime>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PbLinkMessage {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

/// dag-pb `PBNode`. Decoding goes through the derive; encoding goes through
/// [`PbNode::encode_canonical`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct PbNode {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub data: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLinkMessage>,
}

impl PbNode {
    /// Encodes links first, then data. The derived encoder would write
    /// fields in tag order, which puts data first.
    pub fn encode_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for link in &self.links {
            prost::encoding::message::encode(2, link, &mut buf);
        }
        if let Some(data) = &self.data {
            prost::encoding::bytes::encode(1, data, &mut buf);
        }
        buf
    }
}

/// Encodes a UnixFS `Data` message. `data` is left out when empty.
pub fn unixfs_data(
    kind: DataType,
    data: &[u8],
    filesize: Option<u64>,
    blocksizes: &[u64],
    meta: UnixFsMeta,
) -> Vec<u8> {
    Data {
        r#type: kind as i32,
        data: (!data.is_empty()).then(|| data.to_vec()),
        filesize,
        blocksizes: blocksizes.to_vec(),
        mode: meta.mode,
        mtime: meta.mtime.map(|mtime| UnixTime {
            seconds: mtime.secs,
            fractional_nanoseconds: (mtime.nsecs != 0).then_some(mtime.nsecs),
        }),
    }
    .encode_to_vec()
}

/// One outgoing link of a dag-pb node.
#[derive(Debug, Clone)]
pub struct PbLink<'a> {
    pub cid: &'a Cid,
    pub name: &'a str,
    pub tsize: u64,
}

impl From<&PbLink<'_>> for PbLinkMessage {
    fn from(link: &PbLink<'_>) -> Self {
        PbLinkMessage {
            hash: Some(link.cid.to_bytes()),
            name: Some(link.name.to_owned()),
            tsize: Some(link.tsize),
        }
    }
}

/// Encodes a dag-pb `PBNode`.
pub fn pb_node(links: &[PbLink<'_>], data: &[u8]) -> Vec<u8> {
    PbNode {
        data: Some(data.to_vec()),
        links: links.iter().map(PbLinkMessage::from).collect(),
    }
    .encode_canonical()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagadd_core::Mtime;

    #[test]
    fn test_file_data() {
        let data = unixfs_data(DataType::File, b"hi", Some(2), &[], UnixFsMeta::default());
        assert_eq!(data, vec![0x08, 0x02, 0x12, 0x02, b'h', b'i', 0x18, 0x02]);
    }

    #[test]
    fn test_blocksizes_are_not_packed() {
        let data = unixfs_data(DataType::File, &[], Some(3), &[1, 2], UnixFsMeta::default());
        assert_eq!(data, vec![0x08, 0x02, 0x18, 0x03, 0x20, 0x01, 0x20, 0x02]);
    }

    #[test]
    fn test_empty_directory() {
        let data = unixfs_data(DataType::Directory, &[], None, &[], UnixFsMeta::default());
        assert_eq!(data, vec![0x08, 0x01]);
        // The well-known empty directory block.
        assert_eq!(pb_node(&[], &data), vec![0x0a, 0x02, 0x08, 0x01]);
    }

    #[test]
    fn test_metadata() {
        let meta = UnixFsMeta {
            mode: Some(0o644),
            mtime: Some(Mtime::new(5, 7)),
        };
        let data = unixfs_data(DataType::File, &[], Some(0), &[], meta);
        assert_eq!(
            data,
            vec![
                0x08, 0x02, 0x18, 0x00, 0x38, 0xa4, 0x03, 0x42, 0x07, 0x08, 0x05, 0x15, 0x07, 0x00,
                0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_links_come_first() {
        let cid = dagadd_core::content_id::cid_for_block(
            cid::Version::V0,
            dagadd_core::content_id::DAG_PB,
            dagadd_core::HashAlg::Sha2_256,
            b"child",
        );
        let node = pb_node(
            &[PbLink {
                cid: &cid,
                name: "a",
                tsize: 9,
            }],
            &[0x08, 0x01],
        );
        assert_eq!(node[0], 0x12);
        assert_eq!(&node[node.len() - 4..], &[0x0a, 0x02, 0x08, 0x01]);

        let decoded = PbNode::decode(node.as_slice()).unwrap();
        assert_eq!(decoded.links.len(), 1);
        assert_eq!(decoded.links[0].hash.as_deref(), Some(cid.to_bytes().as_slice()));
        assert_eq!(decoded.links[0].name.as_deref(), Some("a"));
        assert_eq!(decoded.links[0].tsize, Some(9));
        assert_eq!(decoded.data.as_deref(), Some(&[0x08, 0x01][..]));
    }
}
