//! Helpers for building and normalizing CIDs.
//!
//! CIDv0 is only defined for dag-pb blocks hashed with SHA2-256. Every other
//! combination is expressed as CIDv1, which is what [`cid_for_block`]
//! falls back to.

use crate::HashAlg;
use cid::{Cid, Version};

/// `dag-pb` multicodec.
pub const DAG_PB: u64 = 0x70;

/// `raw` multicodec.
pub const RAW: u64 = 0x55;

/// Computes the CID of `block` for the requested version, codec and hash.
///
/// A request for CIDv0 is honoured only when the codec is dag-pb and the
/// hash is SHA2-256; otherwise a CIDv1 is produced.
pub fn cid_for_block(version: Version, codec: u64, hash_alg: HashAlg, block: &[u8]) -> Cid {
    let mh = hash_alg.digest(block);
    if version == Version::V0 && codec == DAG_PB && hash_alg.is_default() {
        if let Ok(cid) = Cid::new_v0(mh) {
            return cid;
        }
    }
    Cid::new_v1(codec, mh)
}

/// Converts `cid` to its version-1 form. Version-1 CIDs are returned as is.
pub fn to_v1(cid: Cid) -> anyhow::Result<Cid> {
    match cid.version() {
        Version::V1 => Ok(cid),
        Version::V0 => Ok(cid.into_v1()?),
    }
}

/// Key that identifies a block independently of the CID version and codec.
pub fn block_key(cid: &Cid) -> Vec<u8> {
    cid.hash().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v0_only_for_dag_pb_sha256() {
        let block = b"some dag-pb bytes";

        let cid = cid_for_block(Version::V0, DAG_PB, HashAlg::Sha2_256, block);
        assert_eq!(cid.version(), Version::V0);
        assert!(cid.to_string().starts_with("Qm"));

        let raw = cid_for_block(Version::V0, RAW, HashAlg::Sha2_256, block);
        assert_eq!(raw.version(), Version::V1);
        assert_eq!(raw.codec(), RAW);

        let blake = cid_for_block(Version::V0, DAG_PB, HashAlg::Blake3, block);
        assert_eq!(blake.version(), Version::V1);
    }

    #[test]
    fn test_to_v1_keeps_multihash() {
        let v0 = cid_for_block(Version::V0, DAG_PB, HashAlg::Sha2_256, b"x");
        let v1 = to_v1(v0).unwrap();

        assert_eq!(v1.version(), Version::V1);
        assert_eq!(v1.codec(), DAG_PB);
        assert_eq!(v1.hash(), v0.hash());
        assert!(v1.to_string().starts_with("bafy"));
        assert_eq!(block_key(&v0), block_key(&v1));

        // Converting a v1 CID is a no-op.
        assert_eq!(to_v1(v1).unwrap(), v1);
    }
}
