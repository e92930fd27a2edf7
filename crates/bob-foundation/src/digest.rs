// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Canonical hashing primitives shared by the identity engine, the audit
//! trail recorder and the artifact cache. The whole engine commits to a
//! single hash algorithm (see `HashAlgorithm::CURRENT`); the enum exists so
//! that a migration can be staged behind `bobMinimumVersion` without
//! reworking every call site, per spec.md open question #2.

use std::fmt;

/// The hash algorithm used for `Variant-Id`/`Build-Id`/`Artifact-Id`.
///
/// spec.md leaves the SHA-1 vs SHA-256 choice unresolved across its own
/// sections; this implementation commits to SHA-256 for new schemas and
/// keeps SHA-1 available only to read identities produced by a legacy
/// `bobMinimumVersion`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum HashAlgorithm {
    Sha1Legacy,
    Sha256,
}

impl HashAlgorithm {
    /// The algorithm used unless a project's `bobMinimumVersion` pins an
    /// older schema.
    pub const CURRENT: HashAlgorithm = HashAlgorithm::Sha256;

    fn ring_algorithm(self) -> &'static ring::digest::Algorithm {
        match self {
            HashAlgorithm::Sha1Legacy => &ring::digest::SHA1_FOR_LEGACY_USE_ONLY,
            HashAlgorithm::Sha256 => &ring::digest::SHA256,
        }
    }
}

/// A hex-encoded content digest. Displayed lowercase; equality and ordering
/// compare the underlying bytes, not the chosen algorithm, so digests from
/// different algorithms should never be compared directly by callers.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.0)
    }

    /// First two / next two hex characters, used to build the two-level
    /// fan-out directory layout of the artifact archive (spec.md §3, §4.6).
    pub fn hex_prefix_pair(&self) -> (String, String) {
        let hex = self.to_hex();
        let mut chars = hex.chars();
        let a: String = chars.by_ref().take(2).collect();
        let b: String = chars.by_ref().take(2).collect();
        (a, b)
    }

    pub fn from_hex(hex: &str) -> Result<Self, data_encoding::DecodeError> {
        data_encoding::HEXLOWER.decode(hex.as_bytes()).map(Digest)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A streaming hasher that feeds length-prefixed fields into the underlying
/// digest context, so that e.g. hashing `["ab", "c"]` never collides with
/// hashing `["a", "bc"]` the way naive concatenation would.
pub struct CanonicalHasher {
    algorithm: HashAlgorithm,
    ctx: ring::digest::Context,
}

impl CanonicalHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            ctx: ring::digest::Context::new(algorithm.ring_algorithm()),
        }
    }

    /// Feed one opaque field into the hash, prefixed with its length so
    /// that field boundaries are unambiguous.
    pub fn update(&mut self, field: impl AsRef<[u8]>) -> &mut Self {
        let bytes = field.as_ref();
        self.ctx.update(&(bytes.len() as u64).to_le_bytes());
        self.ctx.update(bytes);
        self
    }

    /// Feed an already-computed digest into the hash as an opaque field.
    pub fn update_digest(&mut self, digest: &Digest) -> &mut Self {
        self.update(digest.as_bytes())
    }

    /// Feed a sequence of fields, prefixed by the element count, so that an
    /// empty list is distinguishable from a list containing one empty
    /// field.
    pub fn update_seq<I, T>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let items: Vec<T> = items.into_iter().collect();
        self.ctx.update(&(items.len() as u64).to_le_bytes());
        for item in items {
            self.update(item);
        }
        self
    }

    /// Consumes the accumulated fields and returns their digest. Takes
    /// `&mut self` rather than `self` so a one-line `Type::new(..)
    /// .update(..).finish()` chain doesn't need to move a value out from
    /// behind the `&mut Self` its own `update` calls return.
    pub fn finish(&mut self) -> Digest {
        let ctx = std::mem::replace(&mut self.ctx, ring::digest::Context::new(self.algorithm.ring_algorithm()));
        Digest(ctx.finish().as_ref().to_vec())
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod digest_test {
    use super::*;

    #[test]
    fn length_prefixing_disambiguates_field_boundaries() {
        let mut a = CanonicalHasher::new(HashAlgorithm::Sha256);
        a.update("ab").update("c");
        let a = a.finish();

        let mut b = CanonicalHasher::new(HashAlgorithm::Sha256);
        b.update("a").update("bc");
        let b = b.finish();

        assert_ne!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn empty_seq_differs_from_seq_of_empty_field() {
        let mut a = CanonicalHasher::new(HashAlgorithm::Sha256);
        a.update_seq(Vec::<&str>::new());
        let a = a.finish();

        let mut b = CanonicalHasher::new(HashAlgorithm::Sha256);
        b.update_seq(vec![""]);
        let b = b.finish();

        assert_ne!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn hex_prefix_pair_splits_first_four_chars() {
        let digest = Digest::from_hex("abcdef01").unwrap();
        assert_eq!(digest.hex_prefix_pair(), ("ab".to_string(), "cd".to_string()));
    }

    #[test]
    fn same_input_same_output() {
        let compute = || {
            let mut h = CanonicalHasher::new(HashAlgorithm::Sha256);
            h.update("script").update_seq(vec!["a", "b"]);
            h.finish().to_hex()
        };
        assert_eq!(compute(), compute());
    }
}
