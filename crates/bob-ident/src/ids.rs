// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use bob_foundation::digest::Digest;
use serde::{Deserialize, Serialize};

pub(crate) fn digest_clone(d: &Digest) -> Digest {
    d.clone()
}

macro_rules! id_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Digest);

        impl $name {
            pub fn from_digest(digest: Digest) -> Self {
                Self(digest)
            }

            pub fn digest(&self) -> &Digest {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_newtype!(VariantId, "Canonical hash identifying how a step is built.");

/// Canonical hash identifying the expected result of a step.
///
/// A `BuildId` is either `Static` (known immediately at graph instantiation
/// time) or `Dynamic` (only known after an upstream indeterministic
/// checkout has executed, see spec.md §4.3). Both cases carry a real
/// digest; the distinction only matters to the scheduler, which must defer
/// scheduling decisions keyed on a `Dynamic` id until its inputs resolve.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum BuildId {
    Static(Digest),
    Dynamic(Digest),
}

impl BuildId {
    pub fn new_static(digest: Digest) -> Self {
        Self::Static(digest)
    }

    pub fn new_dynamic(digest: Digest) -> Self {
        Self::Dynamic(digest)
    }

    pub fn digest(&self) -> &Digest {
        match self {
            BuildId::Static(d) | BuildId::Dynamic(d) => d,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, BuildId::Dynamic(_))
    }

    pub fn to_hex(&self) -> String {
        self.digest().to_hex()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.digest(), f)
    }
}

/// The concrete, possibly-dynamic Build-Id of a realized artifact
/// (spec.md §3: "`ArtifactId` equals `BuildId` with the dynamic value").
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Digest);

impl From<&BuildId> for ArtifactId {
    fn from(build_id: &BuildId) -> Self {
        ArtifactId(build_id.digest().clone())
    }
}

impl ArtifactId {
    pub fn digest(&self) -> &Digest {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// The two-level hex fan-out storage path stem, e.g. `ab/cd/abcdef...`.
    pub fn storage_stem(&self) -> String {
        let (a, b) = self.0.hex_prefix_pair();
        format!("{a}/{b}/{}", self.0.to_hex())
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// `Package-Id` equals the `Variant-Id` of a package's package step
/// (spec.md §3 invariant).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(VariantId);

impl From<VariantId> for PackageId {
    fn from(id: VariantId) -> Self {
        PackageId(id)
    }
}

impl PackageId {
    pub fn variant_id(&self) -> &VariantId {
        &self.0
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod ids_test {
    use super::*;

    #[test]
    fn artifact_id_storage_stem_uses_first_four_hex_chars() {
        let digest = Digest::from_hex("deadbeef00").unwrap();
        let artifact_id = ArtifactId::from(&BuildId::new_static(digest));
        assert_eq!(artifact_id.storage_stem(), "de/ad/deadbeef00");
    }

    #[test]
    fn package_id_equals_variant_id_of_package_step() {
        let digest = Digest::from_hex("aa").unwrap();
        let variant_id = VariantId::from_digest(digest);
        let package_id: PackageId = variant_id.clone().into();
        assert_eq!(package_id.variant_id(), &variant_id);
    }
}
