// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Directory layout rules for each build mode (spec.md §4.4 "Layout").

use std::path::PathBuf;

use bob_foundation::PackagePath;

use crate::types::{BuildMode, WorkspaceArea};

/// The bucket string a package/area pairing is tracked under in the
/// suffix [`crate::ledger::Ledger`]. Distinct per mode since dev and
/// release trees are independent namespaces.
pub fn bucket_key(mode: &BuildMode, package: &PackagePath, area: WorkspaceArea) -> String {
    format!("{}/{}/{}", mode_key(mode), area.as_str(), package.as_rel_path())
}

fn mode_key(mode: &BuildMode) -> &'static str {
    match mode {
        BuildMode::Dev => "dev",
        BuildMode::Release => "release",
        BuildMode::Jenkins { .. } => "jenkins",
    }
}

/// The workspace directory for `(package, area)` at `suffix`, rooted at
/// `root` (spec.md §4.4 layout tables). The returned path's final
/// component is always `workspace`.
pub fn workspace_dir(
    root: &std::path::Path,
    mode: &BuildMode,
    package: &PackagePath,
    area: WorkspaceArea,
    suffix: u32,
) -> PathBuf {
    match mode {
        BuildMode::Dev => root
            .join("dev")
            .join(area.as_str())
            .join(package.as_rel_path())
            .join(suffix.to_string())
            .join("workspace"),
        BuildMode::Release => root
            .join("work")
            .join(package.as_rel_path())
            .join(area.as_str())
            .join(suffix.to_string())
            .join("workspace"),
        BuildMode::Jenkins { job_prefix } => {
            let job_name = match job_prefix {
                Some(prefix) => format!("{prefix}-{}", package.leaf()),
                None => package.leaf().to_string(),
            };
            root.join("jenkins")
                .join(job_name)
                .join(area.as_str())
                .join(suffix.to_string())
                .join("workspace")
        }
    }
}

/// The attic directory a retired workspace is moved into instead of
/// being deleted outright, distinguished by a caller-supplied token so
/// repeated promotions of the same bucket never collide.
pub fn attic_dir(root: &std::path::Path, bucket: &str, token: &str) -> PathBuf {
    root.join("attic").join(bucket.replace('/', "__")).join(token)
}

#[cfg(test)]
mod layout_test {
    use super::*;
    use std::str::FromStr;

    fn pkg(s: &str) -> PackagePath {
        PackagePath::from_str(s).unwrap()
    }

    #[test]
    fn dev_layout_places_suffix_before_workspace_leaf() {
        let path = workspace_dir(
            std::path::Path::new("/proj"),
            &BuildMode::Dev,
            &pkg("app::lib"),
            WorkspaceArea::Build,
            2,
        );
        assert_eq!(path, std::path::PathBuf::from("/proj/dev/build/app/lib/2/workspace"));
    }

    #[test]
    fn release_layout_nests_area_under_package() {
        let path = workspace_dir(
            std::path::Path::new("/proj"),
            &BuildMode::Release,
            &pkg("app"),
            WorkspaceArea::Src,
            0,
        );
        assert_eq!(path, std::path::PathBuf::from("/proj/work/app/src/0/workspace"));
    }

    #[test]
    fn jenkins_layout_uses_job_prefix() {
        let path = workspace_dir(
            std::path::Path::new("/proj"),
            &BuildMode::Jenkins { job_prefix: Some("nightly".to_string()) },
            &pkg("app"),
            WorkspaceArea::Dist,
            0,
        );
        assert_eq!(path, std::path::PathBuf::from("/proj/jenkins/nightly-app/dist/0/workspace"));
    }
}
