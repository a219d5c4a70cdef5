//! Lazily-initialized SPDX license identifier table.

use std::collections::HashMap;
use std::sync::OnceLock;

/// A single entry of the SPDX license list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub deprecated: bool,
    pub osi_approved: bool,
    pub see_also: &'static [&'static str],
}

/// A compact, commonly-seen subset of the SPDX license list. Entries are
/// the ones most often found on GitHub repositories and Go modules; this
/// is not a full mirror of the upstream SPDX license-list-data JSON.
const LICENSES: &[LicenseInfo] = &[
    LicenseInfo {
        id: "MIT",
        name: "MIT License",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://opensource.org/licenses/MIT"],
    },
    LicenseInfo {
        id: "Apache-2.0",
        name: "Apache License 2.0",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.apache.org/licenses/LICENSE-2.0"],
    },
    LicenseInfo {
        id: "BSD-2-Clause",
        name: "BSD 2-Clause \"Simplified\" License",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://opensource.org/licenses/BSD-2-Clause"],
    },
    LicenseInfo {
        id: "BSD-3-Clause",
        name: "BSD 3-Clause \"New\" or \"Revised\" License",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://opensource.org/licenses/BSD-3-Clause"],
    },
    LicenseInfo {
        id: "ISC",
        name: "ISC License",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://opensource.org/licenses/ISC"],
    },
    LicenseInfo {
        id: "GPL-2.0-only",
        name: "GNU General Public License v2.0 only",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.gnu.org/licenses/old-licenses/gpl-2.0-standalone.html"],
    },
    LicenseInfo {
        id: "GPL-3.0-only",
        name: "GNU General Public License v3.0 only",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.gnu.org/licenses/gpl-3.0-standalone.html"],
    },
    LicenseInfo {
        id: "LGPL-2.1-only",
        name: "GNU Lesser General Public License v2.1 only",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.gnu.org/licenses/old-licenses/lgpl-2.1-standalone.html"],
    },
    LicenseInfo {
        id: "LGPL-3.0-only",
        name: "GNU Lesser General Public License v3.0 only",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.gnu.org/licenses/lgpl-3.0-standalone.html"],
    },
    LicenseInfo {
        id: "MPL-2.0",
        name: "Mozilla Public License 2.0",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.mozilla.org/en-US/MPL/2.0/"],
    },
    LicenseInfo {
        id: "AGPL-3.0-only",
        name: "GNU Affero General Public License v3.0 only",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.gnu.org/licenses/agpl-3.0-standalone.html"],
    },
    LicenseInfo {
        id: "Unlicense",
        name: "The Unlicense",
        deprecated: false,
        osi_approved: false,
        see_also: &["https://unlicense.org/"],
    },
    LicenseInfo {
        id: "BSL-1.0",
        name: "Boost Software License 1.0",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.boost.org/LICENSE_1_0.txt"],
    },
    LicenseInfo {
        id: "CC0-1.0",
        name: "Creative Commons Zero v1.0 Universal",
        deprecated: false,
        osi_approved: false,
        see_also: &["https://creativecommons.org/publicdomain/zero/1.0/"],
    },
    LicenseInfo {
        id: "GPL-2.0-or-later",
        name: "GNU General Public License v2.0 or later",
        deprecated: false,
        osi_approved: true,
        see_also: &["https://www.gnu.org/licenses/old-licenses/gpl-2.0-standalone.html"],
    },
];

static INDEX: OnceLock<HashMap<&'static str, &'static LicenseInfo>> = OnceLock::new();

fn index() -> &'static HashMap<&'static str, &'static LicenseInfo> {
    INDEX.get_or_init(|| LICENSES.iter().map(|l| (l.id, l)).collect())
}

/// Look up a license by its exact SPDX identifier (case-sensitive, as SPDX
/// ids are canonically written).
pub fn license_by_id(id: &str) -> Option<&'static LicenseInfo> {
    index().get(id).copied()
}

/// Every known SPDX license, in table order.
pub fn all() -> &'static [LicenseInfo] {
    LICENSES
}
