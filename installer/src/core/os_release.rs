//! `/etc/os-release` parsing and OS family resolution.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

use super::types::{HostIdentity, OsFamily};

/// Parsed `KEY=value` pairs from an os-release file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: BTreeMap<String, String>,
}

impl OsRelease {
    pub fn parse(raw: &str) -> Self {
        let mut fields = BTreeMap::new();
        for line in raw.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            fields.insert(key.to_string(), unquote(value.trim()));
        }
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// `ID`, defaulting to `linux` as the os-release format prescribes.
    pub fn id(&self) -> String {
        self.get("ID")
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "linux".to_string())
    }

    pub fn id_like(&self) -> Vec<String> {
        self.get("ID_LIKE")
            .map(|value| {
                value
                    .split_whitespace()
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'' {
        return value[1..value.len() - 1].to_string();
    }
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(ch);
            }
        }
        return out;
    }
    value.to_string()
}

/// Map a distribution id (plus its `ID_LIKE` ancestry) to a known family.
///
/// The distribution's own id wins over its ancestry.
pub fn family_for(id: &str, id_like: &[String]) -> OsFamily {
    std::iter::once(id)
        .chain(id_like.iter().map(String::as_str))
        .find_map(known_family)
        .unwrap_or_else(|| OsFamily::Unknown(id.to_string()))
}

fn known_family(id: &str) -> Option<OsFamily> {
    match id {
        "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" => Some(OsFamily::Debian),
        "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => Some(OsFamily::Fedora),
        "arch" | "manjaro" | "endeavouros" => Some(OsFamily::Arch),
        "alpine" => Some(OsFamily::Alpine),
        "suse" | "opensuse" | "sles" => Some(OsFamily::Suse),
        other if other.starts_with("opensuse") => Some(OsFamily::Suse),
        _ => None,
    }
}

/// Build the host identity from os-release contents.
pub fn identity_from_os_release(raw: &str, arch: &str) -> HostIdentity {
    let release = OsRelease::parse(raw);
    let id = release.id();
    HostIdentity {
        family: family_for(&id, &release.id_like()),
        version: release.get("VERSION_ID").map(str::to_string),
        pretty_name: release.get("PRETTY_NAME").map(str::to_string),
        id,
        arch: arch.to_string(),
    }
}

/// Build the host identity for hosts without os-release, from `uname -s`.
///
/// Only macOS is recognized; anything else leaves the host unidentified.
pub fn identity_from_kernel(kernel: &str, arch: &str) -> Result<HostIdentity> {
    match kernel.trim() {
        "Darwin" => Ok(HostIdentity {
            family: OsFamily::MacOs,
            id: "darwin".to_string(),
            version: None,
            pretty_name: Some("macOS".to_string()),
            arch: arch.to_string(),
        }),
        other => Err(anyhow!(
            "no /etc/os-release and unrecognized kernel '{other}'"
        )),
    }
}
