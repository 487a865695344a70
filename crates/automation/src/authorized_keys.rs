//! `authorized_keys` merging for SSH key rotation.
//!
//! Backends read the current file, call [`merge`] and write the result back.
//! Keys installed by keyshift carry [`MANAGED_MARKER`] in their comment so
//! [`SshKeyChangeStrategy::SetJms`] can find them again.

use crate::SshKeyChangeStrategy;

pub const MANAGED_MARKER: &str = "keyshift-managed";

/// Returns the new file contents for `existing` after installing `new_key`.
pub fn merge(existing: &str, new_key: &str, strategy: SshKeyChangeStrategy) -> String {
    let new_line = tag_managed(new_key.trim());
    let new_material = key_material(&new_line);

    let kept: Vec<&str> = match strategy {
        SshKeyChangeStrategy::Set => Vec::new(),
        SshKeyChangeStrategy::Add => existing
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter(|l| key_material(l) != new_material)
            .collect(),
        SshKeyChangeStrategy::SetJms => existing
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter(|l| !is_managed(l))
            .filter(|l| key_material(l) != new_material)
            .collect(),
    };

    let mut out = String::new();
    for line in kept {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&new_line);
    out.push('\n');
    out
}

pub fn is_managed(line: &str) -> bool {
    line.split_whitespace().skip(2).any(|w| w == MANAGED_MARKER)
}

fn tag_managed(key: &str) -> String {
    if is_managed(key) {
        key.to_owned()
    } else {
        format!("{key} {MANAGED_MARKER}")
    }
}

/// `(algorithm, base64 blob)` of a key line; `None` for comment lines.
fn key_material(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let mut parts = line.split_whitespace();
    Some((parts.next()?, parts.next()?))
}
