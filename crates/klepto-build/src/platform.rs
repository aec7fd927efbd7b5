use std::fs;

use crate::products::Configuration;

pub const OS_RELEASE: &str = "/etc/os-release";

fn os_release_field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches(['"', '\'']))
    })
}

/// `<distro id><release>-<arch>`, e.g. `ubuntu22.04-x86_64`.
pub fn platform_string(os_release: Option<&str>, arch: &str) -> String {
    let text = os_release.unwrap_or("");
    let id = os_release_field(text, "ID")
        .filter(|s| !s.is_empty())
        .unwrap_or("linux")
        .to_lowercase();
    let release = os_release_field(text, "VERSION_ID").unwrap_or("");
    format!("{id}{release}-{arch}")
}

pub fn host_os_release() -> Option<String> {
    fs::read_to_string(OS_RELEASE).ok()
}

pub fn host_arch() -> &'static str {
    std::env::consts::ARCH
}

/// Name of the distribution directory and archive.
pub fn dist_name(
    product: &str,
    version: &str,
    configuration: Configuration,
    platform: &str,
) -> String {
    format!(
        "{product}-{version}-{}-{platform}",
        configuration.as_str().to_uppercase()
    )
}
