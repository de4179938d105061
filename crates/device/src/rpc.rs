//! The Junos RPCs this crate issues, and the text extraction applied to
//! their replies.
//!
//! Replies are small and their shape is fixed per RPC, so extraction works on
//! element text with regular expressions rather than a full XML tree.

use std::sync::LazyLock;

use itertools::Itertools;
use junos_core::{Error, Result};
use regex::Regex;

use crate::types::DeviceFacts;

/// An RPC understood by Junos devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rpc {
    GetSoftwareInformation,
    GetSha256Checksum { path: String },
    RequestPackageAdd { package: String, no_validate: bool },
    RequestReboot,
    ChassisClusterEnable {
        cluster_id: String,
        node: String,
        reboot: bool,
    },
    ChassisClusterDisable { reboot: bool },
    CloseSession,
}

impl Rpc {
    /// The RPC element name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetSoftwareInformation => "get-software-information",
            Self::GetSha256Checksum { .. } => "get-sha256-checksum-information",
            Self::RequestPackageAdd { .. } => "request-package-add",
            Self::RequestReboot => "request-reboot",
            Self::ChassisClusterEnable { .. } => "set-chassis-cluster-enable",
            Self::ChassisClusterDisable { .. } => "set-chassis-cluster-disable",
            Self::CloseSession => "close-session",
        }
    }

    /// Render the RPC body (the element inside `<rpc>`).
    #[must_use]
    pub fn to_xml(&self) -> String {
        let name = self.name();
        match self {
            Self::GetSoftwareInformation | Self::RequestReboot | Self::CloseSession => {
                format!("<{name}/>")
            }
            Self::GetSha256Checksum { path } => {
                format!("<{name}><path>{}</path></{name}>", escape(path))
            }
            Self::RequestPackageAdd {
                package,
                no_validate,
            } => format!(
                "<{name}><package-name>{}</package-name>{}</{name}>",
                escape(package),
                flag("no-validate", *no_validate)
            ),
            Self::ChassisClusterEnable {
                cluster_id,
                node,
                reboot,
            } => format!(
                "<{name}><cluster-id>{}</cluster-id><node>{}</node>{}</{name}>",
                escape(cluster_id),
                escape(node),
                flag("reboot", *reboot)
            ),
            Self::ChassisClusterDisable { reboot } => {
                format!("<{name}>{}</{name}>", flag("reboot", *reboot))
            }
        }
    }
}

fn flag(name: &str, set: bool) -> String {
    if set { format!("<{name}/>") } else { String::new() }
}

/// Escape text content for inclusion in an XML element.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());
static REPLY_ROOT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?s)<rpc-reply\b[^>]*>\s*(?:<\?[^>]*\?>\s*)?<([A-Za-z][\w.:-]*)").ok()
});
static BRACKETED: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").ok());

fn element_regex(tag: &str) -> Option<Regex> {
    let tag = regex::escape(tag);
    Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>")).ok()
}

/// Remove markup, unescape entities and collapse whitespace.
fn plain_text(fragment: &str) -> String {
    let stripped = match TAG.as_ref() {
        Some(tag) => tag.replace_all(fragment, " ").into_owned(),
        None => fragment.to_string(),
    };
    unescape(&stripped).split_whitespace().join(" ")
}

/// A raw `<rpc-reply>` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReply {
    xml: String,
}

impl RpcReply {
    /// Wrap a reply document.
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// The raw document.
    #[must_use]
    pub fn as_xml(&self) -> &str {
        &self.xml
    }

    /// Plain text of every `tag` element, in document order.
    #[must_use]
    pub fn texts_of(&self, tag: &str) -> Vec<String> {
        element_regex(tag)
            .map(|re| {
                re.captures_iter(&self.xml)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| plain_text(m.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Plain text of the first `tag` element.
    #[must_use]
    pub fn text_of(&self, tag: &str) -> Option<String> {
        self.texts_of(tag).into_iter().next()
    }

    /// Name of the first element inside `<rpc-reply>`.
    #[must_use]
    pub fn root_tag(&self) -> Option<&str> {
        REPLY_ROOT
            .as_ref()?
            .captures(&self.xml)?
            .get(1)
            .map(|m| m.as_str())
    }

    /// Messages of `<rpc-error>` elements with error severity.
    ///
    /// Junos reports some warnings as `<rpc-error>` with
    /// `<error-severity>warning</error-severity>`; those are not failures.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.texts_of_raw("rpc-error")
            .iter()
            .filter(|block| {
                RpcReply::new(block.as_str())
                    .text_of("error-severity")
                    .is_none_or(|severity| severity != "warning")
            })
            .map(|block| {
                let block = RpcReply::new(block.as_str());
                block
                    .text_of("error-message")
                    .unwrap_or_else(|| plain_text(block.as_xml()))
            })
            .collect()
    }

    /// Normalized text of the `<output>` blocks, one line per block.
    #[must_use]
    pub fn output_text(&self) -> Option<String> {
        let outputs = self.texts_of("output");
        if outputs.is_empty() {
            None
        } else {
            Some(outputs.join("\n"))
        }
    }

    /// Human-readable message carried by the reply.
    ///
    /// Plain `<output>` replies yield their text. Structured replies yield
    /// their `<message>` element, or the normalized text of the whole
    /// document when there is none.
    #[must_use]
    pub fn message(&self) -> String {
        match self.root_tag() {
            Some("output") => self.output_text().unwrap_or_default(),
            _ => self
                .text_of("message")
                .unwrap_or_else(|| plain_text(&self.xml)),
        }
    }

    /// The `<package-result>` code of a package operation, if reported.
    #[must_use]
    pub fn package_result(&self) -> Option<i64> {
        self.text_of("package-result")
            .and_then(|code| code.trim().parse().ok())
    }

    /// Facts from a `get-software-information` reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] when no software version can be found.
    pub fn software_facts(&self) -> Result<DeviceFacts> {
        let version = self
            .text_of("junos-version")
            .or_else(|| self.release_from_package_comment())
            .ok_or_else(|| {
                Error::rpc(
                    "get-software-information",
                    "reply does not report a software version",
                )
            })?;

        Ok(DeviceFacts {
            hostname: self.text_of("host-name"),
            model: self.text_of("product-model"),
            version,
        })
    }

    /// `JUNOS Software Release [12.1X46-D10.2]` -> `12.1X46-D10.2`
    fn release_from_package_comment(&self) -> Option<String> {
        let bracketed = BRACKETED.as_ref()?;
        self.texts_of("comment")
            .iter()
            .filter(|comment| comment.to_uppercase().contains("JUNOS"))
            .find_map(|comment| {
                bracketed
                    .captures(comment)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().trim().to_string())
            })
    }

    fn texts_of_raw(&self, tag: &str) -> Vec<String> {
        element_regex(tag)
            .map(|re| {
                re.captures_iter(&self.xml)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
