//! Streaming emission of the metalink transfer-description document.
//!
//! The document is the declarative job description handed to the
//! external download agent: one `file` element per artifact carrying
//! its size, the strongest declared digest, and every mirror URI at
//! priority 1. Emission is element-at-a-time so the document can feed a
//! live process pipe without buffering, with no artifact-count bound.

use std::fmt::Write as _;
use std::io;

use crate::artifact::Artifact;

/// XML namespace of the metalink document root.
pub const METALINK_NAMESPACE: &str = "urn:ietf:params:xml:ns:metalink";

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                      <metalink xmlns=\"urn:ietf:params:xml:ns:metalink\">\n";
const FOOTER: &str = "</metalink>\n";

/// A transfer-description document over a set of artifacts.
#[derive(Debug)]
pub struct MetalinkDocument<'a> {
    artifacts: &'a [Artifact],
}

impl<'a> MetalinkDocument<'a> {
    /// Wraps a set of artifacts for emission, in input order.
    #[must_use]
    pub fn new(artifacts: &'a [Artifact]) -> Self {
        Self { artifacts }
    }

    /// Yields the document as a header chunk, one chunk per artifact,
    /// and a footer chunk.
    ///
    /// Callers stream each chunk into the agent's stdin (or a file)
    /// without ever holding the whole document.
    pub fn chunks(&self) -> impl Iterator<Item = String> + use<'a> {
        std::iter::once(HEADER.to_string())
            .chain(self.artifacts.iter().map(file_element))
            .chain(std::iter::once(FOOTER.to_string()))
    }

    /// Writes the whole document to `writer`, chunk by chunk.
    ///
    /// Backs the "serialize only, no transfer" output mode.
    ///
    /// # Errors
    ///
    /// Propagates IO errors from the writer.
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for chunk in self.chunks() {
            writer.write_all(chunk.as_bytes())?;
        }
        writer.flush()
    }
}

/// Renders one `file` element for an artifact.
fn file_element(artifact: &Artifact) -> String {
    let mut out = String::new();
    // String formatting is infallible.
    let _ = writeln!(
        out,
        "  <file name=\"{}\">",
        escape_xml(&artifact.filename())
    );
    let _ = writeln!(out, "    <size>{}</size>", artifact.size);
    if let Some((algorithm, digest)) = artifact.selected_hash() {
        let _ = writeln!(
            out,
            "    <hash type=\"{algorithm}\">{}</hash>",
            escape_xml(digest)
        );
    }
    for uri in &artifact.uris {
        let _ = writeln!(
            out,
            "    <url priority=\"1\">{}</url>",
            escape_xml(uri.as_str())
        );
    }
    out.push_str("  </file>\n");
    out
}

/// Escapes the five XML-reserved characters for text and attribute use.
fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
