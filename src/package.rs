//! Story package export/import: a self-contained bundle of manifest, model,
//! and binary assets.
//!
//! Imported bundles are untrusted. Assets are base64 blobs accepted only
//! when they decode, stay under the size cap, and start with a recognized
//! image/audio magic-byte signature; text fields are stripped of executable
//! script payloads before the model is accepted.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::error::{GbError, GbResult};
use crate::model::StoryModel;

/// Maximum decoded size of a single packaged asset.
pub const MAX_ASSET_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub story_id: String,
    pub version: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl PackageManifest {
    /// All four required fields must be present and non-blank.
    pub fn is_valid(&self) -> bool {
        [&self.story_id, &self.version, &self.title, &self.author]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackagedAsset {
    pub name: String,
    pub base64: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoryPackage {
    pub manifest: PackageManifest,
    pub model: StoryModel,
    #[serde(default)]
    pub assets: Vec<PackagedAsset>,
}

/// Accepts only payloads starting with a recognized image or audio
/// signature. Anything else is rejected rather than sniffed further.
pub fn has_known_signature(bytes: &[u8]) -> bool {
    if bytes.len() < 12 {
        return false;
    }
    // PNG
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        return true;
    }
    // JPEG
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return true;
    }
    // GIF
    if bytes.starts_with(b"GIF89a") || bytes.starts_with(b"GIF87a") {
        return true;
    }
    // WEBP / WAV share the RIFF container
    if bytes.starts_with(b"RIFF") && (&bytes[8..12] == b"WEBP" || &bytes[8..12] == b"WAVE") {
        return true;
    }
    // OGG
    if bytes.starts_with(b"OggS") {
        return true;
    }
    // MP3: ID3 tag or bare frame sync
    if bytes.starts_with(b"ID3") {
        return true;
    }
    if bytes[0] == 0xff && (bytes[1] & 0xe0) == 0xe0 {
        return true;
    }
    false
}

/// Checks every asset, accumulating one diagnostic per violation.
pub fn validate_assets(assets: &[PackagedAsset]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for asset in assets {
        if asset.name.trim().is_empty() {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::AssetShape,
                "Invalid asset payload shape",
            ));
            continue;
        }
        let bytes = match base64::engine::general_purpose::STANDARD.decode(&asset.base64) {
            Ok(bytes) => bytes,
            Err(_) => {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticCode::AssetShape,
                        format!("Invalid asset payload shape: {}", asset.name),
                    )
                    .with_context("asset", &asset.name),
                );
                continue;
            }
        };
        if bytes.len() > MAX_ASSET_BYTES {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::AssetTooLarge,
                    format!("Asset too large: {}", asset.name),
                )
                .with_context("asset", &asset.name),
            );
            continue;
        }
        if !has_known_signature(&bytes) {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::AssetSignature,
                    format!("Unsupported or unsafe asset type: {}", asset.name),
                )
                .with_context("asset", &asset.name),
            );
        }
    }
    diagnostics
}

fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack[from..]
        .to_ascii_lowercase()
        .find(needle)
        .map(|position| position + from)
}

fn strip_script_blocks(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(open) = find_ci(input, "<script", cursor) {
        match find_ci(input, "</script>", open) {
            Some(close) => {
                output.push_str(&input[cursor..open]);
                cursor = close + "</script>".len();
            }
            None => break,
        }
    }
    output.push_str(&input[cursor..]);
    output
}

fn strip_js_urls(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(hit) = find_ci(input, "javascript:", cursor) {
        output.push_str(&input[cursor..hit]);
        cursor = hit + "javascript:".len();
    }
    output.push_str(&input[cursor..]);
    output
}

fn strip_event_handlers(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].eq_ignore_ascii_case(&b'o')
            && i + 1 < bytes.len()
            && bytes[i + 1].eq_ignore_ascii_case(&b'n')
        {
            let mut name_end = i + 2;
            while name_end < bytes.len()
                && (bytes[name_end].is_ascii_alphanumeric() || bytes[name_end] == b'_')
            {
                name_end += 1;
            }
            if name_end > i + 2 {
                let mut eq = name_end;
                while eq < bytes.len() && bytes[eq].is_ascii_whitespace() {
                    eq += 1;
                }
                if eq < bytes.len() && bytes[eq] == b'=' {
                    output.push_str(&input[copied..i]);
                    copied = eq + 1;
                    i = eq + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    output.push_str(&input[copied..]);
    output
}

/// Strips executable payloads from a single text field.
pub fn sanitize_text(value: &str) -> String {
    strip_event_handlers(&strip_js_urls(&strip_script_blocks(value)))
}

/// Returns a copy of the model with every author-visible text field
/// sanitized: node text and ids, choice labels and ids, and item, enemy,
/// and encounter names.
pub fn sanitize_model(model: &StoryModel) -> StoryModel {
    let mut cloned = model.clone();
    for node in cloned.nodes.values_mut() {
        node.text = sanitize_text(&node.text);
        node.id = sanitize_text(&node.id);
        for choice in node.choices.iter_mut().flatten() {
            choice.label = sanitize_text(&choice.label);
            choice.id = sanitize_text(&choice.id);
        }
    }
    for item in cloned.items.values_mut() {
        item.name = sanitize_text(&item.name);
    }
    for enemy in cloned.enemies.values_mut() {
        enemy.name = sanitize_text(&enemy.name);
    }
    for encounter in cloned.encounters.values_mut() {
        encounter.name = sanitize_text(&encounter.name);
    }
    cloned
}

/// Serializes a package to pretty JSON.
pub fn export_package(package: &StoryPackage) -> GbResult<String> {
    if !package.manifest.is_valid() {
        return Err(GbError::Package(
            "manifest requires non-empty storyId, version, title, and author".to_string(),
        ));
    }
    Ok(serde_json::to_string_pretty(package)?)
}

/// Parses and screens a package. Undecodable JSON and an invalid manifest
/// are fatal; per-asset violations come back as diagnostics, and the model
/// text fields are sanitized before being handed to the caller.
pub fn import_package(json: &str) -> GbResult<(StoryPackage, Vec<Diagnostic>)> {
    let package: StoryPackage = serde_json::from_str(json)?;
    if !package.manifest.is_valid() {
        return Err(GbError::Package(
            "manifest requires non-empty storyId, version, title, and author".to_string(),
        ));
    }
    let diagnostics = validate_assets(&package.assets);
    let sanitized = StoryPackage {
        model: sanitize_model(&package.model),
        ..package
    };
    Ok((sanitized, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoryNode;

    fn manifest() -> PackageManifest {
        PackageManifest {
            story_id: "default".to_string(),
            version: "v1".to_string(),
            title: "Test Story".to_string(),
            author: "tester".to_string(),
            description: None,
            created_at: None,
        }
    }

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn manifest_requires_all_fields_non_blank() {
        assert!(manifest().is_valid());
        let mut incomplete = manifest();
        incomplete.author = "  ".to_string();
        assert!(!incomplete.is_valid());
    }

    #[test]
    fn accepts_known_signatures_and_rejects_unknown() {
        let png = encode(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d]);
        let bad = encode(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb]);
        let diagnostics = validate_assets(&[
            PackagedAsset {
                name: "ok.png".to_string(),
                base64: png,
            },
            PackagedAsset {
                name: "bad.bin".to_string(),
                base64: bad,
            },
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::AssetSignature);
        assert!(diagnostics[0].message.contains("bad.bin"));
    }

    #[test]
    fn undecodable_base64_is_a_shape_error() {
        let diagnostics = validate_assets(&[PackagedAsset {
            name: "broken.png".to_string(),
            base64: "%%%not-base64%%%".to_string(),
        }]);
        assert_eq!(diagnostics[0].code, DiagnosticCode::AssetShape);
    }

    #[test]
    fn oversized_asset_is_rejected() {
        let huge = encode(&vec![0xffu8; MAX_ASSET_BYTES + 1]);
        let diagnostics = validate_assets(&[PackagedAsset {
            name: "huge.mp3".to_string(),
            base64: huge,
        }]);
        assert_eq!(diagnostics[0].code, DiagnosticCode::AssetTooLarge);
    }

    #[test]
    fn tiny_payloads_never_match_a_signature() {
        assert!(!has_known_signature(b"OggS"));
        assert!(has_known_signature(b"OggS........"));
    }

    #[test]
    fn sanitize_strips_script_blocks_and_handlers() {
        assert_eq!(
            sanitize_text("<script>alert(1)</script>Hello"),
            "Hello"
        );
        assert_eq!(
            sanitize_text("click javascript:evil() here"),
            "click evil() here"
        );
        assert_eq!(sanitize_text("<img onerror=boom>"), "<img boom>");
        assert_eq!(sanitize_text("plain text stays"), "plain text stays");
    }

    #[test]
    fn sanitize_model_cleans_node_text_and_choice_labels() {
        let mut model = StoryModel::default();
        model.nodes.insert(
            "n1".to_string(),
            StoryNode {
                id: "n1".to_string(),
                node_type: "narrative".to_string(),
                text: "<script>alert(1)</script>Hello".to_string(),
                image: None,
                on_enter: None,
                choices: None,
            },
        );
        let sanitized = sanitize_model(&model);
        assert_eq!(sanitized.nodes["n1"].text, "Hello");
    }

    #[test]
    fn package_round_trips_through_json() {
        let package = StoryPackage {
            manifest: manifest(),
            model: StoryModel::default(),
            assets: vec![],
        };
        let json = export_package(&package).unwrap();
        let (imported, diagnostics) = import_package(&json).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(imported.manifest, package.manifest);
    }

    #[test]
    fn import_rejects_invalid_manifest_outright() {
        let json = r#"{"manifest":{"storyId":"x","version":"","title":"t","author":"a"},"model":{}}"#;
        assert!(import_package(json).is_err());
    }
}
