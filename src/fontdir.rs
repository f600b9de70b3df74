use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The 14 standard PDF base fonts. Always present, never embedded, and
/// never shadowed by a system font of the same name.
pub const CORE_FONTS: [&str; 14] = [
    "Courier",
    "Courier-Bold",
    "Courier-BoldOblique",
    "Courier-Oblique",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-BoldOblique",
    "Helvetica-Oblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Symbol",
    "ZapfDingbats",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontSource {
    PdfCore,
    System,
    Registered,
}

impl FontSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FontSource::PdfCore => "pdf-core",
            FontSource::System => "system",
            FontSource::Registered => "registered",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub family: String,
    pub source: FontSource,
    pub path: Option<PathBuf>,
    pub embeddable: bool,
}

/// Immutable catalog of the font families visible to the engine: the core
/// 14 plus every parseable face found under the scanned directories.
/// First registration of a family wins.
pub struct FontCatalog {
    entries: Vec<CatalogEntry>,
}

static GLOBAL_CATALOG: OnceLock<FontCatalog> = OnceLock::new();

impl FontCatalog {
    /// The process-wide catalog over the platform font directories. Built
    /// at most once; later calls reuse the same scan.
    pub fn global() -> &'static FontCatalog {
        GLOBAL_CATALOG.get_or_init(|| FontCatalog::from_dirs(&system_font_dirs()))
    }

    pub fn from_dirs(dirs: &[PathBuf]) -> FontCatalog {
        let mut entries: Vec<CatalogEntry> = CORE_FONTS
            .iter()
            .map(|name| CatalogEntry {
                family: (*name).to_string(),
                source: FontSource::PdfCore,
                path: None,
                embeddable: false,
            })
            .collect();
        let mut seen_families: HashSet<String> =
            CORE_FONTS.iter().map(|n| n.to_ascii_lowercase()).collect();
        let mut seen_paths: HashSet<String> = HashSet::new();

        for dir in dirs {
            scan_dir(dir, &mut entries, &mut seen_families, &mut seen_paths);
        }
        entries.sort_by(|a, b| a.family.to_lowercase().cmp(&b.family.to_lowercase()));
        debug!("font catalog built: {} families", entries.len());
        FontCatalog { entries }
    }

    pub fn lookup(&self, family: &str) -> Option<&CatalogEntry> {
        let wanted = family.trim().to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.family.to_lowercase() == wanted)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

fn scan_dir(
    dir: &Path,
    entries: &mut Vec<CatalogEntry>,
    seen_families: &mut HashSet<String>,
    seen_paths: &mut HashSet<String>,
) {
    let Ok(listing) = fs::read_dir(dir) else {
        return;
    };
    for entry in listing.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, entries, seen_families, seen_paths);
            continue;
        }
        let Some(ext) = path.extension().and_then(|v| v.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" {
            continue;
        }
        if !seen_paths.insert(path.to_string_lossy().to_lowercase()) {
            continue;
        }
        let Ok(data) = fs::read(&path) else {
            continue;
        };
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            continue;
        };
        let Some(family) = family_from_face(&face) else {
            continue;
        };
        if !seen_families.insert(family.to_lowercase()) {
            continue;
        }
        entries.push(CatalogEntry {
            family,
            source: FontSource::System,
            embeddable: face_is_embeddable(&face),
            path: Some(path),
        });
    }
}

/// Family name from the name table, preferring a Windows-platform record
/// over legacy Macintosh encodings.
fn family_from_face(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut fallback = None;
    for entry in face.names() {
        if entry.name_id != name_id::FAMILY {
            continue;
        }
        let Some(name) = entry.to_string() else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        if entry.platform_id == ttf_parser::name::PlatformId::Windows {
            return Some(name);
        }
        if fallback.is_none() {
            fallback = Some(name);
        }
    }
    fallback
}

/// OS/2 fsType: only the restricted-license class blocks embedding. An
/// absent or unreadable table fails open.
fn face_is_embeddable(face: &ttf_parser::Face<'_>) -> bool {
    match face.permissions() {
        Some(ttf_parser::Permissions::Restricted) => false,
        _ => true,
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        dirs.push(PathBuf::from("C:\\Windows\\Fonts"));
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local/share/fonts"));
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testfont;

    #[test]
    fn core_fonts_are_always_present() {
        let catalog = FontCatalog::from_dirs(&[]);
        assert_eq!(catalog.entries().len(), CORE_FONTS.len());
        let helvetica = catalog.lookup("helvetica").expect("core entry");
        assert_eq!(helvetica.family, "Helvetica");
        assert_eq!(helvetica.source, FontSource::PdfCore);
        assert!(!helvetica.embeddable);
        assert!(helvetica.path.is_none());
    }

    #[test]
    fn scanned_faces_join_the_catalog_with_family_from_name_table() {
        let dir = crate::store::tests::scratch_dir("fontscan");
        let nested = dir.join("sub");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("testino.ttf"), testfont::build("Testino Sans", 0)).expect("write");
        fs::write(nested.join("junk.ttf"), b"not a font").expect("write");

        let catalog = FontCatalog::from_dirs(&[dir]);
        let entry = catalog.lookup("Testino Sans").expect("scanned entry");
        assert_eq!(entry.source, FontSource::System);
        assert!(entry.embeddable);
        assert!(entry.path.as_ref().is_some_and(|p| p.ends_with("testino.ttf")));
        assert!(catalog.lookup("junk").is_none());
    }

    #[test]
    fn restricted_license_faces_are_not_embeddable() {
        let dir = crate::store::tests::scratch_dir("fontrestrict");
        fs::write(
            dir.join("locked.ttf"),
            testfont::build("Locked Face", 0x0002),
        )
        .expect("write");

        let catalog = FontCatalog::from_dirs(&[dir]);
        let entry = catalog.lookup("Locked Face").expect("entry");
        assert!(!entry.embeddable);
    }

    #[test]
    fn first_registered_family_wins() {
        let dir_a = crate::store::tests::scratch_dir("fontdup_a");
        let dir_b = crate::store::tests::scratch_dir("fontdup_b");
        fs::write(dir_a.join("a.ttf"), testfont::build("Duplicated", 0)).expect("write");
        fs::write(dir_b.join("b.ttf"), testfont::build("Duplicated", 0x0002)).expect("write");

        let catalog = FontCatalog::from_dirs(&[dir_a, dir_b]);
        let entry = catalog.lookup("Duplicated").expect("entry");
        assert!(entry.path.as_ref().is_some_and(|p| p.ends_with("a.ttf")));
        assert!(entry.embeddable);
    }
}
