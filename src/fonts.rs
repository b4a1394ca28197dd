use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use serde::{Deserialize, Serialize};
use ttf_parser::Face;

use crate::color::PT_TO_MM;

/// Font files handed over by the font acquisition step. Names are resolved
/// against `dir` first, then against the platform font directories.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FontPaths {
    pub dir: Option<PathBuf>,
    pub regular: Option<String>,
    pub bold: Option<String>,
    pub italic: Option<String>,
    pub bold_italic: Option<String>,
    pub mono: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    Main,
    Mono,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Style {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl Style {
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => Style::BoldItalic,
            (true, false) => Style::Bold,
            (false, true) => Style::Italic,
            (false, false) => Style::Regular,
        }
    }
}

/// Registry slots. The mono family has a single slot used for every style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceRole {
    Regular,
    Bold,
    Italic,
    BoldItalic,
    Mono,
}

impl FaceRole {
    fn slot(self) -> usize {
        self as usize
    }

    fn of(family: Family, style: Style) -> Self {
        match (family, style) {
            (Family::Mono, _) => FaceRole::Mono,
            (Family::Main, Style::Regular) => FaceRole::Regular,
            (Family::Main, Style::Bold) => FaceRole::Bold,
            (Family::Main, Style::Italic) => FaceRole::Italic,
            (Family::Main, Style::BoldItalic) => FaceRole::BoldItalic,
        }
    }
}

/// Fallback order for a font request: the exact face, the main family in
/// the same style, the main regular face. `None` means the built-in face.
pub fn resolve_role(
    available: impl Fn(FaceRole) -> bool,
    family: Family,
    style: Style,
) -> Option<FaceRole> {
    [
        FaceRole::of(family, style),
        FaceRole::of(Family::Main, style),
        FaceRole::Regular,
    ]
    .into_iter()
    .find(|role| available(*role))
}

/// A font as seen by the drawing code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontId {
    Embedded(usize),
    /// Standard-14 face used when nothing suitable is registered.
    Builtin(Family, Style),
}

impl FontId {
    pub(crate) fn resource_name(self) -> String {
        match self {
            FontId::Embedded(i) => format!("F{}", i + 1),
            FontId::Builtin(Family::Main, style) => format!("H{}", style as usize + 1),
            FontId::Builtin(Family::Mono, style) => format!("C{}", style as usize + 1),
        }
    }
}

fn builtin_base_font(family: Family, style: Style) -> &'static str {
    match (family, style) {
        (Family::Main, Style::Regular) => "Helvetica",
        (Family::Main, Style::Bold) => "Helvetica-Bold",
        (Family::Main, Style::Italic) => "Helvetica-Oblique",
        (Family::Main, Style::BoldItalic) => "Helvetica-BoldOblique",
        (Family::Mono, Style::Regular) => "Courier",
        (Family::Mono, Style::Bold) => "Courier-Bold",
        (Family::Mono, Style::Italic) => "Courier-Oblique",
        (Family::Mono, Style::BoldItalic) => "Courier-BoldOblique",
    }
}

struct LoadedFace {
    path: PathBuf,
    ps_name: String,
    data: Mmap,
    units_per_em: f32,
    /// Unicode char -> (original glyph id, advance in 1000-units).
    glyphs: HashMap<char, (u16, f32)>,
    used: BTreeSet<char>,
    /// Char -> glyph id inside the subset, fixed before the final pass.
    subset: BTreeMap<char, u16>,
    remapper: subsetter::GlyphRemapper,
}

impl LoadedFace {
    fn open(path: &Path) -> Option<Self> {
        let file = std::fs::File::open(path).ok()?;
        let data = unsafe { Mmap::map(&file) }.ok()?;
        let (ps_name, units_per_em, glyphs) = {
            let face = Face::parse(&data, 0).ok()?;
            let units = face.units_per_em() as f32;
            let mut glyphs = HashMap::new();
            if let Some(cmap) = face.tables().cmap {
                for sub in cmap.subtables {
                    if !sub.is_unicode() {
                        continue;
                    }
                    sub.codepoints(|cp| {
                        if let Some(ch) = char::from_u32(cp)
                            && !glyphs.contains_key(&ch)
                            && let Some(gid) = sub.glyph_index(cp)
                        {
                            let advance = face
                                .glyph_hor_advance(gid)
                                .map(|adv| adv as f32 / units * 1000.0)
                                .unwrap_or(0.0);
                            glyphs.insert(ch, (gid.0, advance));
                        }
                    });
                }
            }
            (postscript_name(&face, path), units, glyphs)
        };
        Some(Self {
            path: path.to_path_buf(),
            ps_name,
            data,
            units_per_em,
            glyphs,
            used: BTreeSet::new(),
            subset: BTreeMap::new(),
            remapper: subsetter::GlyphRemapper::new(),
        })
    }
}

fn postscript_name(face: &Face, path: &Path) -> String {
    let from_table = face
        .names()
        .into_iter()
        .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME && n.is_unicode())
        .and_then(|n| n.to_string());
    let name = from_table.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Font")
            .to_string()
    });
    name.chars().filter(|c| c.is_ascii_graphic() && *c != '/').collect()
}

/// Registered faces plus the per-face record of characters drawn with them.
pub struct FontRegistry {
    faces: Vec<LoadedFace>,
    slots: [Option<usize>; 5],
    builtins_used: BTreeSet<(Family, Style)>,
}

impl FontRegistry {
    /// A registry with no faces at all: every request resolves to a built-in.
    pub fn builtin_only() -> Self {
        Self {
            faces: Vec::new(),
            slots: [None; 5],
            builtins_used: BTreeSet::new(),
        }
    }

    /// Load the configured faces. Missing variants fall back to the regular
    /// face with a warning; a missing regular face leaves the built-in fonts.
    pub fn register(paths: &FontPaths) -> Self {
        let t0 = std::time::Instant::now();
        let mut reg = Self::builtin_only();

        let regular = paths.regular.as_deref().and_then(|name| reg.load(paths, name, "regular"));
        if regular.is_none() {
            log::warn!("No regular face registered, using built-in Helvetica");
        }
        reg.slots[FaceRole::Regular.slot()] = regular;

        let variant = |reg: &mut Self, name: Option<&str>, label: &str| {
            let loaded = name.and_then(|n| reg.load(paths, n, label));
            if loaded.is_none() && regular.is_some() {
                log::warn!("No {label} face available, using the regular face");
            }
            loaded
        };

        let bold = variant(&mut reg, paths.bold.as_deref(), "bold");
        let italic = variant(&mut reg, paths.italic.as_deref(), "italic");
        let bold_italic = paths
            .bold_italic
            .as_deref()
            .and_then(|n| reg.load(paths, n, "bold-italic"));
        let mono = variant(&mut reg, paths.mono.as_deref(), "mono");

        let bold_italic = bold_italic.or_else(|| {
            let substitute = bold.or(italic);
            if substitute.is_some() {
                log::warn!("No bold-italic face available, substituting the bold/italic face");
            } else if regular.is_some() {
                log::warn!("No bold-italic face available, using the regular face");
            }
            substitute
        });

        reg.slots[FaceRole::Bold.slot()] = bold.or(regular);
        reg.slots[FaceRole::Italic.slot()] = italic.or(regular);
        reg.slots[FaceRole::BoldItalic.slot()] = bold_italic.or(regular);
        reg.slots[FaceRole::Mono.slot()] = mono.or(regular);

        log::info!(
            "Fonts registered: {} face(s) in {:.1}ms",
            reg.faces.len(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        reg
    }

    fn load(&mut self, paths: &FontPaths, name: &str, label: &str) -> Option<usize> {
        let Some(path) = resolve_font_path(name, paths.dir.as_deref()) else {
            log::warn!("Font file for {label} face not found: {name}");
            return None;
        };
        if let Some(i) = self.faces.iter().position(|f| f.path == path) {
            return Some(i);
        }
        match LoadedFace::open(&path) {
            Some(face) => {
                log::debug!("Loaded {label} face {} from {}", face.ps_name, path.display());
                self.faces.push(face);
                Some(self.faces.len() - 1)
            }
            None => {
                log::warn!("Unreadable font file for {label} face: {}", path.display());
                None
            }
        }
    }

    pub fn has_role(&self, role: FaceRole) -> bool {
        self.slots[role.slot()].is_some()
    }

    /// Pick the face for a request. Never fails: the last resort is a
    /// built-in face (Courier for mono requests, Helvetica otherwise).
    pub fn select(&self, family: Family, style: Style) -> FontId {
        match resolve_role(|r| self.has_role(r), family, style)
            .and_then(|role| self.slots[role.slot()])
        {
            Some(i) => FontId::Embedded(i),
            None => FontId::Builtin(family, style),
        }
    }

    fn char_width_1000(&self, font: FontId, ch: char) -> f32 {
        match font {
            FontId::Embedded(i) => self.faces[i]
                .glyphs
                .get(&ch)
                .map(|&(_, w)| w)
                .unwrap_or(0.0),
            FontId::Builtin(Family::Mono, _) => 600.0,
            FontId::Builtin(Family::Main, _) => {
                let byte = char_to_winansi(ch);
                if byte >= 32 {
                    HELVETICA_WIDTHS[(byte - 32) as usize]
                } else {
                    HELVETICA_WIDTHS[(b'?' - 32) as usize]
                }
            }
        }
    }

    /// Width of `text` in millimetres at `size_pt`.
    pub fn text_width(&self, font: FontId, text: &str, size_pt: f32) -> f32 {
        let units: f32 = text.chars().map(|ch| self.char_width_1000(font, ch)).sum();
        units * size_pt / 1000.0 * PT_TO_MM
    }

    pub(crate) fn record_used(&mut self, font: FontId, text: &str) {
        match font {
            FontId::Embedded(i) => self.faces[i].used.extend(text.chars()),
            FontId::Builtin(family, style) => {
                self.builtins_used.insert((family, style));
            }
        }
    }

    /// Freeze the glyph subset of every face from the characters recorded so
    /// far. Digits and page-number punctuation are always kept so page labels
    /// can change between passes.
    pub(crate) fn prepare_subsets(&mut self) {
        for face in &mut self.faces {
            let mut remapper = subsetter::GlyphRemapper::new();
            remapper.remap(0);
            let mut subset = BTreeMap::new();
            let extra = ('0'..='9').chain(['.', '/', ' ', '-']);
            let chars: BTreeSet<char> = face.used.iter().copied().chain(extra).collect();
            for ch in chars {
                if let Some(&(gid, _)) = face.glyphs.get(&ch) {
                    subset.insert(ch, remapper.remap(gid));
                }
            }
            face.subset = subset;
            face.remapper = remapper;
        }
    }

    /// Bytes for a PDF text-show operator with `font` selected.
    pub(crate) fn encode(&self, font: FontId, text: &str) -> Vec<u8> {
        match font {
            FontId::Embedded(i) => {
                let subset = &self.faces[i].subset;
                let mut out = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    let gid = subset.get(&ch).copied().unwrap_or(0);
                    out.extend_from_slice(&gid.to_be_bytes());
                }
                out
            }
            FontId::Builtin(..) => to_winansi_bytes(text),
        }
    }

    /// Write every font object that was drawn with. Returns resource names
    /// and refs in a stable order.
    pub(crate) fn embed(
        &self,
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
    ) -> Vec<(String, Ref)> {
        let mut out = Vec::new();
        for (i, face) in self.faces.iter().enumerate() {
            if face.used.is_empty() {
                continue;
            }
            let font_ref = alloc();
            embed_truetype(pdf, font_ref, face, alloc);
            out.push((FontId::Embedded(i).resource_name(), font_ref));
        }
        for &(family, style) in &self.builtins_used {
            let font_ref = alloc();
            pdf.type1_font(font_ref)
                .base_font(Name(builtin_base_font(family, style).as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            out.push((FontId::Builtin(family, style).resource_name(), font_ref));
        }
        out
    }
}

/// Embed a face as a Type0 font with a CIDFontType2 descendant and Identity-H
/// encoding, subsetted to the glyphs fixed by `prepare_subsets`.
fn embed_truetype(pdf: &mut Pdf, font_ref: Ref, face: &LoadedFace, alloc: &mut impl FnMut() -> Ref) {
    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let program = subsetter::subset(&face.data, 0, &face.remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {}: {e}, embedding the full font", face.ps_name);
        face.data.to_vec()
    });
    let program_len = i32::try_from(program.len()).unwrap_or(i32::MAX);
    pdf.stream(data_ref, &program).pair(Name(b"Length1"), program_len);

    let scale = 1000.0 / face.units_per_em;
    let (bbox, ascent, descent, cap_height) = match Face::parse(&face.data, 0) {
        Ok(parsed) => {
            let bb = parsed.global_bounding_box();
            (
                Rect::new(
                    bb.x_min as f32 * scale,
                    bb.y_min as f32 * scale,
                    bb.x_max as f32 * scale,
                    bb.y_max as f32 * scale,
                ),
                parsed.ascender() as f32 * scale,
                parsed.descender() as f32 * scale,
                parsed.capital_height().map(|h| h as f32 * scale).unwrap_or(700.0),
            )
        }
        Err(_) => (Rect::new(0.0, -200.0, 1000.0, 900.0), 800.0, -200.0, 700.0),
    };

    let ps_name = face.ps_name.as_bytes();
    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };

    // One entry per subset glyph; several chars may share a glyph.
    let mut by_gid: BTreeMap<u16, char> = BTreeMap::new();
    for (&ch, &gid) in &face.subset {
        by_gid.entry(gid).or_insert(ch);
    }

    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !by_gid.is_empty() {
            let mut widths = cid.widths();
            for (&gid, ch) in &by_gid {
                let w = face.glyphs.get(ch).map(|&(_, w)| w).unwrap_or(0.0);
                widths.consecutive(gid, [w]);
            }
        }
    }

    let cmap_name = format!("{}-UTF16", face.ps_name);
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&gid, &ch) in &by_gid {
        cmap.pair(gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);
}

/// Absolute path, then `dir`, then the platform font directories.
pub(crate) fn resolve_font_path(name: &str, dir: Option<&Path>) -> Option<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_absolute() {
        return direct.is_file().then_some(direct);
    }
    if let Some(dir) = dir {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if direct.is_file() {
        return Some(direct);
    }
    let file_name = direct.file_name()?.to_os_string();
    let mut stack = font_directories();
    let mut visited = BTreeSet::new();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
            } else if path.file_name() == Some(file_name.as_os_str()) {
                return Some(path);
            }
        }
        subdirs.sort();
        stack.extend(subdirs.into_iter().rev());
    }
    None
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("DOCWEAVE_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    // Searched last-in first-out.
    dirs.reverse();
    dirs
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007E => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// WinAnsi bytes for the built-in faces; unmappable chars become '?'.
fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match char_to_winansi(c) {
            0 => b'?',
            b => b,
        })
        .collect()
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi bytes 32..=255.
const HELVETICA_WIDTHS: [f32; 224] = {
    let mut table = [556.0f32; 224];
    let mut b = 32usize;
    while b <= 255 {
        table[b - 32] = match b as u8 {
            32 => 278.0,
            33..=47 => 333.0,
            48..=57 => 556.0,
            58..=64 => 333.0,
            73 | 74 => 278.0,
            77 => 833.0,
            65..=90 => 667.0,
            91..=96 => 333.0,
            102 | 105 | 106 | 108 | 116 => 278.0,
            109 | 119 => 833.0,
            97..=122 => 556.0,
            0x95 => 350.0,
            _ => 556.0,
        };
        b += 1;
    }
    table
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_order() {
        let only_regular = |r: FaceRole| r == FaceRole::Regular;
        assert_eq!(
            resolve_role(only_regular, Family::Main, Style::Bold),
            Some(FaceRole::Regular)
        );
        assert_eq!(
            resolve_role(only_regular, Family::Mono, Style::Regular),
            Some(FaceRole::Regular)
        );

        let regular_and_bold = |r: FaceRole| matches!(r, FaceRole::Regular | FaceRole::Bold);
        assert_eq!(
            resolve_role(regular_and_bold, Family::Mono, Style::Bold),
            Some(FaceRole::Bold)
        );

        let all = |_: FaceRole| true;
        assert_eq!(resolve_role(all, Family::Mono, Style::Italic), Some(FaceRole::Mono));
        assert_eq!(resolve_role(|_| false, Family::Main, Style::Italic), None);
    }

    #[test]
    fn empty_registry_uses_builtins() {
        let reg = FontRegistry::builtin_only();
        assert_eq!(
            reg.select(Family::Main, Style::Bold),
            FontId::Builtin(Family::Main, Style::Bold)
        );
        assert_eq!(
            reg.select(Family::Mono, Style::Regular),
            FontId::Builtin(Family::Mono, Style::Regular)
        );
    }

    #[test]
    fn missing_files_fall_back_without_error() {
        let paths = FontPaths {
            dir: Some(PathBuf::from("/definitely/not/here")),
            regular: Some("NoSuchFont-Regular.ttf".into()),
            bold: Some("NoSuchFont-Bold.ttf".into()),
            ..FontPaths::default()
        };
        let reg = FontRegistry::register(&paths);
        assert!(!reg.has_role(FaceRole::Regular));
        assert!(matches!(reg.select(Family::Main, Style::Bold), FontId::Builtin(..)));
    }

    #[test]
    fn builtin_metrics_and_encoding() {
        let reg = FontRegistry::builtin_only();
        let courier = FontId::Builtin(Family::Mono, Style::Regular);
        let w = reg.text_width(courier, "abcd", 10.0);
        assert!((w - 4.0 * 6.0 * PT_TO_MM).abs() < 1e-4);

        let helv = FontId::Builtin(Family::Main, Style::Regular);
        assert!(reg.text_width(helv, "W", 12.0) > reg.text_width(helv, "i", 12.0));
        assert_eq!(reg.encode(helv, "a€→"), vec![b'a', 0x80, b'?']);
    }

    #[test]
    fn resource_names_are_distinct() {
        let names: BTreeSet<String> = [
            FontId::Embedded(0),
            FontId::Embedded(1),
            FontId::Builtin(Family::Main, Style::Regular),
            FontId::Builtin(Family::Main, Style::Bold),
            FontId::Builtin(Family::Mono, Style::Regular),
        ]
        .into_iter()
        .map(FontId::resource_name)
        .collect();
        assert_eq!(names.len(), 5);
    }
}
