/// Template sets and the asset provider they are loaded through
///
/// Templates are decoded and converted to grayscale once at startup and are
/// immutable afterwards, so a library can be shared between detectors behind
/// an `Arc` without locking.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use tracing::{debug, info};

use super::language::Language;
use crate::error::TemplateError;
use crate::vision::to_grayscale;

/// One reference image for one symbol
#[derive(Debug, Clone)]
pub struct Template {
    pub label: String,
    pub gray: GrayImage,
}

impl Template {
    pub fn new(label: impl Into<String>, image: &RgbaImage) -> Self {
        Self::from_gray(label, to_grayscale(image))
    }

    pub fn from_gray(label: impl Into<String>, gray: GrayImage) -> Self {
        Self {
            label: label.into(),
            gray,
        }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

/// One template per candidate value for a single language.
///
/// The containment chain lists members whose pixels sit inside longer ones,
/// shortest first ("I" inside "II", "II" inside "III"). Chain members get a
/// stricter lead requirement during disambiguation.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    language: Language,
    templates: Vec<Template>,
    containment: Vec<usize>,
}

impl TemplateSet {
    pub fn new(language: Language, templates: Vec<Template>) -> Result<Self, TemplateError> {
        if templates.is_empty() {
            return Err(TemplateError::EmptySet(language));
        }
        Ok(Self {
            language,
            templates,
            containment: Vec::new(),
        })
    }

    /// Mark the member at `index` as the only superset symbol
    pub fn with_superset(self, index: usize) -> Result<Self, TemplateError> {
        self.with_containment(vec![index])
    }

    /// Set the containment chain, shortest member first
    pub fn with_containment(mut self, chain: Vec<usize>) -> Result<Self, TemplateError> {
        let len = self.templates.len();
        for (pos, &index) in chain.iter().enumerate() {
            if index >= len || chain[..pos].contains(&index) {
                return Err(TemplateError::InvalidSuperset { index, len });
            }
        }
        self.containment = chain;
        Ok(self)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Shortest member of the containment chain
    pub fn superset(&self) -> Option<usize> {
        self.containment.first().copied()
    }

    pub fn containment(&self) -> &[usize] {
        &self.containment
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, index: usize) -> Option<&Template> {
        self.templates.get(index)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Largest template width and height in the set
    pub fn max_size(&self) -> (u32, u32) {
        self.templates.iter().fold((0, 0), |(w, h), t| {
            (w.max(t.width()), h.max(t.height()))
        })
    }
}

/// Source of decoded template images (path → image)
pub trait AssetProvider {
    fn load(&self, path: &Path) -> Result<RgbaImage, TemplateError>;
}

/// Loads template images from the filesystem with `image::open`
#[derive(Debug, Clone, Default)]
pub struct FsAssetProvider {
    root: PathBuf,
}

impl FsAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetProvider for FsAssetProvider {
    fn load(&self, path: &Path) -> Result<RgbaImage, TemplateError> {
        let full = self.root.join(path);
        image::open(&full)
            .map(|img| img.to_rgba8())
            .map_err(|e| TemplateError::LoadFailed {
                path: full.display().to_string(),
                source: Box::new(e),
            })
    }
}

/// File name of template `n` (1-based) for a language: `<code>_<n>.png`
pub fn template_file_name(language: Language, n: usize) -> String {
    format!("{}_{}.png", language.code(), n)
}

/// Template sets for every loaded language
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    sets: HashMap<Language, Arc<TemplateSet>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `count` templates per language through `provider`.
    ///
    /// Templates are ordered shortest symbol first, and every member but the
    /// last is contained in the ones after it. Any missing file fails the
    /// whole load.
    pub fn load(
        provider: &dyn AssetProvider,
        languages: &[Language],
        count: usize,
    ) -> Result<Self, TemplateError> {
        let mut library = Self::new();
        for &language in languages {
            let mut templates = Vec::with_capacity(count);
            for n in 1..=count {
                let name = template_file_name(language, n);
                let image = provider.load(Path::new(&name))?;
                debug!("Loaded template {} ({}x{})", name, image.width(), image.height());
                templates.push(Template::new(format!("{}_{}", language.code(), n), &image));
            }
            let chain = (0..count.saturating_sub(1)).collect();
            library.insert(TemplateSet::new(language, templates)?.with_containment(chain)?);
        }
        info!(
            "Template library loaded: {} language(s), {} template(s) each",
            library.sets.len(),
            count
        );
        Ok(library)
    }

    pub fn insert(&mut self, set: TemplateSet) {
        self.sets.insert(set.language(), Arc::new(set));
    }

    pub fn get(&self, language: Language) -> Result<Arc<TemplateSet>, TemplateError> {
        self.sets
            .get(&language)
            .cloned()
            .ok_or(TemplateError::MissingLanguage(language))
    }

    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.sets.keys().copied().collect();
        languages.sort();
        languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct MemoryProvider;

    impl AssetProvider for MemoryProvider {
        fn load(&self, path: &Path) -> Result<RgbaImage, TemplateError> {
            let name = path.to_string_lossy();
            if name.starts_with("jp_") {
                return Err(TemplateError::LoadFailed {
                    path: name.to_string(),
                    source: "missing".into(),
                });
            }
            let n: u32 = name
                .trim_end_matches(".png")
                .rsplit('_')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            Ok(RgbaImage::from_pixel(10 * n, 8, Rgba([200, 200, 200, 255])))
        }
    }

    fn solid(label: &str, width: u32) -> Template {
        Template::from_gray(label, GrayImage::new(width, 5))
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            TemplateSet::new(Language::English, vec![]),
            Err(TemplateError::EmptySet(Language::English))
        ));
    }

    #[test]
    fn test_superset_index_checked() {
        let set = TemplateSet::new(Language::English, vec![solid("a", 3)]).unwrap();
        assert!(matches!(
            set.with_superset(1),
            Err(TemplateError::InvalidSuperset { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_containment_chain_checked() {
        let set = TemplateSet::new(
            Language::English,
            vec![solid("a", 3), solid("b", 6), solid("c", 9)],
        )
        .unwrap();
        assert!(matches!(
            set.clone().with_containment(vec![0, 0]),
            Err(TemplateError::InvalidSuperset { index: 0, len: 3 })
        ));
        assert!(matches!(
            set.clone().with_containment(vec![0, 3]),
            Err(TemplateError::InvalidSuperset { index: 3, len: 3 })
        ));

        let set = set.with_containment(vec![0, 1]).unwrap();
        assert_eq!(set.containment(), &[0, 1]);
        assert_eq!(set.superset(), Some(0));
    }

    #[test]
    fn test_max_size() {
        let set = TemplateSet::new(
            Language::English,
            vec![solid("a", 3), solid("b", 12), solid("c", 7)],
        )
        .unwrap();
        assert_eq!(set.max_size(), (12, 5));
        assert_eq!(set.superset(), None);
        assert!(set.containment().is_empty());
    }

    #[test]
    fn test_template_file_name() {
        assert_eq!(template_file_name(Language::English, 1), "eng_1.png");
        assert_eq!(template_file_name(Language::TraditionalChinese, 3), "cht_3.png");
    }

    #[test]
    fn test_library_load() {
        let library = TemplateLibrary::load(
            &MemoryProvider,
            &[Language::English, Language::SimplifiedChinese],
            3,
        )
        .unwrap();

        assert_eq!(
            library.languages(),
            vec![Language::English, Language::SimplifiedChinese]
        );
        let set = library.get(Language::English).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.superset(), Some(0));
        assert_eq!(set.containment(), &[0, 1]);
        assert_eq!(set.get(2).unwrap().label, "eng_3");
        assert_eq!(set.get(2).unwrap().width(), 30);

        assert!(matches!(
            library.get(Language::Japanese),
            Err(TemplateError::MissingLanguage(Language::Japanese))
        ));
    }

    #[test]
    fn test_library_load_fails_on_missing_asset() {
        let result = TemplateLibrary::load(&MemoryProvider, &[Language::Japanese], 3);
        assert!(matches!(result, Err(TemplateError::LoadFailed { .. })));
    }
}
