// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File format descriptors.
//!
//! A file group is either a single primary file accompanied by zero or more
//! auxiliary side cars (e.g., a NIfTI image with a JSON side car), or a whole
//! directory. The format descriptor states which, and which extensions to
//! expect. Nothing here looks inside the files themselves. Files are told
//! apart purely by extension.

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Extensions made of more than one suffix.
const MULTI_PART_EXTENSIONS: &[&str] = &[".nii.gz", ".tar.gz", ".mif.gz", ".fif.gz", ".BRIK.gz"];

/// Descriptor of a file group format.
///
/// # Invariant
///
/// - Name is lower case.
/// - Extension is only absent for directory formats.
/// - No side car shares the extension of the primary file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "RawFileFormat")]
pub struct FileFormat {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<String>,
    #[serde(default)]
    directory: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    aux_files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alternate_names: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
}

impl FileFormat {
    /// Construct single file format.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::Invalid`] if name is not lower case.
    pub fn file(name: impl Into<String>, extension: impl Into<String>) -> Result<Self> {
        Self {
            name: name.into(),
            extension: Some(extension.into()),
            directory: false,
            aux_files: BTreeMap::new(),
            alternate_names: Vec::new(),
            description: String::new(),
        }
        .validated()
    }

    /// Construct directory format.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::Invalid`] if name is not lower case.
    pub fn directory(name: impl Into<String>) -> Result<Self> {
        Self {
            name: name.into(),
            extension: None,
            directory: true,
            aux_files: BTreeMap::new(),
            alternate_names: Vec::new(),
            description: String::new(),
        }
        .validated()
    }

    /// Add side car with expected extension.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::Invalid`] if side car extension matches the
    ///   primary extension.
    pub fn with_aux(mut self, name: impl Into<String>, extension: impl Into<String>) -> Result<Self> {
        self.aux_files.insert(name.into(), extension.into());
        self.validated()
    }

    /// Add alternate name used by remote stores.
    pub fn with_alternate_name(mut self, name: impl Into<String>) -> Self {
        self.alternate_names.push(name.into());
        self
    }

    /// Set brief description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn validated(self) -> Result<Self> {
        let invalid = |reason: String| FormatError::Invalid {
            format: self.name.clone(),
            reason,
        };

        if self.name.chars().any(char::is_uppercase) {
            return Err(invalid("format names must be lower case".into()));
        }

        if self.extension.is_none() && !self.directory {
            return Err(invalid("only directory formats may omit an extension".into()));
        }

        if let Some((aux, _)) = self
            .aux_files
            .iter()
            .find(|(_, ext)| Some(ext.as_str()) == self.extension.as_deref())
        {
            return Err(invalid(format!(
                "side car {aux:?} cannot share the primary file extension"
            )));
        }

        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Side car names mapped to their extensions.
    pub fn aux_files(&self) -> &BTreeMap<String, String> {
        &self.aux_files
    }

    pub fn alternate_names(&self) -> &[String] {
        &self.alternate_names
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Check if name refers to this format, case-insensitively.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self
                .alternate_names
                .iter()
                .any(|alt| alt.eq_ignore_ascii_case(name))
    }

    /// Extension of a file as seen by this format.
    ///
    /// Declared extensions are matched first, longest wins, so multi-part
    /// side car extensions stay whole. Anything else falls back to
    /// [`split_extension`].
    pub fn extension_of(&self, path: impl AsRef<Path>) -> String {
        let name = path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        self.extension
            .iter()
            .chain(self.aux_files.values())
            .filter(|ext| !ext.is_empty() && name.len() > ext.len() && name.ends_with(&ext.to_lowercase()))
            .max_by_key(|ext| ext.len())
            .cloned()
            .unwrap_or_else(|| split_extension(path).1)
    }

    /// Assort candidate files into primary and side car roles by extension.
    ///
    /// Candidates that match neither are ignored.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::Assortment`] if zero or multiple candidates
    ///   match the primary extension, or a side car is missing or ambiguous.
    pub fn assort_files<P>(&self, candidates: impl IntoIterator<Item = P>) -> Result<AssortedFiles>
    where
        P: AsRef<Path>,
    {
        let candidates: Vec<PathBuf> = candidates
            .into_iter()
            .map(|path| path.as_ref().to_path_buf())
            .collect();
        let mut by_ext: HashMap<String, Vec<&PathBuf>> = HashMap::new();
        for path in &candidates {
            by_ext.entry(self.extension_of(path).to_lowercase()).or_default().push(path);
        }

        let listing = || {
            candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join("', '")
        };
        let assortment = |reason: String| FormatError::Assortment {
            format: self.name.clone(),
            reason,
        };

        let primary_ext = self.extension.as_deref().unwrap_or_default().to_lowercase();
        let primary = match by_ext.get(&primary_ext).map(Vec::as_slice) {
            None | Some([]) => {
                return Err(assortment(format!(
                    "no files match primary extension {primary_ext:?} out of '{}'",
                    listing()
                )))
            }
            Some([path]) => (*path).clone(),
            Some(paths) => {
                return Err(assortment(format!(
                    "multiple potential primary files '{}'",
                    join_paths(paths)
                )))
            }
        };

        let mut aux = BTreeMap::new();
        for (name, ext) in &self.aux_files {
            match by_ext.get(&ext.to_lowercase()).map(Vec::as_slice) {
                None | Some([]) => {
                    return Err(assortment(format!(
                        "no files match side car extension {ext:?} out of '{}'",
                        listing()
                    )))
                }
                Some([path]) => {
                    aux.insert(name.clone(), (*path).clone());
                }
                Some(paths) => {
                    return Err(assortment(format!(
                        "multiple potential files '{}' for side car {name:?}",
                        join_paths(paths)
                    )))
                }
            }
        }

        Ok(AssortedFiles { primary, aux })
    }
}

impl Display for FileFormat {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.name)
    }
}

/// Unvalidated format layout as read from configuration.
#[derive(Deserialize)]
struct RawFileFormat {
    name: String,
    extension: Option<String>,
    #[serde(default)]
    directory: bool,
    #[serde(default)]
    aux_files: BTreeMap<String, String>,
    #[serde(default)]
    alternate_names: Vec<String>,
    #[serde(default)]
    description: String,
}

impl TryFrom<RawFileFormat> for FileFormat {
    type Error = FormatError;

    fn try_from(raw: RawFileFormat) -> Result<Self> {
        FileFormat {
            name: raw.name,
            extension: raw.extension,
            directory: raw.directory,
            aux_files: raw.aux_files,
            alternate_names: raw.alternate_names,
            description: raw.description,
        }
        .validated()
    }
}

/// Primary file and side cars selected from a set of candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssortedFiles {
    pub primary: PathBuf,
    pub aux: BTreeMap<String, PathBuf>,
}

fn join_paths(paths: &[&PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("', '")
}

/// Split file name of path into stem and extension.
///
/// Known multi-part extensions like ".nii.gz" are kept whole. Otherwise only
/// the last suffix counts. Leading dots of hidden files are not extensions.
pub fn split_extension(path: impl AsRef<Path>) -> (String, String) {
    let name = path
        .as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    for ext in MULTI_PART_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(ext) {
            if !stem.is_empty() {
                return (stem.to_string(), ext.to_string());
            }
        }
    }

    match name.rfind('.') {
        Some(0) | None => (name, String::new()),
        Some(index) => (name[..index].to_string(), name[index..].to_string()),
    }
}

/// Common formats.
pub mod common {
    use super::FileFormat;
    use std::collections::BTreeMap;

    fn builtin(name: &str, extension: Option<&str>, aux: &[(&str, &str)], alternates: &[&str]) -> FileFormat {
        FileFormat {
            name: name.into(),
            extension: extension.map(Into::into),
            directory: extension.is_none(),
            aux_files: aux
                .iter()
                .map(|(name, ext)| (name.to_string(), ext.to_string()))
                .collect::<BTreeMap<_, _>>(),
            alternate_names: alternates.iter().map(ToString::to_string).collect(),
            description: String::new(),
        }
    }

    /// Plain text file.
    pub fn text() -> FileFormat {
        builtin("text", Some(".txt"), &[], &["txt"])
    }

    /// JSON document.
    pub fn json() -> FileFormat {
        builtin("json", Some(".json"), &[], &[])
    }

    /// Generic directory.
    pub fn directory() -> FileFormat {
        builtin("directory", None, &[], &[])
    }

    /// Gzipped NIfTI image.
    pub fn nifti_gz() -> FileFormat {
        builtin("nifti_gz", Some(".nii.gz"), &[], &["NIFTI"])
    }

    /// Gzipped NIfTI image with BIDS JSON side car.
    pub fn niftix_gz() -> FileFormat {
        builtin("niftix_gz", Some(".nii.gz"), &[("json", ".json")], &[])
    }

    /// Directory of DICOM files.
    pub fn dicom() -> FileFormat {
        builtin("dicom", None, &[], &["DICOM"])
    }

    /// All built-in formats.
    pub fn all() -> Vec<FileFormat> {
        vec![text(), json(), directory(), nifti_gz(), niftix_gz(), dicom()]
    }
}

/// Registry of converters between formats.
///
/// Kept apart from the descriptors so descriptors stay immutable values.
/// Components that need conversion lookup receive a registry explicitly.
#[derive(Debug, Clone)]
pub struct ConverterRegistry<C> {
    converters: HashMap<(FileFormat, FileFormat), C>,
}

impl<C> Default for ConverterRegistry<C> {
    fn default() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }
}

impl<C> ConverterRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register converter from `source` into `target`.
    ///
    /// Replaces any converter previously registered for the same pair.
    pub fn register(&mut self, source: FileFormat, target: FileFormat, converter: C) -> Option<C> {
        self.converters.insert((source, target), converter)
    }

    /// Look up how to get from `source` to `target`.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::NoConverter`] if no converter was registered.
    pub fn converter(&self, source: &FileFormat, target: &FileFormat) -> Result<Conversion<'_, C>> {
        if source == target {
            return Ok(Conversion::Identity);
        }

        self.converters
            .get(&(source.clone(), target.clone()))
            .map(Conversion::Convert)
            .ok_or_else(|| FormatError::NoConverter {
                source_format: source.name.clone(),
                target_format: target.name.clone(),
                available: self.describe(),
            })
    }

    /// Formats that can be converted into `target`.
    pub fn convertible_from<'a>(&'a self, target: &'a FileFormat) -> impl Iterator<Item = &'a FileFormat> {
        self.converters
            .keys()
            .filter(move |(_, to)| to == target)
            .map(|(from, _)| from)
    }

    fn describe(&self) -> String {
        let mut pairs: Vec<String> = self
            .converters
            .keys()
            .map(|(from, to)| format!("{to} <- {from}"))
            .collect();
        pairs.sort();
        pairs.join(", ")
    }
}

/// Outcome of a converter lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Conversion<'a, C> {
    /// Formats are identical.
    Identity,

    /// Registered converter.
    Convert(&'a C),
}

/// File format error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Format declaration violates an invariant.
    #[error("invalid format {format:?}: {reason}")]
    Invalid { format: String, reason: String },

    /// Candidate files cannot be assorted into primary and side cars.
    #[error("cannot assort files for format {format:?}: {reason}")]
    Assortment { format: String, reason: String },

    /// File group has no format assigned.
    #[error("format of {item} must be set before {action}")]
    Unassigned { item: String, action: &'static str },

    /// Side car name not declared by format.
    #[error("format {format:?} has no side car named {aux:?}")]
    UnknownAux { format: String, aux: String },

    /// No registered converter between two formats.
    #[error("no converter from {source_format} to {target_format} (available: {available})")]
    NoConverter {
        source_format: String,
        target_format: String,
        available: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FormatError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("file.nii.gz", "file", ".nii.gz"; "multi part")]
    #[test_case("dir/file.json", "file", ".json"; "single part")]
    #[test_case("sub.01.txt", "sub.01", ".txt"; "dotted stem")]
    #[test_case(".hidden", ".hidden", ""; "hidden file")]
    #[test_case("README", "README", ""; "no extension")]
    #[test]
    fn split_extensions(path: &str, stem: &str, ext: &str) {
        use pretty_assertions::assert_eq;
        assert_eq!(split_extension(path), (stem.to_string(), ext.to_string()));
    }

    #[test_case("notes.bval.txt", ".bval.txt"; "declared multi part")]
    #[test_case("notes.TXT", ".txt"; "declared primary")]
    #[test_case("notes.tar.gz", ".tar.gz"; "undeclared multi part")]
    #[test_case("notes.md", ".md"; "undeclared")]
    #[test_case(".bval.txt", ".txt"; "no stem")]
    #[test]
    fn declared_extensions_win(path: &str, expect: &str) {
        use pretty_assertions::assert_eq;
        let format = common::text().with_aux("bvals", ".bval.txt").unwrap();
        assert_eq!(format.extension_of(path), expect);
    }

    #[test]
    fn assort_multi_part_side_car() -> anyhow::Result<()> {
        let format = common::text().with_aux("bvals", ".bval.txt")?;
        let result = format.assort_files(["notes.bval.txt", "notes.txt"])?;
        let expect = AssortedFiles {
            primary: "notes.txt".into(),
            aux: BTreeMap::from([("bvals".to_string(), PathBuf::from("notes.bval.txt"))]),
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn assort_primary_and_side_car() -> anyhow::Result<()> {
        let result = common::niftix_gz().assort_files(["a/file.json", "a/file.nii.gz", "a/notes.md"])?;
        let expect = AssortedFiles {
            primary: "a/file.nii.gz".into(),
            aux: BTreeMap::from([("json".to_string(), PathBuf::from("a/file.json"))]),
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn assort_rejects_missing_or_ambiguous_files() {
        let format = common::niftix_gz();
        assert!(matches!(
            format.assort_files(["file.json"]),
            Err(FormatError::Assortment { .. })
        ));
        assert!(matches!(
            format.assort_files(["a.nii.gz", "b.nii.gz", "a.json"]),
            Err(FormatError::Assortment { .. })
        ));
        assert!(matches!(
            format.assort_files(["a.nii.gz"]),
            Err(FormatError::Assortment { .. })
        ));
        assert!(matches!(
            format.assort_files(["a.nii.gz", "a.json", "b.json"]),
            Err(FormatError::Assortment { .. })
        ));
    }

    #[test]
    fn assort_matches_extensions_case_insensitively() -> anyhow::Result<()> {
        let result = common::text().assort_files(["NOTES.TXT"])?;
        assert_eq!(result.primary, PathBuf::from("NOTES.TXT"));

        Ok(())
    }

    #[test]
    fn reject_invalid_declarations() {
        assert!(FileFormat::file("Text", ".txt").is_err());
        assert!(FileFormat::file("text", ".txt")
            .and_then(|format| format.with_aux("copy", ".txt"))
            .is_err());
        let raw = RawFileFormat {
            name: "broken".into(),
            extension: None,
            directory: false,
            aux_files: BTreeMap::new(),
            alternate_names: Vec::new(),
            description: String::new(),
        };
        assert!(FileFormat::try_from(raw).is_err());
    }

    #[test]
    fn format_names_and_alternates() {
        assert!(common::dicom().answers_to("DICOM"));
        assert!(common::nifti_gz().answers_to("nifti"));
        assert!(!common::text().answers_to("json"));
    }

    #[test]
    fn converter_lookup() {
        let mut registry = ConverterRegistry::new();
        registry.register(common::dicom(), common::nifti_gz(), "dcm2niix");

        assert_eq!(
            registry.converter(&common::dicom(), &common::nifti_gz()),
            Ok(Conversion::Convert(&"dcm2niix"))
        );
        assert_eq!(
            registry.converter(&common::text(), &common::text()),
            Ok(Conversion::Identity)
        );
        assert_eq!(
            registry.converter(&common::text(), &common::nifti_gz()),
            Err(FormatError::NoConverter {
                source_format: "text".into(),
                target_format: "nifti_gz".into(),
                available: "nifti_gz <- dicom".into(),
            })
        );
        let target = common::nifti_gz();
        let sources: Vec<_> = registry.convertible_from(&target).collect();
        assert_eq!(sources, vec![&common::dicom()]);
    }
}
