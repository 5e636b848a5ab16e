//! Uploaded files and normalization of raw upload specifications.
//!
//! # The parallel-array shape
//!
//! Servers describe a single upload as a flat record:
//!
//! ```text
//! avatar => { tmp_name: "/tmp/x", size: 10, error: 0, name: "a.png", type: "image/png" }
//! ```
//!
//! but a multi-file field such as `docs[]` is described *attribute first*,
//! with every attribute in its own container indexed in lockstep:
//!
//! ```text
//! docs => { tmp_name: { 0: "/tmp/a", 1: "/tmp/b" },
//!           size:     { 0: 10,       1: 20       },
//!           error:    { 0: 0,        1: 0        },
//!           name:     { 0: "a.txt",  1: "b.txt"  },
//!           type:     { 0: "text/plain", 1: "text/plain" } }
//! ```
//!
//! [`normalize`] turns both into the same tree, keyed the way the client
//! named its fields:
//!
//! ```text
//! avatar  => UploadedFile
//! docs    => { 0: UploadedFile, 1: UploadedFile }
//! ```

use std::collections::BTreeMap;

use crate::error::Error;

const TMP_NAME: &str = "tmp_name";
const SIZE: &str = "size";
const ERROR: &str = "error";
const NAME: &str = "name";
const TYPE: &str = "type";

// ── UploadError ───────────────────────────────────────────────────────────────

/// Upload status code reported by the server for one file.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UploadError {
    Ok,                // 0
    IniSize,           // 1  exceeds the server-wide size limit
    FormSize,          // 2  exceeds the form's declared size limit
    Partial,           // 3
    NoFile,            // 4
    NoTmpDir,          // 6
    CantWrite,         // 7
    Extension,         // 8  stopped by a server extension
    Unknown(i64),
}

impl UploadError {
    pub fn code(self) -> i64 {
        match self {
            Self::Ok         => 0,
            Self::IniSize    => 1,
            Self::FormSize   => 2,
            Self::Partial    => 3,
            Self::NoFile     => 4,
            Self::NoTmpDir   => 6,
            Self::CantWrite  => 7,
            Self::Extension  => 8,
            Self::Unknown(c) => c,
        }
    }
}

impl From<i64> for UploadError {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            c => Self::Unknown(c),
        }
    }
}

// ── UploadedFile ──────────────────────────────────────────────────────────────

/// One uploaded file, as the server stored it. This crate never opens or
/// moves the temporary file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadedFile {
    tmp_path: String,
    size: u64,
    error: UploadError,
    client_filename: Option<String>,
    client_media_type: Option<String>,
}

impl UploadedFile {
    pub fn new(
        tmp_path: impl Into<String>,
        size: u64,
        error: UploadError,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Self {
        Self {
            tmp_path: tmp_path.into(),
            size,
            error,
            client_filename,
            client_media_type,
        }
    }

    pub fn tmp_path(&self) -> &str { &self.tmp_path }
    pub fn size(&self) -> u64 { self.size }
    pub fn error(&self) -> UploadError { self.error }
    pub fn client_filename(&self) -> Option<&str> { self.client_filename.as_deref() }
    pub fn client_media_type(&self) -> Option<&str> { self.client_media_type.as_deref() }

    /// `true` when the server reports a complete upload.
    pub fn is_ok(&self) -> bool {
        self.error == UploadError::Ok
    }
}

// ── Normalized tree ───────────────────────────────────────────────────────────

/// A node of the normalized upload tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UploadNode {
    File(UploadedFile),
    Nested(UploadedFiles),
}

impl UploadNode {
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&UploadedFiles> {
        match self {
            Self::File(_) => None,
            Self::Nested(files) => Some(files),
        }
    }
}

/// Normalized uploads keyed by field name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UploadedFiles {
    nodes: BTreeMap<String, UploadNode>,
}

impl UploadedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: UploadNode) {
        self.nodes.insert(key.into(), node);
    }

    pub fn get(&self, key: &str) -> Option<&UploadNode> {
        self.nodes.get(key)
    }

    /// Shortcut for a file directly under `key`.
    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.get(key).and_then(UploadNode::as_file)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UploadNode)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Number of files in the whole tree.
    pub fn file_count(&self) -> usize {
        self.nodes
            .values()
            .map(|node| match node {
                UploadNode::File(_) => 1,
                UploadNode::Nested(files) => files.file_count(),
            })
            .sum()
    }
}

impl FromIterator<(String, UploadNode)> for UploadedFiles {
    fn from_iter<I: IntoIterator<Item = (String, UploadNode)>>(iter: I) -> Self {
        Self { nodes: iter.into_iter().collect() }
    }
}

// ── Raw specification ─────────────────────────────────────────────────────────

/// A loosely-typed upload specification, as a server hands it over.
#[derive(Clone, Debug, PartialEq)]
pub enum FileSpec {
    /// An already-normalized file; kept as-is.
    File(UploadedFile),
    Text(String),
    Number(i64),
    Bool(bool),
    Null,
    Map(FileSpecMap),
}

pub type FileSpecMap = BTreeMap<String, FileSpec>;

impl FileSpec {
    /// Builds a map node from `(key, value)` pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FileSpec>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&str> for FileSpec {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FileSpec {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for FileSpec {
    fn from(n: i64) -> Self { Self::Number(n) }
}

impl From<i32> for FileSpec {
    fn from(n: i32) -> Self { Self::Number(n.into()) }
}

impl From<bool> for FileSpec {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<UploadedFile> for FileSpec {
    fn from(f: UploadedFile) -> Self { Self::File(f) }
}

impl From<FileSpecMap> for FileSpec {
    fn from(m: FileSpecMap) -> Self { Self::Map(m) }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Normalizes a raw upload specification into an [`UploadedFiles`] tree.
///
/// Each value must be an [`UploadedFile`], a flat record carrying a scalar
/// `tmp_name`, a parallel-array record whose `tmp_name` is itself a map, or
/// a plain map of any of these. Anything else fails the whole call with
/// [`Error::InvalidSpec`]; no partial tree is returned.
///
/// ```rust
/// use cgi_request::upload::{self, FileSpec, FileSpecMap};
///
/// let spec: FileSpecMap = [(
///     "avatar".to_owned(),
///     FileSpec::map([
///         ("tmp_name", FileSpec::from("/tmp/php1")),
///         ("size", FileSpec::from(1024)),
///         ("error", FileSpec::from(0)),
///         ("name", FileSpec::from("me.png")),
///         ("type", FileSpec::from("image/png")),
///     ]),
/// )].into_iter().collect();
///
/// let files = upload::normalize(&spec)?;
/// assert_eq!(files.file("avatar").unwrap().size(), 1024);
/// # Ok::<(), cgi_request::Error>(())
/// ```
pub fn normalize(spec: &FileSpecMap) -> Result<UploadedFiles, Error> {
    normalize_map(spec, "")
}

fn normalize_map(spec: &FileSpecMap, parent: &str) -> Result<UploadedFiles, Error> {
    spec.iter()
        .map(|(key, value)| {
            let path = child_path(parent, key);
            let node = match value {
                FileSpec::File(file) => UploadNode::File(file.clone()),
                FileSpec::Map(map) if has_tmp_name(map) => from_record(map, &path)?,
                FileSpec::Map(map) => UploadNode::Nested(normalize_map(map, &path)?),
                other => {
                    return Err(Error::invalid_spec(&path, unexpected(other)));
                }
            };
            Ok((key.clone(), node))
        })
        .collect()
}

/// A record is either a flat leaf or a parallel-array bundle, depending on
/// the shape of its `tmp_name`.
fn from_record(record: &FileSpecMap, path: &str) -> Result<UploadNode, Error> {
    match record.get(TMP_NAME) {
        Some(FileSpec::Map(tmp_names)) => {
            let files = tmp_names
                .keys()
                .map(|key| {
                    let leaf = slice_record(record, key);
                    Ok((key.clone(), from_record(&leaf, &child_path(path, key))?))
                })
                .collect::<Result<UploadedFiles, Error>>()?;
            Ok(UploadNode::Nested(files))
        }
        Some(FileSpec::Text(tmp_path)) => Ok(UploadNode::File(flat_leaf(record, tmp_path, path)?)),
        Some(FileSpec::Number(n)) => Ok(UploadNode::File(flat_leaf(record, &n.to_string(), path)?)),
        _ => Err(Error::invalid_spec(path, "tmp_name must be text or a map")),
    }
}

/// Pulls `key` out of every attribute container, yielding a synthetic record
/// one level down.
fn slice_record(record: &FileSpecMap, key: &str) -> FileSpecMap {
    [TMP_NAME, SIZE, ERROR, NAME, TYPE]
        .into_iter()
        .filter_map(|field| match record.get(field) {
            Some(FileSpec::Map(values)) => values.get(key).map(|v| (field.to_owned(), v.clone())),
            _ => None,
        })
        .collect()
}

fn flat_leaf(record: &FileSpecMap, tmp_path: &str, path: &str) -> Result<UploadedFile, Error> {
    let size = number(record, SIZE, path)?;
    let size = u64::try_from(size).map_err(|_| Error::invalid_spec(path, "size must not be negative"))?;
    let error = number(record, ERROR, path)?;

    Ok(UploadedFile::new(
        tmp_path,
        size,
        UploadError::from(error),
        text(record, NAME, path)?,
        text(record, TYPE, path)?,
    ))
}

fn number(record: &FileSpecMap, field: &'static str, path: &str) -> Result<i64, Error> {
    match record.get(field) {
        Some(FileSpec::Number(n)) => Ok(*n),
        Some(FileSpec::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_spec(path, numeric_reason(field))),
        _ => Err(Error::invalid_spec(path, numeric_reason(field))),
    }
}

fn numeric_reason(field: &str) -> &'static str {
    if field == SIZE { "size must be a number" } else { "error must be a number" }
}

fn text(record: &FileSpecMap, field: &'static str, path: &str) -> Result<Option<String>, Error> {
    match record.get(field) {
        None | Some(FileSpec::Null) => Ok(None),
        Some(FileSpec::Text(s)) => Ok(Some(s.clone())),
        Some(_) if field == NAME => Err(Error::invalid_spec(path, "name must be text")),
        Some(_) => Err(Error::invalid_spec(path, "type must be text")),
    }
}

fn has_tmp_name(map: &FileSpecMap) -> bool {
    !matches!(map.get(TMP_NAME), None | Some(FileSpec::Null))
}

fn unexpected(value: &FileSpec) -> &'static str {
    match value {
        FileSpec::Text(_)   => "expected an upload record, found text",
        FileSpec::Number(_) => "expected an upload record, found a number",
        FileSpec::Bool(_)   => "expected an upload record, found a boolean",
        _                   => "expected an upload record, found null",
    }
}

/// `docs` + `0` → `docs[0]`.
fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() { key.to_owned() } else { format!("{parent}[{key}]") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tmp: &str, size: i64, name: &str) -> FileSpec {
        FileSpec::map([
            ("tmp_name", FileSpec::from(tmp)),
            ("size", FileSpec::from(size)),
            ("error", FileSpec::from(0)),
            ("name", FileSpec::from(name)),
            ("type", FileSpec::from("text/plain")),
        ])
    }

    fn spec(entries: Vec<(&str, FileSpec)>) -> FileSpecMap {
        entries.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
    }

    #[test]
    fn flat_leaf_becomes_a_file() {
        let files = normalize(&spec(vec![("avatar", leaf("/tmp/a", 10, "a.png"))])).unwrap();
        let file = files.file("avatar").unwrap();
        assert_eq!(file.tmp_path(), "/tmp/a");
        assert_eq!(file.size(), 10);
        assert!(file.is_ok());
        assert_eq!(file.client_filename(), Some("a.png"));
        assert_eq!(file.client_media_type(), Some("text/plain"));
    }

    #[test]
    fn existing_files_are_kept() {
        let file = UploadedFile::new("/tmp/z", 1, UploadError::Partial, None, None);
        let files = normalize(&spec(vec![("f", FileSpec::File(file.clone()))])).unwrap();
        assert_eq!(files.file("f"), Some(&file));
    }

    #[test]
    fn parallel_arrays_split_per_key() {
        let docs = FileSpec::map([
            ("tmp_name", FileSpec::map([("0", "/tmp/a"), ("1", "/tmp/b")])),
            ("size", FileSpec::map([("0", 10), ("1", 20)])),
            ("error", FileSpec::map([("0", 0), ("1", 4)])),
            ("name", FileSpec::map([("0", "a.txt"), ("1", "b.txt")])),
            ("type", FileSpec::map([("0", "text/plain"), ("1", "text/plain")])),
        ]);
        let files = normalize(&spec(vec![("docs", docs)])).unwrap();

        let docs = files.get("docs").and_then(UploadNode::as_nested).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs.file("0").unwrap().tmp_path(), "/tmp/a");
        assert_eq!(docs.file("1").unwrap().size(), 20);
        assert_eq!(docs.file("1").unwrap().error(), UploadError::NoFile);
        assert_eq!(files.file_count(), 2);
    }

    #[test]
    fn parallel_arrays_nest_two_levels() {
        let docs = FileSpec::map([
            ("tmp_name", FileSpec::map([("a", FileSpec::map([("0", "/tmp/a0"), ("1", "/tmp/a1")]))])),
            ("size", FileSpec::map([("a", FileSpec::map([("0", 1), ("1", 2)]))])),
            ("error", FileSpec::map([("a", FileSpec::map([("0", 0), ("1", 0)]))])),
            ("name", FileSpec::map([("a", FileSpec::map([("0", "x"), ("1", "y")]))])),
            ("type", FileSpec::map([("a", FileSpec::map([("0", "t"), ("1", "t")]))])),
        ]);
        let files = normalize(&spec(vec![("docs", docs)])).unwrap();

        let inner = files
            .get("docs").and_then(UploadNode::as_nested).unwrap()
            .get("a").and_then(UploadNode::as_nested).unwrap();
        assert_eq!(inner.file("0").unwrap().tmp_path(), "/tmp/a0");
        assert_eq!(inner.file("1").unwrap().client_filename(), Some("y"));
        assert_eq!(files.file_count(), 2);
    }

    #[test]
    fn plain_maps_are_walked() {
        let group = FileSpec::map([("first", leaf("/tmp/1", 1, "1")), ("second", leaf("/tmp/2", 2, "2"))]);
        let files = normalize(&spec(vec![("group", group)])).unwrap();
        let group = files.get("group").and_then(UploadNode::as_nested).unwrap();
        assert_eq!(group.file("second").unwrap().size(), 2);
    }

    #[test]
    fn numeric_text_and_missing_names_are_accepted() {
        let record = FileSpec::map([
            ("tmp_name", FileSpec::from("/tmp/a")),
            ("size", FileSpec::from("42")),
            ("error", FileSpec::from("0")),
            ("name", FileSpec::Null),
        ]);
        let files = normalize(&spec(vec![("f", record)])).unwrap();
        let file = files.file("f").unwrap();
        assert_eq!(file.size(), 42);
        assert_eq!(file.client_filename(), None);
        assert_eq!(file.client_media_type(), None);
    }

    #[test]
    fn boolean_tmp_name_is_rejected() {
        let record = FileSpec::map([
            ("tmp_name", FileSpec::from(true)),
            ("size", FileSpec::from(1)),
            ("error", FileSpec::from(0)),
        ]);
        let err = normalize(&spec(vec![("f", record)])).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { ref path, .. } if path == "f"));
    }

    #[test]
    fn scalar_at_field_level_is_rejected() {
        let err = normalize(&spec(vec![("ok", leaf("/tmp/a", 1, "a")), ("bad", FileSpec::from("x"))]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { ref path, .. } if path == "bad"));
    }

    #[test]
    fn bad_nested_slot_reports_its_path() {
        let docs = FileSpec::map([
            ("tmp_name", FileSpec::map([("0", FileSpec::from("/tmp/a")), ("1", FileSpec::from(false))])),
            ("size", FileSpec::map([("0", 1), ("1", 1)])),
            ("error", FileSpec::map([("0", 0), ("1", 0)])),
        ]);
        let err = normalize(&spec(vec![("docs", docs)])).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { ref path, .. } if path == "docs[1]"));
    }

    #[test]
    fn missing_size_is_rejected() {
        let record = FileSpec::map([("tmp_name", FileSpec::from("/tmp/a")), ("error", FileSpec::from(0))]);
        assert!(normalize(&spec(vec![("f", record)])).is_err());
    }

    #[test]
    fn upload_error_codes_round_trip() {
        for code in [0_i64, 1, 2, 3, 4, 6, 7, 8, 5, 99] {
            assert_eq!(UploadError::from(code).code(), code);
        }
        assert_eq!(UploadError::from(5_i64), UploadError::Unknown(5));
    }
}
