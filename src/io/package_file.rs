//=========================================================================
// Package File
//=========================================================================
//
// Read-only index of a package: many files stored back to back in one
// file, looked up by name.
//
// Layout (little-endian):
//   "UPAK"                      4-byte id
//   u32 file count
//   u32 package checksum
//   per entry:
//     name                      NUL-terminated UTF-8
//     u32 offset, u32 size, u32 checksum
//
// Only the entry table is read. File contents stay on disk and are
// addressed by (offset, size).
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use log::{info, warn};
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::context::Context;
use crate::core::{Object, ObjectBase, ObjectType, TypeKey};

//=== Constants ===========================================================

const PACKAGE_ID: [u8; 4] = *b"UPAK";

//=== Errors ==============================================================

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid package id: {0:?}")]
    InvalidId([u8; 4]),

    #[error("Truncated package while reading {0}")]
    Truncated(&'static str),

    #[error("Entry {name} out of bounds: offset {offset} + size {size} exceeds package size {total_size}")]
    EntryOutOfBounds {
        name: String,
        offset: u32,
        size: u32,
        total_size: u64,
    },

    #[error("Entry name is not valid UTF-8: {0}")]
    InvalidName(#[from] std::string::FromUtf8Error),
}

pub type PackageResult<T> = Result<T, PackageError>;

//=== PackageEntry ========================================================

/// Location of one file inside a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageEntry {
    pub offset: u32,
    pub size: u32,
    pub checksum: u32,
}

//=== PackageFile =========================================================

#[derive(Debug, Default)]
struct PackageTable {
    entries: BTreeMap<String, PackageEntry>,
    name: String,
    name_hash: TypeKey,
    total_size: u64,
    checksum: u32,
}

/// Entry table of a package, as a runtime object.
///
/// Can be registered as a factory product or a subsystem like any other
/// object. An instance starts empty until a package is loaded into it.
///
/// ```rust
/// use aetheric_runtime::prelude::*;
///
/// let mut bytes = Vec::new();
/// bytes.extend_from_slice(b"UPAK");
/// bytes.extend_from_slice(&1u32.to_le_bytes());
/// bytes.extend_from_slice(&0u32.to_le_bytes());
/// bytes.extend_from_slice(b"readme.txt\0");
/// for field in [0u32, 4, 0] {
///     bytes.extend_from_slice(&field.to_le_bytes());
/// }
/// bytes.extend_from_slice(b"hey!");
///
/// let context = Context::new();
/// let total = bytes.len() as u64;
/// let package = PackageFile::from_reader(&context, "demo.pak", bytes.as_slice(), total).unwrap();
/// assert!(package.exists("readme.txt"));
/// ```
#[derive(Debug)]
pub struct PackageFile {
    base: ObjectBase,
    table: RefCell<PackageTable>,
}

impl ObjectType for PackageFile {
    const TYPE_NAME: &'static str = "PackageFile";
}

impl Object for PackageFile {
    fn base(&self) -> &ObjectBase {
        &self.base
    }
}

impl PackageFile {
    //--- Construction -----------------------------------------------------

    /// Creates an empty package object with no entries.
    pub fn new(context: &Context) -> Self {
        Self {
            base: ObjectBase::new::<PackageFile>(context),
            table: RefCell::new(PackageTable::default()),
        }
    }

    /// Creates a package object and loads the package at `path`.
    pub fn open(context: &Context, path: impl AsRef<Path>) -> PackageResult<Self> {
        let package = Self::new(context);
        package.load(path)?;
        Ok(package)
    }

    /// Creates a package object and loads its entry table from `reader`.
    pub fn from_reader<R: Read>(
        context: &Context,
        name: impl Into<String>,
        reader: R,
        total_size: u64,
    ) -> PackageResult<Self> {
        let package = Self::new(context);
        package.load_from_reader(name, reader, total_size)?;
        Ok(package)
    }

    //--- Loading ----------------------------------------------------------

    /// Loads the package at `path`, sized from the file metadata.
    ///
    /// On error the previously loaded table is kept.
    pub fn load(&self, path: impl AsRef<Path>) -> PackageResult<()> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let total_size = file.metadata()?.len();

        self.load_from_reader(path.to_string_lossy(), BufReader::new(file), total_size)
    }

    /// Reads an entry table from `reader`, replacing the current one.
    ///
    /// `total_size` is the size of the whole package, used to reject
    /// entries that point past its end. On error the previously loaded
    /// table is kept.
    pub fn load_from_reader<R: Read>(
        &self,
        name: impl Into<String>,
        reader: R,
        total_size: u64,
    ) -> PackageResult<()> {
        let table = read_table(name.into(), reader, total_size)?;
        *self.table.borrow_mut() = table;
        Ok(())
    }

    //--- Queries ----------------------------------------------------------

    /// Whether the package contains `file_name`.
    pub fn exists(&self, file_name: &str) -> bool {
        self.table.borrow().entries.contains_key(file_name)
    }

    /// Location of `file_name`, or `None` if the package lacks it.
    pub fn entry(&self, file_name: &str) -> Option<PackageEntry> {
        self.table.borrow().entries.get(file_name).copied()
    }

    /// All entries, ordered by file name.
    pub fn entries(&self) -> Ref<'_, BTreeMap<String, PackageEntry>> {
        Ref::map(self.table.borrow(), |table| &table.entries)
    }

    /// Name the package was loaded under; empty before the first load.
    pub fn name(&self) -> Ref<'_, str> {
        Ref::map(self.table.borrow(), |table| table.name.as_str())
    }

    /// Hash of [`PackageFile::name`].
    pub fn name_hash(&self) -> TypeKey {
        self.table.borrow().name_hash
    }

    /// Number of files in the package.
    pub fn num_files(&self) -> usize {
        self.table.borrow().entries.len()
    }

    /// Size in bytes of the whole package.
    pub fn total_size(&self) -> u64 {
        self.table.borrow().total_size
    }

    /// Checksum of the package contents, as recorded in its header.
    pub fn checksum(&self) -> u32 {
        self.table.borrow().checksum
    }
}

//=== Readers =============================================================

fn read_table<R: Read>(name: String, mut reader: R, total_size: u64) -> PackageResult<PackageTable> {
    let mut id = [0u8; 4];
    read_exact(&mut reader, &mut id, "package id")?;
    if id != PACKAGE_ID {
        return Err(PackageError::InvalidId(id));
    }

    let num_files = read_u32(&mut reader, "file count")?;
    let checksum = read_u32(&mut reader, "package checksum")?;

    let mut entries = BTreeMap::new();
    for _ in 0..num_files {
        let entry_name = read_name(&mut reader)?;
        let entry = PackageEntry {
            offset: read_u32(&mut reader, "entry offset")?,
            size: read_u32(&mut reader, "entry size")?,
            checksum: read_u32(&mut reader, "entry checksum")?,
        };

        if u64::from(entry.offset) + u64::from(entry.size) > total_size {
            return Err(PackageError::EntryOutOfBounds {
                name: entry_name,
                offset: entry.offset,
                size: entry.size,
                total_size,
            });
        }

        if entries.insert(entry_name, entry).is_some() {
            warn!("Package {} lists a file twice, keeping the later entry", name);
        }
    }

    info!("Opened package {} ({} files, {} bytes)", name, entries.len(), total_size);

    Ok(PackageTable {
        name_hash: TypeKey::new(&name),
        entries,
        name,
        total_size,
        checksum,
    })
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> PackageResult<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => PackageError::Truncated(what),
        _ => PackageError::Io(err),
    })
}

fn read_u32<R: Read>(reader: &mut R, what: &'static str) -> PackageResult<u32> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes, what)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_name<R: Read>(reader: &mut R) -> PackageResult<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        read_exact(reader, &mut byte, "entry name")?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(String::from_utf8(bytes)?)
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    //--- Helpers ----------------------------------------------------------

    struct PackageBuilder {
        checksum: u32,
        entries: Vec<(Vec<u8>, u32, u32, u32)>,
    }

    impl PackageBuilder {
        fn new(checksum: u32) -> Self {
            Self { checksum, entries: Vec::new() }
        }

        fn entry(mut self, name: &str, offset: u32, size: u32, checksum: u32) -> Self {
            self.entries.push((name.as_bytes().to_vec(), offset, size, checksum));
            self
        }

        fn raw_entry(mut self, name: &[u8], offset: u32, size: u32) -> Self {
            self.entries.push((name.to_vec(), offset, size, 0));
            self
        }

        fn build(&self) -> Vec<u8> {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(b"UPAK");
            bytes.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&self.checksum.to_le_bytes());
            for (name, offset, size, checksum) in &self.entries {
                bytes.extend_from_slice(name);
                bytes.push(0);
                bytes.extend_from_slice(&offset.to_le_bytes());
                bytes.extend_from_slice(&size.to_le_bytes());
                bytes.extend_from_slice(&checksum.to_le_bytes());
            }
            bytes
        }
    }

    fn read(bytes: &[u8], total_size: u64) -> PackageResult<PackageFile> {
        let context = Context::new();
        PackageFile::from_reader(&context, "test.pak", Cursor::new(bytes), total_size)
    }

    //--- Tests ------------------------------------------------------------

    #[test]
    fn reads_entry_table() {
        let bytes = PackageBuilder::new(0xDEAD_BEEF)
            .entry("Textures/Stone.png", 100, 50, 7)
            .entry("Data/Level.xml", 150, 20, 9)
            .build();

        let package = read(&bytes, 170).expect("valid package");

        assert_eq!(&*package.name(), "test.pak");
        assert_eq!(package.name_hash(), TypeKey::new("TEST.PAK"));
        assert_eq!(package.num_files(), 2);
        assert_eq!(package.total_size(), 170);
        assert_eq!(package.checksum(), 0xDEAD_BEEF);

        assert!(package.exists("Data/Level.xml"));
        assert!(!package.exists("Data/Missing.xml"));
        assert_eq!(
            package.entry("Textures/Stone.png"),
            Some(PackageEntry { offset: 100, size: 50, checksum: 7 })
        );

        let names: Vec<String> = package.entries().keys().cloned().collect();
        assert_eq!(names, ["Data/Level.xml", "Textures/Stone.png"]);
    }

    #[test]
    fn empty_package_is_valid() {
        let bytes = PackageBuilder::new(0).build();
        let package = read(&bytes, bytes.len() as u64).expect("valid package");
        assert_eq!(package.num_files(), 0);
        assert!(package.entry("anything").is_none());
    }

    #[test]
    fn entry_ending_at_package_end_is_accepted() {
        let bytes = PackageBuilder::new(0).entry("tail.bin", 90, 10, 0).build();
        assert!(read(&bytes, 100).is_ok());
    }

    #[test]
    fn later_duplicate_entry_wins() {
        let bytes = PackageBuilder::new(0)
            .entry("a.txt", 0, 1, 1)
            .entry("a.txt", 10, 2, 2)
            .build();

        let package = read(&bytes, 100).expect("valid package");
        assert_eq!(package.num_files(), 1);
        assert_eq!(package.entry("a.txt").map(|e| e.offset), Some(10));
    }

    #[test]
    fn rejects_wrong_id() {
        let mut bytes = PackageBuilder::new(0).build();
        bytes[..4].copy_from_slice(b"ZPAK");

        let err = read(&bytes, 100).unwrap_err();
        assert!(matches!(err, PackageError::InvalidId(id) if &id == b"ZPAK"));
    }

    #[test]
    fn rejects_truncated_header() {
        let err = read(b"UPAK\x01\x00", 100).unwrap_err();
        assert!(matches!(err, PackageError::Truncated("file count")));

        let err = read(b"UP", 100).unwrap_err();
        assert!(matches!(err, PackageError::Truncated("package id")));
    }

    #[test]
    fn rejects_truncated_entry() {
        let mut bytes = PackageBuilder::new(0).entry("a.txt", 0, 1, 0).build();
        bytes.truncate(bytes.len() - 2);
        let err = read(&bytes, 100).unwrap_err();
        assert!(matches!(err, PackageError::Truncated("entry checksum")));

        // Name without its terminator.
        let mut bytes = PackageBuilder::new(0).build();
        bytes[4] = 1;
        bytes.extend_from_slice(b"unterminated");
        let err = read(&bytes, 100).unwrap_err();
        assert!(matches!(err, PackageError::Truncated("entry name")));
    }

    #[test]
    fn rejects_entry_past_end() {
        let bytes = PackageBuilder::new(0).entry("big.bin", 90, 11, 0).build();

        let err = read(&bytes, 100).unwrap_err();
        match err {
            PackageError::EntryOutOfBounds { name, offset, size, total_size } => {
                assert_eq!(name, "big.bin");
                assert_eq!((offset, size, total_size), (90, 11, 100));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bounds_check_does_not_overflow() {
        let bytes = PackageBuilder::new(0).entry("wrap.bin", u32::MAX, 2, 0).build();
        assert!(matches!(
            read(&bytes, u64::from(u32::MAX)).unwrap_err(),
            PackageError::EntryOutOfBounds { .. }
        ));
    }

    #[test]
    fn rejects_non_utf8_name() {
        let bytes = PackageBuilder::new(0).raw_entry(&[0xFF, 0xFE], 0, 0).build();
        assert!(matches!(read(&bytes, 100).unwrap_err(), PackageError::InvalidName(_)));
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let context = Context::new();
        let err = PackageFile::open(&context, "/nonexistent/dir/missing.pak").unwrap_err();
        assert!(matches!(err, PackageError::Io(_)));
    }

    #[test]
    fn open_reads_from_disk() {
        let bytes = PackageBuilder::new(42).entry("a.txt", 0, 4, 0).build();
        let path = std::env::temp_dir().join(format!("aetheric_package_{}.pak", std::process::id()));
        std::fs::write(&path, &bytes).expect("write temp package");

        let context = Context::new();
        let result = PackageFile::open(&context, &path);
        let _ = std::fs::remove_file(&path);

        let package = result.expect("valid package");
        assert_eq!(package.checksum(), 42);
        assert_eq!(package.total_size(), bytes.len() as u64);
        assert!(package.exists("a.txt"));
    }

    #[test]
    fn new_package_is_empty() {
        let context = Context::new();
        let package = PackageFile::new(&context);

        assert_eq!(package.type_name(), "PackageFile");
        assert_eq!(package.num_files(), 0);
        assert!(package.name().is_empty());
        assert!(package.name_hash().is_zero());
    }

    #[test]
    fn failed_load_keeps_previous_table() {
        let context = Context::new();
        let bytes = PackageBuilder::new(7).entry("a.txt", 0, 1, 0).build();
        let package = PackageFile::from_reader(&context, "first.pak", Cursor::new(&bytes), 100)
            .expect("valid package");

        let err = package.load_from_reader("broken.pak", Cursor::new(b"NOPE"), 4);
        assert!(matches!(err, Err(PackageError::InvalidId(_))));
        assert_eq!(&*package.name(), "first.pak");
        assert!(package.exists("a.txt"));

        let replacement = PackageBuilder::new(8).entry("b.txt", 0, 1, 0).build();
        package
            .load_from_reader("second.pak", Cursor::new(&replacement), 100)
            .expect("valid package");
        assert_eq!(&*package.name(), "second.pak");
        assert!(!package.exists("a.txt"));
        assert!(package.exists("b.txt"));
        assert_eq!(package.checksum(), 8);
    }

    #[test]
    fn created_through_factory_and_registered_as_subsystem() {
        let context = Context::new();
        context.register_factory_for::<PackageFile>(PackageFile::new);

        let package = context.create::<PackageFile>().expect("factory registered");
        let bytes = PackageBuilder::new(0).entry("data.bin", 0, 8, 0).build();
        package
            .load_from_reader("data.pak", Cursor::new(&bytes), 64)
            .expect("valid package");

        context.register_subsystem(package.clone());
        let found = context.subsystem::<PackageFile>().expect("registered");
        assert_eq!(found.id(), package.id());
        assert!(found.exists("data.bin"));
    }
}
