//! Merging content files in load order.
//!
//! An [Overlay] walks several [RecordReader]s as if they were one stream. A
//! record identified by the same [RecordKey] in a later file replaces the
//! version from an earlier file, and a later record carrying the
//! [blocked](crate::RecordFlags::BLOCKED) flag deletes it.
//!
//! ```rust
//! use esmcodec::{FileHeader, Name, Overlay, OverlayEntry, RecordFlags, RecordReader, RecordWriter};
//!
//! let npc = Name::new(*b"NPC_");
//! let name = Name::new(*b"NAME");
//!
//! let mut base = RecordWriter::new(Vec::new());
//! base.write_file_header(&FileHeader::default())?;
//! base.start_record(npc, RecordFlags::NONE)?;
//! base.write_hn_cstring(name, "guard01")?;
//! base.end_record()?;
//! let base = base.into_inner();
//!
//! let mut patch = RecordWriter::new(Vec::new());
//! patch.write_file_header(&FileHeader::default().with_master("base.dat", 0))?;
//! patch.start_record(npc, RecordFlags::BLOCKED)?;
//! patch.write_hn_cstring(name, "guard01")?;
//! patch.end_record()?;
//! let patch = patch.into_inner();
//!
//! let readers = vec![
//!     RecordReader::from_slice("base.dat", &base)?,
//!     RecordReader::from_slice("patch.dat", &patch)?,
//! ];
//! let mut overlay = Overlay::new(readers)?;
//! match overlay.next_logical_record()? {
//!     Some(OverlayEntry::Removed(tombstone)) => assert_eq!(tombstone.file_index, 1),
//!     _ => panic!("expected guard01 to be removed"),
//! }
//! assert!(overlay.next_logical_record()?.is_none());
//! # Ok::<(), esmcodec::Error>(())
//! ```

mod dependency;
mod key;
mod ownership;

pub use self::dependency::DependencyPolicy;
pub use self::key::{IdSubrecord, KeyExtractor, RecordKey};

use self::dependency::resolve_parents;
use self::ownership::Ownership;
use crate::{
    errors::{FormatError, FormatErrorKind},
    Encoding, Error, RecordHeader, RecordReader, Windows1252Encoding,
};
use log::{debug, trace};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// A record surfaced by the overlay
#[derive(Debug)]
pub struct OverlayRecord<'a, R, E> {
    /// Load order index of the file the record comes from
    pub file_index: usize,

    /// The record's header
    pub header: RecordHeader,

    /// The record's key, if it has one
    pub key: Option<RecordKey>,

    /// The reader of the originating file, positioned at the record's first
    /// subrecord
    pub reader: &'a mut RecordReader<R, E>,
}

/// A record deleted by a later file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    /// The key that is no longer present
    pub key: RecordKey,

    /// Load order index of the file that deleted the record
    pub file_index: usize,

    /// Header of the deleting record
    pub header: RecordHeader,
}

/// An item of the merged record stream
#[derive(Debug)]
pub enum OverlayEntry<'a, R, E> {
    /// A record that is visible in the merged view
    Record(OverlayRecord<'a, R, E>),

    /// A record that callers should remove if they loaded it before
    Removed(Tombstone),
}

#[derive(Debug, Clone, Copy, Default)]
struct StreamCursor {
    file: usize,
    entry: usize,
}

/// A single logical record stream over content files in load order
///
/// Streaming proceeds file by file, preserving each file's record order, and
/// skips every record whose key is owned by a later file (or a later
/// duplicate within the same file). The ownership map is built once, when
/// the overlay is created, and rebuilt only after the file list changes.
#[derive(Debug)]
pub struct Overlay<R, E = Windows1252Encoding, K = IdSubrecord> {
    readers: Vec<RecordReader<R, E>>,
    extractor: K,
    policy: DependencyPolicy,
    ownership: Option<Ownership>,
    cursor: StreamCursor,
}

impl<R, E> Overlay<R, E>
where
    R: Read + Seek,
    E: Encoding,
{
    /// Merge readers given in load order, keying records by their `NAME`
    /// subrecord
    pub fn new(readers: Vec<RecordReader<R, E>>) -> Result<Self, Error> {
        OverlayBuilder::new().build(readers, IdSubrecord::new())
    }
}

impl Overlay<(), (), ()> {
    /// Initializes a default [OverlayBuilder]
    pub fn builder() -> OverlayBuilder {
        OverlayBuilder::new()
    }
}

impl<R, E, K> Overlay<R, E, K>
where
    R: Read + Seek,
    E: Encoding,
    K: KeyExtractor<R, E>,
{
    /// Pull the next record of the merged stream
    ///
    /// Returns `None` once every file is exhausted.
    pub fn next_logical_record(&mut self) -> Result<Option<OverlayEntry<'_, R, E>>, Error> {
        let Overlay {
            readers,
            extractor,
            ownership,
            cursor,
            ..
        } = self;
        let ownership = resolve(readers, extractor, ownership, cursor)?;

        loop {
            let Some(entries) = ownership.entries.get(cursor.file) else {
                return Ok(None);
            };

            let Some(scanned) = entries.get(cursor.entry) else {
                cursor.file += 1;
                cursor.entry = 0;
                continue;
            };

            let (file, entry) = (cursor.file, cursor.entry);
            cursor.entry += 1;
            if !ownership.is_visible(file, entry) {
                continue;
            }

            let reader = &mut readers[file];
            reader.seek_record(scanned.position)?;
            let header = reader.next_record_header()?.ok_or_else(|| {
                Error::from(FormatError::new(FormatErrorKind::Eof, scanned.position.offset))
            })?;

            if let (true, Some(key)) = (header.flags.is_blocked(), scanned.key.as_ref()) {
                reader.skip_record()?;
                trace!("{} removed by {}", key, reader.name());
                return Ok(Some(OverlayEntry::Removed(Tombstone {
                    key: key.clone(),
                    file_index: file,
                    header,
                })));
            }

            return Ok(Some(OverlayEntry::Record(OverlayRecord {
                file_index: file,
                header,
                key: scanned.key.clone(),
                reader,
            })));
        }
    }

    /// Append a reader to the end of the load order
    ///
    /// Its masters must already be loaded. The ownership map is rebuilt
    /// before the next record is pulled and streaming restarts from the
    /// first file.
    pub fn push_reader(&mut self, reader: RecordReader<R, E>) -> Result<(), Error> {
        self.readers.push(reader);
        let index = self.readers.len() - 1;
        if let Err(e) = resolve_parents(&mut self.readers, index, self.policy) {
            self.readers.pop();
            return Err(e);
        }

        self.ownership = None;
        self.cursor = StreamCursor::default();
        Ok(())
    }

    /// Restart streaming from the first file
    pub fn rewind(&mut self) {
        self.cursor = StreamCursor::default();
    }

    /// Keys whose winning record deletes them, in key order
    pub fn removed_keys(&mut self) -> Result<Vec<RecordKey>, Error> {
        let ownership = self.resolve()?;
        let mut result: Vec<RecordKey> = ownership
            .owners
            .iter()
            .filter(|&(_, &(file, entry))| ownership.entries[file][entry].flags.is_blocked())
            .map(|(key, _)| key.clone())
            .collect();
        result.sort_unstable();
        Ok(result)
    }

    /// Load order index of the file that defines (or deletes) the visible
    /// version of a key
    pub fn owner_of(&mut self, key: &RecordKey) -> Result<Option<usize>, Error> {
        let ownership = self.resolve()?;
        Ok(ownership.owners.get(key).map(|&(file, _)| file))
    }

    /// Returns true if the key is currently deleted
    pub fn is_removed(&mut self, key: &RecordKey) -> Result<bool, Error> {
        let ownership = self.resolve()?;
        Ok(ownership
            .owner(key)
            .map_or(false, |record| record.flags.is_blocked()))
    }

    /// Number of records the merged stream yields, tombstones excluded
    pub fn len(&mut self) -> Result<usize, Error> {
        let ownership = self.resolve()?;
        let mut result = 0;
        for (file, entries) in ownership.entries.iter().enumerate() {
            for (entry, record) in entries.iter().enumerate() {
                let tombstone = record.key.is_some() && record.flags.is_blocked();
                if !tombstone && ownership.is_visible(file, entry) {
                    result += 1;
                }
            }
        }

        Ok(result)
    }

    /// Returns true if the merged stream yields no records
    pub fn is_empty(&mut self) -> Result<bool, Error> {
        self.len().map(|x| x == 0)
    }

    fn resolve(&mut self) -> Result<&Ownership, Error> {
        resolve(
            &mut self.readers,
            &mut self.extractor,
            &mut self.ownership,
            &mut self.cursor,
        )
    }
}

/// Return the ownership map, building it (and restarting the stream) when
/// the file list changed since the last build
fn resolve<'a, R, E, K>(
    readers: &mut [RecordReader<R, E>],
    extractor: &mut K,
    slot: &'a mut Option<Ownership>,
    cursor: &mut StreamCursor,
) -> Result<&'a Ownership, Error>
where
    R: Read + Seek,
    E: Encoding,
    K: KeyExtractor<R, E>,
{
    let ownership = match slot.take() {
        Some(ownership) => ownership,
        None => {
            let ownership = Ownership::build(readers, extractor)?;
            debug!(
                "resolved overlay of {} files ({} records scanned, {} keys owned)",
                readers.len(),
                ownership.records_scanned(),
                ownership.owners.len()
            );
            *cursor = StreamCursor::default();
            ownership
        }
    };

    Ok(slot.insert(ownership))
}

impl<R, E, K> Overlay<R, E, K> {
    /// The readers in load order
    pub fn readers(&self) -> &[RecordReader<R, E>] {
        &self.readers
    }

    /// Direct access to one reader, eg: to follow a reference into it with a
    /// saved context
    pub fn reader_mut(&mut self, index: usize) -> Option<&mut RecordReader<R, E>> {
        self.readers.get_mut(index)
    }

    /// The dependency policy the overlay was built with
    pub fn dependency_policy(&self) -> DependencyPolicy {
        self.policy
    }

    /// Consume the overlay and return its readers
    pub fn into_readers(self) -> Vec<RecordReader<R, E>> {
        self.readers
    }
}

/// Creates an overlay
#[derive(Debug, Default)]
pub struct OverlayBuilder<E = Windows1252Encoding> {
    policy: DependencyPolicy,
    encoding: E,
}

impl OverlayBuilder {
    /// Construct a new OverlayBuilder with default values
    pub fn new() -> OverlayBuilder {
        OverlayBuilder::default()
    }
}

impl<E> OverlayBuilder<E> {
    /// How to treat a master that is not loaded before the file requiring
    /// it. The default is [DependencyPolicy::Strict].
    pub fn dependency_policy(mut self, policy: DependencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The encoding of readers opened by [open_paths](Self::open_paths)
    pub fn encoding<E2>(self, encoding: E2) -> OverlayBuilder<E2> {
        OverlayBuilder {
            policy: self.policy,
            encoding,
        }
    }

    /// Merge readers given in load order. Dependencies are checked and the
    /// ownership map is built before returning.
    pub fn build<R, E2, K>(
        self,
        readers: Vec<RecordReader<R, E2>>,
        extractor: K,
    ) -> Result<Overlay<R, E2, K>, Error>
    where
        R: Read + Seek,
        E2: Encoding,
        K: KeyExtractor<R, E2>,
    {
        let mut readers = readers;
        for index in 0..readers.len() {
            resolve_parents(&mut readers, index, self.policy)?;
        }

        let mut result = Overlay {
            readers,
            extractor,
            policy: self.policy,
            ownership: None,
            cursor: StreamCursor::default(),
        };

        result.resolve()?;
        Ok(result)
    }
}

impl<E> OverlayBuilder<E>
where
    E: Encoding + Clone + Send + Sync,
{
    /// Open the files at the given paths, in load order, and merge them
    pub fn open_paths<P, K>(self, paths: &[P], extractor: K) -> Result<Overlay<File, E, K>, Error>
    where
        P: AsRef<Path> + Sync,
        K: KeyExtractor<File, E>,
    {
        let readers = open_all(paths, &self.encoding)?;
        self.build(readers, extractor)
    }
}

#[cfg(feature = "parallel")]
fn open_all<P, E>(paths: &[P], encoding: &E) -> Result<Vec<RecordReader<File, E>>, Error>
where
    P: AsRef<Path> + Sync,
    E: Encoding + Clone + Send + Sync,
{
    use rayon::prelude::*;

    paths
        .par_iter()
        .enumerate()
        .map(|(index, path)| open_one(index, path, encoding))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn open_all<P, E>(paths: &[P], encoding: &E) -> Result<Vec<RecordReader<File, E>>, Error>
where
    P: AsRef<Path>,
    E: Encoding + Clone,
{
    paths
        .iter()
        .enumerate()
        .map(|(index, path)| open_one(index, path, encoding))
        .collect()
}

fn open_one<P, E>(index: usize, path: P, encoding: &E) -> Result<RecordReader<File, E>, Error>
where
    P: AsRef<Path>,
    E: Encoding + Clone,
{
    RecordReader::builder()
        .index(index)
        .encoding(encoding.clone())
        .open(path)
}
