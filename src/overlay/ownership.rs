use super::{KeyExtractor, RecordKey};
use crate::{Encoding, Error, ReaderState, RecordFlags, RecordPosition, RecordReader};
use std::collections::HashMap;
use std::io::{Read, Seek};

/// A record seen while scanning a file
#[derive(Debug, Clone)]
pub(crate) struct ScannedRecord {
    pub(crate) position: RecordPosition,
    pub(crate) key: Option<RecordKey>,
    pub(crate) flags: RecordFlags,
}

/// For every key, the file and entry whose version of the record wins
#[derive(Debug, Default)]
pub(crate) struct Ownership {
    // scanned records of each file in file order
    pub(crate) entries: Vec<Vec<ScannedRecord>>,
    pub(crate) owners: HashMap<RecordKey, (usize, usize)>,
}

impl Ownership {
    /// Scan every reader in load order. Later files, and later entries within
    /// a file, take ownership of a key from earlier ones.
    pub(crate) fn build<R, E, K>(
        readers: &mut [RecordReader<R, E>],
        extractor: &mut K,
    ) -> Result<Ownership, Error>
    where
        R: Read + Seek,
        E: Encoding,
        K: KeyExtractor<R, E>,
    {
        let mut result = Ownership::default();
        for (file, reader) in readers.iter_mut().enumerate() {
            let entries = scan(reader, extractor)?;
            for (entry, record) in entries.iter().enumerate() {
                if let Some(key) = &record.key {
                    result.owners.insert(key.clone(), (file, entry));
                }
            }
            result.entries.push(entries);
        }

        Ok(result)
    }

    /// Returns true if this entry is what callers observe for its key
    pub(crate) fn is_visible(&self, file: usize, entry: usize) -> bool {
        match self.entries[file][entry].key.as_ref() {
            Some(key) => self.owners.get(key) == Some(&(file, entry)),
            None => true,
        }
    }

    pub(crate) fn owner(&self, key: &RecordKey) -> Option<&ScannedRecord> {
        let &(file, entry) = self.owners.get(key)?;
        self.entries.get(file)?.get(entry)
    }

    pub(crate) fn records_scanned(&self) -> usize {
        self.entries.iter().map(|x| x.len()).sum()
    }
}

fn scan<R, E, K>(reader: &mut RecordReader<R, E>, extractor: &mut K) -> Result<Vec<ScannedRecord>, Error>
where
    R: Read + Seek,
    E: Encoding,
    K: KeyExtractor<R, E>,
{
    reader.rewind()?;
    let mut result = Vec::new();
    loop {
        let position = reader.record_position()?;
        let Some(header) = reader.next_record_header()? else {
            break;
        };

        let key = extractor.extract(&header, reader)?;
        if reader.state() != ReaderState::BetweenRecords {
            reader.skip_record()?;
        }

        result.push(ScannedRecord {
            position,
            key,
            flags: header.flags,
        });
    }

    Ok(result)
}
