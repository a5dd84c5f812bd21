use crate::{errors::DependencyError, util::file_name_eq, Error, RecordReader};
use log::warn;

/// What to do when a file requires a master that is not loaded before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyPolicy {
    /// Fail with a dependency error before any record is read
    #[default]
    Strict,

    /// Log a warning and load the file without the missing master
    Lenient,
}

/// Match the masters of the reader at `index` against the readers before it
/// and record the matches as its parent file indices.
pub(crate) fn resolve_parents<R, E>(
    readers: &mut [RecordReader<R, E>],
    index: usize,
    policy: DependencyPolicy,
) -> Result<(), Error> {
    let (earlier, rest) = readers.split_at_mut(index);
    let Some(reader) = rest.first_mut() else {
        return Ok(());
    };

    let mut parents = Vec::with_capacity(reader.file_header().masters.len());
    for master in &reader.file_header().masters {
        let found = earlier
            .iter()
            .rposition(|candidate| file_name_eq(candidate.name(), &master.name));

        let Some(parent) = found else {
            match policy {
                DependencyPolicy::Strict => {
                    let err = DependencyError::new(reader.name().to_string(), master.name.clone());
                    return Err(err.into());
                }
                DependencyPolicy::Lenient => {
                    warn!(
                        "{} requires {} which is not loaded before it, continuing without it",
                        reader.name(),
                        master.name
                    );
                    continue;
                }
            }
        };

        let actual = earlier[parent].file_size();
        if master.size != 0 && master.size != actual {
            warn!(
                "{} was authored against {} of {} bytes but the loaded file is {} bytes",
                reader.name(),
                master.name,
                master.size,
                actual
            );
        }

        parents.push(parent);
    }

    parents.sort_unstable();
    parents.dedup();
    reader.set_index(index);
    reader.set_parent_file_indices(parents);
    Ok(())
}
