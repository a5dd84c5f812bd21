/*!

A streaming reader, writer, and load order overlay for layered binary game
content files: a master file plus an ordered stack of plugins that add to,
override, or delete its records.

## Features

- ✔ Streaming: walk arbitrarily large files one record at a time through a
  small, growable buffer
- ✔ Strict: every declared length is enforced, corrupt nesting is reported
  with the byte offset where it was found
- ✔ Resumable: save a [ReadContext] before following a reference and restore
  it afterwards
- ✔ Atomic writes: a record reaches the underlying writer whole or not at all
- ✔ Layered: merge files in load order with an [Overlay], where later files
  win and blocked records become tombstones

## Quick Start

Write a file and read it back:

```rust
use esmcodec::{FileHeader, Name, RecordFlags, RecordReader, RecordWriter};

let mut writer = RecordWriter::new(Vec::new());
writer.write_file_header(&FileHeader::default())?;
writer.start_record(Name::new(*b"NPC_"), RecordFlags::PERSISTENT)?;
writer.write_hn_cstring(Name::new(*b"NAME"), "guard01")?;
writer.write_hn_u32(Name::new(*b"INDX"), 3)?;
writer.end_record()?;
let data = writer.into_inner();

let mut reader = RecordReader::from_slice("base.esm", &data)?;
while let Some(record) = reader.next_record_header()? {
    assert!(record.flags.is_persistent());
    while let Some(sub) = reader.next_subrecord_header()? {
        match sub.tag.as_bytes() {
            b"NAME" => assert_eq!(reader.get_remaining_string()?, "guard01"),
            b"INDX" => assert_eq!(reader.get_u32()?, 3),
            _ => reader.skip_subrecord()?,
        }
    }
}
# Ok::<(), esmcodec::Error>(())
```

## Following references

Records refer to each other out of order. A [ReadContext] is a plain data
snapshot of where a reader is, so a caller can jump away and come back:

```rust
use esmcodec::{FileHeader, Name, RecordFlags, RecordReader, RecordWriter};

let mut writer = RecordWriter::new(Vec::new());
writer.write_file_header(&FileHeader::default())?;
for id in ["first", "second"] {
    writer.start_record(Name::new(*b"GLOB"), RecordFlags::NONE)?;
    writer.write_hn_cstring(Name::new(*b"NAME"), id)?;
    writer.end_record()?;
}
let data = writer.into_inner();

let mut reader = RecordReader::from_slice("base.esm", &data)?;
reader.next_record_header()?;
let saved = reader.save_context();

reader.skip_record()?;
reader.next_record_header()?;
assert_eq!(reader.get_hn_string(Name::new(*b"NAME"))?, "second");

reader.restore_context(&saved)?;
assert_eq!(reader.get_hn_string(Name::new(*b"NAME"))?, "first");
# Ok::<(), esmcodec::Error>(())
```

## Text

Ids and text are stored in a legacy single byte code page. Readers and
writers convert through an [Encoding], [Windows1252Encoding] by default.

## Caveats

Caller is responsible for:

- Knowing the field layout of each record and subrecord type
- Choosing the key that identifies a record across files (see
  [KeyExtractor]; [IdSubrecord] covers the common `NAME` case)

*/

mod buffer;
mod data;
mod encoding;
mod errors;
mod fixed;
pub mod overlay;
pub mod record;
pub(crate) mod util;

pub use self::encoding::*;
pub use self::errors::*;
pub use self::fixed::*;
pub use self::overlay::{
    DependencyPolicy, IdSubrecord, KeyExtractor, Overlay, OverlayBuilder, OverlayEntry,
    OverlayRecord, RecordKey, Tombstone,
};
pub use self::record::*;
