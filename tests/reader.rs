use esmcodec::{
    ErrorKind, FileHeader, FormatErrorKind, Name, ReaderState, RecordFlags, RecordReader,
    RecordWriter, SubrecordHeader, UsageError, Utf8Encoding,
};
use quickcheck_macros::quickcheck;
use rstest::*;
use std::io::Cursor;

const CELL: Name = Name::new(*b"CELL");
const NAME: Name = Name::new(*b"NAME");
const DATA: Name = Name::new(*b"DATA");
const FRMR: Name = Name::new(*b"FRMR");

fn cell_file() -> Vec<u8> {
    let mut writer = RecordWriter::new(Vec::new());
    let header = FileHeader::default().with_master("Morrowind.esm", 1234);
    writer.write_file_header(&header).unwrap();

    writer.start_record(CELL, RecordFlags::NONE).unwrap();
    writer.write_hn_cstring(NAME, "Balmora").unwrap();
    writer.start_subrecord(DATA).unwrap();
    writer.write_u32(0x02).unwrap();
    writer.write_i32(-3).unwrap();
    writer.write_i32(-2).unwrap();
    writer.end_subrecord().unwrap();
    for index in 1..=3u32 {
        writer.write_hn_u32(FRMR, index).unwrap();
        writer.write_hn_cstring(NAME, &format!("ref{}", index)).unwrap();
    }
    writer.end_record().unwrap();

    writer.start_record(CELL, RecordFlags::PERSISTENT).unwrap();
    writer.write_hn_cstring(NAME, "Vivec").unwrap();
    writer.end_record().unwrap();
    writer.into_inner()
}

fn format_kind(err: &esmcodec::Error) -> FormatErrorKind {
    match err.kind() {
        ErrorKind::Format(e) => e.kind().clone(),
        _ => panic!("expected a format error but got: {}", err),
    }
}

#[test]
fn reads_file_header() {
    let data = cell_file();
    let reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    let header = reader.file_header();
    assert_eq!(header.masters.len(), 1);
    assert_eq!(header.masters[0].name, "Morrowind.esm");
    assert_eq!(header.masters[0].size, 1234);
    assert_eq!(reader.state(), ReaderState::BetweenRecords);
    assert_eq!(reader.name(), "Balmora.esp");
    assert_eq!(reader.file_size(), data.len() as u64);
}

#[test]
fn variable_count_group_with_peek() {
    let data = cell_file();
    let mut reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    assert_eq!(reader.get_hn_string(NAME).unwrap(), "Balmora");

    let sub = reader.expect_subrecord(DATA).unwrap();
    assert_eq!(sub.len, 12);
    assert_eq!(reader.get_u32().unwrap(), 2);
    assert_eq!(reader.get_i32().unwrap(), -3);
    assert_eq!(reader.get_i32().unwrap(), -2);

    let mut refs = Vec::new();
    while reader.is_next_subrecord(FRMR).unwrap() {
        let index = reader.get_hn_u32(FRMR).unwrap();
        let name = reader.get_hn_string(NAME).unwrap();
        refs.push((index, name));
    }

    assert_eq!(
        refs,
        vec![
            (1, String::from("ref1")),
            (2, String::from("ref2")),
            (3, String::from("ref3")),
        ]
    );
    assert!(!reader.has_more_subrecords());
    assert_eq!(reader.next_subrecord_header().unwrap(), None);

    let record = reader.next_record_header().unwrap().unwrap();
    assert!(record.flags.is_persistent());
}

#[test]
fn peek_then_next_consumes_one_header() {
    let data = cell_file();
    let mut reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    let start = reader.position();

    let peeked = reader.peek_subrecord_tag().unwrap();
    let sub = reader.next_subrecord_header().unwrap().unwrap();
    assert_eq!(peeked, Some(sub.tag));
    assert_eq!(reader.position(), start + SubrecordHeader::SIZE as u64);
}

#[test]
fn restore_is_indistinguishable() {
    let data = cell_file();
    let mut reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    reader.get_hn_string(NAME).unwrap();
    reader.expect_subrecord(DATA).unwrap();
    reader.get_u32().unwrap();

    let saved = reader.save_context();
    let position = reader.position();
    let expected: Vec<i32> = vec![reader.get_i32().unwrap(), reader.get_i32().unwrap()];

    // follow a reference into the next record
    reader.skip_record().unwrap();
    reader.next_record_header().unwrap();
    assert_eq!(reader.get_hn_string(NAME).unwrap(), "Vivec");

    reader.restore_context(&saved).unwrap();
    assert_eq!(reader.position(), position);
    assert_eq!(reader.state(), saved.state());
    assert_eq!(reader.context().rec_name(), saved.rec_name());
    assert_eq!(reader.context().sub_name(), saved.sub_name());
    assert_eq!(reader.context().left_rec(), saved.left_rec());
    assert_eq!(reader.context().left_sub(), saved.left_sub());
    assert_eq!(reader.context().left_file(), saved.left_file());
    let actual: Vec<i32> = vec![reader.get_i32().unwrap(), reader.get_i32().unwrap()];
    assert_eq!(actual, expected);
}

#[test]
fn saved_context_moves_across_threads() {
    let data = cell_file();
    let mut reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    let saved = reader.save_context();
    let thread_saved = std::thread::spawn(move || saved).join().unwrap();
    reader.skip_record().unwrap();
    reader.restore_context(&thread_saved).unwrap();
    assert_eq!(reader.get_hn_string(NAME).unwrap(), "Balmora");
}

#[test]
fn context_from_other_index_is_foreign() {
    let data = cell_file();
    let mut a = RecordReader::builder()
        .index(0)
        .from_slice("Balmora.esp", &data)
        .unwrap();
    let mut b = RecordReader::builder()
        .index(1)
        .from_slice("Balmora.esp", &data)
        .unwrap();

    a.next_record_header().unwrap();
    let err = b.restore_context(&a.save_context()).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Usage(UsageError::ForeignContext { .. })
    ));
}

#[test]
fn record_one_byte_longer_than_subrecords() {
    // a record declaring L whose subrecords sum to L + 1
    let mut data = Vec::new();
    let mut writer = RecordWriter::new(&mut data);
    writer.write_file_header(&FileHeader::default()).unwrap();
    drop(writer);

    let payload_len = 8 + 4u32;
    data.extend_from_slice(b"CELL");
    data.extend_from_slice(&(payload_len - 1).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(b"NAME");
    data.extend_from_slice(&4u32.to_le_bytes());
    data.extend_from_slice(b"abc\0");

    let mut reader = RecordReader::from_slice("bad.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    let err = reader.next_subrecord_header().unwrap_err();
    assert!(err.is_format());
    assert_eq!(
        format_kind(&err),
        FormatErrorKind::SubrecordOverrun {
            tag: NAME,
            declared: 4,
            remaining: 3,
        }
    );
}

#[rstest]
#[case(1)]
#[case(4)]
#[case(13)]
fn field_read_past_subrecord(#[case] extra: usize) {
    let data = cell_file();
    let mut reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    let sub = reader.expect_subrecord(NAME).unwrap();
    let err = reader.read_field(sub.len as usize + extra).unwrap_err();
    assert!(err.is_format());
    assert!(err.position().is_some());

    // nothing was consumed
    assert_eq!(reader.context().left_sub(), sub.len);
    assert_eq!(reader.get_remaining_string().unwrap(), "Balmora");
}

#[test]
fn truncated_file_is_format_error() {
    let data = cell_file();
    for len in 0..data.len() {
        let data = &data[..len];
        let result = RecordReader::from_slice("cut.esp", data).and_then(|mut reader| {
            while reader.next_record_header()?.is_some() {
                reader.skip_record()?;
            }
            Ok(())
        });

        if let Err(e) = result {
            assert!(e.is_format(), "{} bytes: {}", len, e);
        }
    }
}

#[test]
fn skip_unknown_subrecords() {
    let data = cell_file();
    let mut reader = RecordReader::from_slice("Balmora.esp", &data).unwrap();
    reader.next_record_header().unwrap();
    let mut seen = Vec::new();
    while let Some(sub) = reader.next_subrecord_header().unwrap() {
        seen.push(sub.tag);
        reader.skip_subrecord().unwrap();
        assert_eq!(reader.state(), ReaderState::InRecord);
    }

    assert_eq!(seen.len(), 8);
    assert_eq!(reader.state(), ReaderState::BetweenRecords);
}

#[test]
fn reads_from_a_file() {
    let data = cell_file();
    let dir = std::env::temp_dir().join(format!("esmcodec-reader-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("Balmora.esp");
    std::fs::write(&path, &data).unwrap();

    let mut reader = RecordReader::builder()
        .buffer_len(32)
        .open(&path)
        .unwrap();
    let mut names = Vec::new();
    while reader.next_record_header().unwrap().is_some() {
        names.push(reader.get_hn_string(NAME).unwrap());
        reader.skip_record().unwrap();
    }

    assert_eq!(names, vec!["Balmora", "Vivec"]);
    let (buf, _file) = reader.into_parts();
    assert!(buf.len() >= 32);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn utf8_encoding() {
    let mut writer = esmcodec::RecordWriterBuilder::new()
        .encoding(Utf8Encoding::new())
        .from_writer(Vec::new());
    writer.write_file_header(&FileHeader::default()).unwrap();
    writer.start_record(CELL, RecordFlags::NONE).unwrap();
    writer.write_hn_cstring(NAME, "Jåhkåm").unwrap();
    writer.end_record().unwrap();
    let data = writer.into_inner();

    let mut reader = RecordReader::builder()
        .encoding(Utf8Encoding::new())
        .build("utf8.esp", Cursor::new(&data))
        .unwrap();
    reader.next_record_header().unwrap();
    assert_eq!(reader.get_hn_string(NAME).unwrap(), "Jåhkåm");
}

#[quickcheck]
fn payloads_survive_a_round_trip(payloads: Vec<Vec<u8>>) -> bool {
    let mut writer = RecordWriter::new(Vec::new());
    writer.write_file_header(&FileHeader::default()).unwrap();
    writer.start_record(CELL, RecordFlags::NONE).unwrap();
    for payload in &payloads {
        writer.write_subrecord(DATA, payload).unwrap();
    }
    writer.end_record().unwrap();
    let data = writer.into_inner();

    let mut reader = RecordReader::builder()
        .buffer_len(16)
        .from_slice("prop.esp", &data)
        .unwrap();
    let record = reader.next_record_header().unwrap().unwrap();
    let mut total = 0u64;
    let mut actual = Vec::new();
    while let Some(sub) = reader.next_subrecord_header().unwrap() {
        total += SubrecordHeader::SIZE as u64 + u64::from(sub.len);
        actual.push(reader.read_field(sub.len as usize).unwrap().to_vec());
    }

    total == u64::from(record.len) && actual == payloads
}
