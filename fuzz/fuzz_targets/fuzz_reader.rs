#![no_main]
use esmcodec::{Error, RecordReader, RecordWriter};
use libfuzzer_sys::fuzz_target;

fn walk(data: &[u8]) -> Result<(), Error> {
    let mut reader = RecordReader::builder()
        .buffer_len(16)
        .from_slice("fuzz.esp", data)?;
    let mut writer = RecordWriter::new(Vec::new());
    writer.write_file_header(reader.file_header())?;

    let mut saved = None;
    let mut records = 0;
    while let Some(record) = reader.next_record_header()? {
        records += 1;
        writer.start_record(record.tag, record.flags)?;
        while let Some(sub) = reader.next_subrecord_header()? {
            if saved.is_none() {
                saved = Some(reader.save_context());
            }

            let field = reader.read_field(sub.len as usize)?;
            writer.write_subrecord(sub.tag, field)?;
        }
        writer.end_record()?;
    }

    if let Some(ctx) = saved {
        reader.restore_context(&ctx)?;
    }

    // whatever was read must be written back as a readable file
    let out = writer.into_inner();
    let mut reader = RecordReader::from_slice("out.esp", &out).expect("rewritten file");
    let mut rewritten = 0;
    while reader.next_record_header().expect("rewritten record").is_some() {
        reader.skip_record().expect("rewritten record");
        rewritten += 1;
    }
    assert_eq!(records, rewritten);
    Ok(())
}

fuzz_target!(|data: &[u8]| {
    if let Err(e) = walk(data) {
        assert!(!e.is_usage(), "{}", e);
    }
});
