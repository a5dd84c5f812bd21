#![no_main]
use esmcodec::{DependencyPolicy, IdSubrecord, Overlay, OverlayEntry, RecordReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mid = data.len() / 2;
    let (base, patch) = data.split_at(mid);
    let readers = match (
        RecordReader::from_slice("base.esm", base),
        RecordReader::from_slice("patch.esp", patch),
    ) {
        (Ok(a), Ok(b)) => vec![a, b],
        _ => return,
    };

    let Ok(mut overlay) = Overlay::builder()
        .dependency_policy(DependencyPolicy::Lenient)
        .build(readers, IdSubrecord::new())
    else {
        return;
    };

    while let Ok(Some(entry)) = overlay.next_logical_record() {
        if let OverlayEntry::Record(record) = entry {
            while let Ok(Some(_)) = record.reader.next_subrecord_header() {
                if record.reader.skip_subrecord().is_err() {
                    break;
                }
            }
        }
    }
});
