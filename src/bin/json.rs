//! Print every record of a content file as a line of JSON
//!
//! Subrecord payloads are emitted as text when they decode cleanly and as a
//! byte array otherwise, as the codec does not know record layouts.

use esmcodec::{Name, RecordHeader, RecordReader, Windows1252Encoding};
use serde::Serialize;
use std::env;
use std::io::{self, Write};

#[derive(Serialize)]
struct JsonRecord<'a> {
    offset: u64,
    #[serde(flatten)]
    header: &'a RecordHeader,
    subrecords: Vec<JsonSubrecord>,
}

#[derive(Serialize)]
struct JsonSubrecord {
    tag: Name,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<u8>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: json <file>");
        std::process::exit(1);
    };

    let mut reader = RecordReader::open(path)?;
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    serde_json::to_writer(&mut out, reader.file_header())?;
    writeln!(out)?;

    loop {
        let offset = reader.position();
        let Some(header) = reader.next_record_header()? else {
            break;
        };

        let mut subrecords = Vec::new();
        while let Some(sub) = reader.next_subrecord_header()? {
            let data = reader.read_field(sub.len as usize)?;
            subrecords.push(to_json(sub.tag, data));
        }

        let record = JsonRecord {
            offset,
            header: &header,
            subrecords,
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    }

    out.flush()?;
    Ok(())
}

fn to_json(tag: Name, data: &[u8]) -> JsonSubrecord {
    let body = match data.split_last() {
        Some((0, body)) => body,
        _ => data,
    };

    let is_text = !body.is_empty() && body.iter().all(|&x| x >= 0x20 && x != 0x7f);
    if is_text {
        JsonSubrecord {
            tag,
            text: Some(Windows1252Encoding::decode(body).into_owned()),
            data: None,
        }
    } else {
        JsonSubrecord {
            tag,
            text: None,
            data: Some(data.to_vec()),
        }
    }
}
