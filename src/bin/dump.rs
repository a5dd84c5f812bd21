//! Dump a content file as text with byte offsets for debugging
//!
//! Every record and subrecord is listed with the offset of its header. Short
//! subrecord payloads are shown as text when printable and as hex otherwise.
//!
//! Here is some sample output:
//!
//! ```text
//! base.esm: version 1.3, 1 master(s), 2 record(s)
//!        316: NPC_ len=41 flags=0x00000400
//!        328:   NAME len=8 'guard01'
//!        344:   NPDT len=4 0c000000
//!        356: NPC_ len=16 flags=0x00002000
//!        368:   NAME len=8 'guard02'
//! ```

use esmcodec::RecordReader;
use std::env;
use std::io::{self, Write};

const PREVIEW_LEN: usize = 48;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: dump <file>");
        std::process::exit(1);
    };

    let mut reader = RecordReader::open(path)?;
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    let header = reader.file_header();
    writeln!(
        out,
        "{}: version {}, {} master(s), {} record(s)",
        reader.name(),
        header.version,
        header.masters.len(),
        header.record_count
    )?;

    loop {
        let position = reader.position();
        let Some(record) = reader.next_record_header()? else {
            break;
        };

        writeln!(
            out,
            "{:>10}: {} len={} flags=0x{:08x}",
            position,
            record.tag,
            record.len,
            record.flags.bits()
        )?;

        loop {
            let position = reader.position();
            let Some(sub) = reader.next_subrecord_header()? else {
                break;
            };

            write!(out, "{:>10}:   {} len={} ", position, sub.tag, sub.len)?;
            let data = reader.read_field(sub.len as usize)?;
            write_preview(&mut out, data)?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn write_preview(out: &mut impl Write, data: &[u8]) -> io::Result<()> {
    let text = match data.iter().position(|&x| x == 0) {
        Some(nul) if data[nul..].iter().all(|&x| x == 0) => &data[..nul],
        _ => data,
    };

    let printable = !text.is_empty() && text.iter().all(|x| x.is_ascii_graphic() || *x == b' ');
    if printable {
        let shown = &text[..text.len().min(PREVIEW_LEN)];
        write!(out, "'{}'", String::from_utf8_lossy(shown))?;
    } else {
        for byte in data.iter().take(PREVIEW_LEN) {
            write!(out, "{:02x}", byte)?;
        }
    }

    if data.len() > PREVIEW_LEN {
        write!(out, "...")?;
    }

    Ok(())
}
