use anyhow::{bail, Result};
use std::collections::HashSet;
use std::io::BufRead;

use crate::index::corpus::ProteinRecord;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    /// 从标题行解析出的登录号
    pub accession: String,
    /// 去掉 `>` 的完整标题行
    pub header: String,
    pub seq: Vec<u8>,
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    peek_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            done: false,
            peek_header: None,
        }
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        // Find header line
        let header = if let Some(h) = self.peek_header.take() {
            h
        } else {
            loop {
                self.buf.clear();
                let n = self.reader.read_line(&mut self.buf)?;
                if n == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if self.buf.starts_with('>') {
                    break self.buf[1..].trim().to_string();
                }
            }
        };
        let accession = parse_accession(&header).to_string();

        // Read sequence lines
        let mut seq: Vec<u8> = Vec::new();
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                self.done = true;
                break;
            }
            if self.buf.starts_with('>') {
                self.peek_header = Some(self.buf[1..].trim().to_string());
                break;
            }
            for &b in self.buf.as_bytes() {
                match b {
                    b'\n' | b'\r' | b' ' | b'\t' => {}
                    // 终止密码子标记
                    b'*' => {}
                    _ => seq.push(b.to_ascii_uppercase()),
                }
            }
        }

        Ok(Some(FastaRecord { accession, header, seq }))
    }
}

/// 登录号解析：UniProt 风格 `sp|P12345|NAME_HUMAN ...` 取第二段，其余取第一个空白前的部分。
pub fn parse_accession(header: &str) -> &str {
    let id = header.split_whitespace().next().unwrap_or("");
    let mut parts = id.split('|');
    match (parts.next(), parts.next()) {
        (Some("sp" | "tr" | "up"), Some(acc)) if !acc.is_empty() => acc,
        _ => id,
    }
}

/// 读取全部蛋白记录。空序列跳过并告警；重复登录号报错。
pub fn read_proteins<R: BufRead>(reader: R) -> Result<Vec<ProteinRecord>> {
    let mut reader = FastaReader::new(reader);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    while let Some(rec) = reader.next_record()? {
        if rec.accession.is_empty() {
            bail!("FASTA record '>{}' has no accession", rec.header);
        }
        if rec.seq.is_empty() {
            log::warn!("protein '{}' has an empty sequence, skipped", rec.accession);
            continue;
        }
        if !seen.insert(rec.accession.clone()) {
            bail!("duplicate accession '{}' in FASTA input", rec.accession);
        }
        let seq = String::from_utf8_lossy(&rec.seq);
        out.push(ProteinRecord::new(&rec.accession, &rec.header, &seq));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_simple_fasta() {
        let data = b">sp|P01308|INS_HUMAN Insulin\nMALwMR\n>TEST_ACCESSION\nECTQ*\n";
        let cursor = Cursor::new(&data[..]);
        let mut r = FastaReader::new(cursor);

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.accession, "P01308");
        assert_eq!(r1.header, "sp|P01308|INS_HUMAN Insulin");
        assert_eq!(r1.seq, b"MALWMR");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.accession, "TEST_ACCESSION");
        assert_eq!(r2.seq, b"ECTQ");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn parse_fasta_with_crlf_and_whitespace() {
        let data = b"\n\n>P1 desc\r\nMK w v\r\n tf\r\n>P2 \r\n G G \r\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.accession, "P1");
        assert_eq!(r1.seq, b"MKWVTF");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.accession, "P2");
        assert_eq!(r2.seq, b"GG");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn accession_forms() {
        assert_eq!(parse_accession("tr|A0A024R161|A0A024R161_HUMAN x"), "A0A024R161");
        assert_eq!(parse_accession("gi|12345 something"), "gi|12345");
        assert_eq!(parse_accession("Q9FHX5 some protein"), "Q9FHX5");
    }

    #[test]
    fn read_proteins_rejects_duplicates() {
        let data = b">P1\nMK\n>P2\n\n>P1\nGG\n";
        assert!(read_proteins(Cursor::new(&data[..])).is_err());

        let data = b">P1\nMK\n>P2\n\n>P3\nGG\n";
        let proteins = read_proteins(Cursor::new(&data[..])).unwrap();
        assert_eq!(proteins.len(), 2);
        assert_eq!(proteins[1].accession, "P3");
    }
}
